//! Listener configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 picks an ephemeral port
    #[serde(default)]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

impl ListenConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{addr}': {e}"))
    }
}
