//! File-based configuration for the `mimic` binary.
//!
//! A configuration file (YAML, or JSON when the file name ends in `.json`)
//! describes the listener and a list of expectations. It is validated on
//! load and compiled into an [`ExpectationRegistry`] with
//! [`MockConfig::into_registry`].
//!
//! ```yaml
//! listen:
//!   port: 8080
//! reportToConsole: true
//! expectations:
//!   - method: GET
//!     path: { equals: /foo }
//!     called: { exactly: 2 }
//!     responses:
//!       - text: first
//!       - status: 201
//!         json: { ok: true }
//! ```

mod expectation;
mod listen;

pub use expectation::{BodyConfig, ExpectationConfig, ResponseConfig};
pub use listen::ListenConfig;

use crate::expectation::ExpectationRegistry;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Print the unmatched-request report to stdout as well as the log
    #[serde(default)]
    pub report_to_console: bool,
    #[serde(default)]
    pub log_response_content: bool,
    #[serde(default)]
    pub expectations: Vec<ExpectationConfig>,
}

impl MockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockConfig = from_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MockConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.listen.socket_addr()?;
        for (index, expectation) in self.expectations.iter().enumerate() {
            expectation
                .validate()
                .with_context(|| format!("Invalid expectation {index}"))?;
        }
        Ok(())
    }

    /// Compile every expectation, in file order, into a fresh registry.
    pub fn into_registry(&self) -> Result<Arc<ExpectationRegistry>, anyhow::Error> {
        let registry = ExpectationRegistry::new();
        registry.set_report_to_console(self.report_to_console);
        for (index, expectation) in self.expectations.iter().enumerate() {
            let builder = expectation
                .to_builder()
                .with_context(|| format!("Invalid expectation {index}"))?;
            let registered = registry
                .register(builder)
                .with_context(|| format!("Invalid expectation {index}"))?;
            debug!("Registered expectation {}: {}", index, registered.description());
        }
        Ok(Arc::new(registry))
    }
}

/// Parse YAML with enums written as single-key maps (`exactly: 2`,
/// `startsWith: /api`) instead of YAML tags.
pub fn from_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, serde_yaml::Error> {
    let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
    serde_yaml::with::singleton_map_recursive::deserialize(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CallCountConstraint, StringMatcher};
    use crate::request::IncomingRequest;
    use crate::response::ReplyBody;
    use std::io::Write;

    const YAML: &str = r#"
listen:
  port: 0
reportToConsole: false
expectations:
  - method: get
    path: { equals: /foo }
    headers:
      X-Trace: { startsWith: abc }
    called: { exactly: 2 }
    responses:
      - text: first
      - status: 201
        json: { ok: true }
  - method: POST
    path: { matches: "^/items/\\d+$" }
    body:
      contentType: application/json
      jsonPointers:
        /name: { equals: widget }
    responses:
      - status: 202
        chunks: 3
        text: accepted!
"#;

    #[test]
    fn test_yaml_compiles_into_registry() {
        let config = MockConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.expectations.len(), 2);
        assert_eq!(config.expectations[0].called, CallCountConstraint::Exactly(2));

        let registry = config.into_registry().unwrap();
        assert_eq!(registry.len(), 2);

        let request = IncomingRequest::get("/foo").with_header("x-trace", "abc-123");
        assert_eq!(registry.respond(&request).body.to_bytes(), "first");
        let second = registry.respond(&request);
        assert_eq!(second.status, 201);
        assert_eq!(second.body.to_bytes(), r#"{"ok":true}"#);
        assert!(registry.verify());

        assert_eq!(registry.respond(&IncomingRequest::get("/foo")).status, 404);

        let post = IncomingRequest::post("/items/42")
            .with_body(r#"{"name":"widget"}"#, "application/json");
        let reply = registry.respond(&post);
        assert_eq!(reply.status, 202);
        match reply.body {
            ReplyBody::Chunked { chunks, .. } => assert_eq!(chunks.len(), 3),
            other => panic!("expected chunked body, got {other:?}"),
        }
    }

    #[test]
    fn test_from_file_yaml_and_json() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml.write_all(YAML.as_bytes()).unwrap();
        let config = MockConfig::from_file(yaml.path()).unwrap();
        assert_eq!(config.expectations.len(), 2);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json.write_all(
            br#"{"listen": {"port": 9999}, "expectations": [
                {"path": {"equals": "/raw"}, "responses": [{"base64": "aGk=", "contentType": "application/octet-stream"}]}
            ]}"#,
        )
        .unwrap();
        let config = MockConfig::from_file(json.path()).unwrap();
        assert_eq!(config.listen.port, 9999);
        let registry = config.into_registry().unwrap();
        let reply = registry.respond(&IncomingRequest::get("/raw"));
        assert_eq!(reply.body.to_bytes(), "hi");
        assert_eq!(reply.headers.first("content-type"), Some("application/octet-stream"));
    }

    #[test]
    fn test_validation_errors() {
        let bad_method = "expectations:\n  - method: \"GE T\"\n";
        assert!(MockConfig::from_yaml_str(bad_method).is_err());

        let two_bodies = "expectations:\n  - responses:\n      - text: a\n        json: 1\n";
        assert!(MockConfig::from_yaml_str(two_bodies).is_err());

        let zero_chunks = "expectations:\n  - responses:\n      - chunks: 0\n";
        assert!(MockConfig::from_yaml_str(zero_chunks).is_err());

        let empty_body = "expectations:\n  - body:\n      contentType: text/plain\n";
        assert!(MockConfig::from_yaml_str(empty_body).is_err());

        let bad_base64 = "expectations:\n  - responses:\n      - base64: \"%%%\"\n";
        assert!(MockConfig::from_yaml_str(bad_base64).is_err());

        let bad_host = "listen:\n  host: not a host\n";
        assert!(MockConfig::from_yaml_str(bad_host).is_err());
    }

    #[test]
    fn test_invalid_regex_surfaces_on_compile() {
        let config =
            MockConfig::from_yaml_str("expectations:\n  - path: { matches: \"([\" }\n").unwrap();
        let err = config.into_registry().unwrap_err();
        assert!(err.to_string().contains("Invalid expectation 0"));
    }

    #[test]
    fn test_yaml_enum_forms_nested_in_maps() {
        let config = MockConfig::from_yaml_str(
            "expectations:\n  - path: { startsWith: /api }\n    cookies:\n      session: { exists: false }\n    query:\n      page: { equals: \"2\" }\n    called: { between: [1, 3] }\n",
        )
        .unwrap();
        let expectation = &config.expectations[0];
        assert_eq!(expectation.path, StringMatcher::StartsWith("/api".to_string()));
        assert_eq!(expectation.cookies["session"], StringMatcher::Exists(false));
        assert_eq!(expectation.called, CallCountConstraint::Between(1, 3));

        let registry = config.into_registry().unwrap();
        let request = IncomingRequest::get("/api/items").with_raw_query("page=2");
        assert_eq!(registry.respond(&request).status, 204);
        let with_session = request.clone().with_header("Cookie", "session=abc");
        assert_eq!(registry.respond(&with_session).status, 404);
        assert!(registry.verify());

        let config = MockConfig::from_yaml_str("expectations:\n  - called: any\n").unwrap();
        assert_eq!(config.expectations[0].called, CallCountConstraint::Any);
    }

    #[test]
    fn test_defaults() {
        let config = MockConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.listen, ListenConfig::default());
        assert!(!config.report_to_console);
        assert!(config.into_registry().unwrap().is_empty());
    }
}
