//! Declared responses.

use crate::codec::{EncodeError, ResponseContent, ResponseEncoders, TEXT_PLAIN};
use crate::expectation::ConfigError;
use crate::request::{Cookie, MultiMap};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Chunked delivery of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunks: NonZeroUsize,
    /// Pause between consecutive chunks
    pub delay: Duration,
}

impl ChunkingConfig {
    pub const DEFAULT_CHUNKS: usize = 2;

    pub fn new(chunks: usize, delay: Duration) -> Result<Self, ConfigError> {
        let chunks = NonZeroUsize::new(chunks).ok_or(ConfigError::InvalidChunking(chunks))?;
        Ok(Self { chunks, delay })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunks: NonZeroUsize::MIN.saturating_add(Self::DEFAULT_CHUNKS - 1),
            delay: Duration::ZERO,
        }
    }
}

/// Body of a declared response.
#[derive(Debug, Clone, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    /// Sent as-is
    Raw(Bytes),
    /// Encoded for the declared content type on first use
    Content(ResponseContent),
}

/// One canned response of an expectation.
pub struct ResponseDefinition {
    pub(crate) status: u16,
    pub(crate) headers: MultiMap,
    pub(crate) cookies: Vec<(String, Cookie)>,
    pub(crate) content_type: String,
    pub(crate) body: ResponseBody,
    pub(crate) chunking: Option<ChunkingConfig>,
    pub(crate) delay: Option<Duration>,
    pub(crate) encoders: ResponseEncoders,
    pub(crate) encoded: OnceCell<Result<Bytes, EncodeError>>,
}

impl Default for ResponseDefinition {
    fn default() -> Self {
        Self {
            status: 200,
            headers: MultiMap::case_insensitive(),
            cookies: Vec::new(),
            content_type: TEXT_PLAIN.to_string(),
            body: ResponseBody::Empty,
            chunking: None,
            delay: None,
            encoders: ResponseEncoders::new(),
            encoded: OnceCell::new(),
        }
    }
}

impl ResponseDefinition {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[(String, Cookie)] {
        &self.cookies
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn chunking(&self) -> Option<ChunkingConfig> {
        self.chunking
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn encoders(&self) -> &ResponseEncoders {
        &self.encoders
    }
}

impl fmt::Debug for ResponseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseDefinition")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("content_type", &self.content_type)
            .field("body", &self.body)
            .field("chunking", &self.chunking)
            .field("delay", &self.delay)
            .finish()
    }
}
