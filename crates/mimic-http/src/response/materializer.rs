//! Turns a response definition into the outbound [`Reply`].

use super::chunker::chunk;
use super::definition::{ResponseBody, ResponseDefinition};
use crate::codec::{EncodeError, EncoderChain, ResponseEncoders};
use crate::request::{Cookie, MultiMap};
use bytes::Bytes;
use std::time::Duration;

/// Literal body of the reply to an unmatched request.
pub const NOT_FOUND_BODY: &str = "404: Not Found";

/// Reply body as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Full(Bytes),
    /// Sent piece by piece, pausing `delay` between pieces
    Chunked { chunks: Vec<Bytes>, delay: Duration },
}

impl ReplyBody {
    /// Whole payload, chunks concatenated.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            ReplyBody::Full(bytes) => bytes.clone(),
            ReplyBody::Chunked { chunks, .. } => {
                Bytes::from(chunks.iter().flat_map(|c| c.iter().copied()).collect::<Vec<u8>>())
            }
        }
    }
}

/// Outbound response produced by the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: MultiMap,
    pub cookies: Vec<(String, Cookie)>,
    pub body: ReplyBody,
    /// Wait before sending anything
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: MultiMap::case_insensitive(),
            cookies: Vec::new(),
            body: ReplyBody::Full(body.into()),
            delay: None,
        }
    }

    pub fn not_found() -> Self {
        let mut reply = Self::new(404, NOT_FOUND_BODY);
        reply.headers.append("Content-Type", "text/plain");
        reply
    }

    /// Expectation matched but declares no response.
    pub fn no_content() -> Self {
        Self::new(204, Bytes::new())
    }

    /// The mock itself is misconfigured or could not handle the request.
    pub fn server_error(message: impl std::fmt::Display) -> Self {
        let mut reply = Self::new(500, format!("mock server error: {message}"));
        reply.headers.append("Content-Type", "text/plain");
        reply
    }
}

/// Encoded body bytes of `definition`, cached on the definition after the
/// first successful or failed encode.
pub fn encoded_body(
    definition: &ResponseDefinition,
    global: &ResponseEncoders,
) -> Result<Bytes, EncodeError> {
    match &definition.body {
        ResponseBody::Empty => Ok(Bytes::new()),
        ResponseBody::Raw(bytes) => Ok(bytes.clone()),
        ResponseBody::Content(content) => definition
            .encoded
            .get_or_init(|| {
                EncoderChain::new(&definition.encoders, global)
                    .encode(content, &definition.content_type)
                    .map(Bytes::from)
            })
            .clone(),
    }
}

/// Build the reply for a selected response definition.
pub fn materialize(
    definition: &ResponseDefinition,
    global: &ResponseEncoders,
) -> Result<Reply, EncodeError> {
    let payload = encoded_body(definition, global)?;

    let mut headers = definition.headers.clone();
    let has_body = !matches!(definition.body, ResponseBody::Empty);
    if has_body && !headers.contains("content-type") {
        headers.append("Content-Type", definition.content_type.clone());
    }

    let body = match definition.chunking {
        Some(config) => ReplyBody::Chunked {
            chunks: chunk(&payload, config.chunks),
            delay: config.delay,
        },
        None => ReplyBody::Full(payload),
    };

    Ok(Reply {
        status: definition.status,
        headers,
        cookies: definition.cookies.clone(),
        body,
        delay: definition.delay,
    })
}
