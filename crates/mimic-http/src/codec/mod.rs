//! Content codec registry.
//!
//! Decoders turn request body bytes into a [`DecodedValue`] that body
//! predicates can inspect; encoders turn [`ResponseContent`] into response
//! bytes. Both are looked up in two levels: entries registered on the
//! expectation (or response) shadow the server-wide entries for the same
//! content type.
//!
//! ## Module Structure
//!
//! - `content_type`: MIME matching used as the registry key
//! - `decoders`: request decoder registry, chain and built-in decoders
//! - `encoders`: response encoder registry, chain and built-in encoders
//! - `multipart`: multipart content model, decoding and encoding

mod content_type;
mod decoders;
mod encoders;
mod multipart;

use crate::request::MultiMap;
use bytes::Bytes;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

pub use content_type::{split_essence, ContentTypeMatcher};
pub use decoders::{
    decoder, form_decoder, json_decoder, multipart_decoder, passthrough_decoder, text_decoder, Decoder,
    DecoderChain, DecodingContext, RequestDecoders,
};
pub use encoders::{
    base64_encoder, encoder, json_encoder, multipart_encoder, text_encoder, Encoder, EncoderChain,
    ResponseEncoders,
};
pub use multipart::{MultipartContent, MultipartPart, PartValue};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
pub const MULTIPART_FORMDATA: &str = "multipart/form-data";
pub const MULTIPART_MIXED: &str = "multipart/mixed";

/// Request body after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// Undecoded bytes (no decoder registered for the content type)
    Bytes(Bytes),
    Text(String),
    Json(serde_json::Value),
    Form(MultiMap),
    Multipart(MultipartContent),
}

impl DecodedValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DecodedValue::Bytes(_) => "bytes",
            DecodedValue::Text(_) => "text",
            DecodedValue::Json(_) => "json",
            DecodedValue::Form(_) => "form",
            DecodedValue::Multipart(_) => "multipart",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DecodedValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Body content of a response definition that still needs encoding.
#[derive(Clone)]
pub enum ResponseContent {
    Text(String),
    Json(serde_json::Value),
    Multipart(MultipartContent),
    /// Arbitrary typed value; needs an encoder registered for its type.
    Object {
        value: Arc<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
}

impl ResponseContent {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        ResponseContent::Object {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ResponseContent::Text(_) => ContentKind::Text,
            ResponseContent::Json(_) => ContentKind::Json,
            ResponseContent::Multipart(_) => ContentKind::Multipart,
            ResponseContent::Object { value, .. } => ContentKind::Object((**value).type_id()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ResponseContent::Text(_) => "text",
            ResponseContent::Json(_) => "json",
            ResponseContent::Multipart(_) => "multipart",
            ResponseContent::Object { type_name, .. } => type_name,
        }
    }
}

impl fmt::Debug for ResponseContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseContent::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ResponseContent::Json(json) => f.debug_tuple("Json").field(json).finish(),
            ResponseContent::Multipart(content) => f.debug_tuple("Multipart").field(content).finish(),
            ResponseContent::Object { type_name, .. } => {
                f.debug_struct("Object").field("type_name", type_name).finish()
            }
        }
    }
}

impl From<&str> for ResponseContent {
    fn from(value: &str) -> Self {
        ResponseContent::Text(value.to_string())
    }
}

impl From<String> for ResponseContent {
    fn from(value: String) -> Self {
        ResponseContent::Text(value)
    }
}

impl From<serde_json::Value> for ResponseContent {
    fn from(value: serde_json::Value) -> Self {
        ResponseContent::Json(value)
    }
}

impl From<MultipartContent> for ResponseContent {
    fn from(value: MultipartContent) -> Self {
        ResponseContent::Multipart(value)
    }
}

/// Runtime kind of a [`ResponseContent`], the second half of an encoder key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Json,
    Multipart,
    Object(TypeId),
}

impl ContentKind {
    pub fn of<T: Any>() -> Self {
        ContentKind::Object(TypeId::of::<T>())
    }
}

/// A registered decoder failed on the request body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed {content_type} body: {reason}")]
    Malformed { content_type: String, reason: String },
    #[error("decoder for {content_type} failed: {reason}")]
    Failed { content_type: String, reason: String },
}

/// Response content could not be turned into bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("no encoder configured for {kind} content of type {content_type}")]
    MissingEncoder { content_type: String, kind: String },
    #[error("encoding {kind} content as {content_type} failed: {reason}")]
    Failed {
        content_type: String,
        kind: String,
        reason: String,
    },
}
