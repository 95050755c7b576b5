//! Request body decoders.

use super::content_type::ContentTypeMatcher;
use super::multipart::decode_multipart;
use super::{
    DecodeError, DecodedValue, APPLICATION_JSON, APPLICATION_OCTET_STREAM, APPLICATION_URLENCODED,
    MULTIPART_FORMDATA, MULTIPART_MIXED, TEXT_PLAIN,
};
use crate::request::parse_query_string;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Decoder function: body bytes plus context to a decoded value.
pub type Decoder =
    Arc<dyn Fn(&[u8], &DecodingContext<'_>) -> Result<DecodedValue, DecodeError> + Send + Sync>;

/// Wrap a closure as a [`Decoder`].
pub fn decoder<F>(f: F) -> Decoder
where
    F: Fn(&[u8], &DecodingContext<'_>) -> Result<DecodedValue, DecodeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Information about the request body handed to a decoder.
pub struct DecodingContext<'a> {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub character_encoding: Option<String>,
    /// Chain in effect, so composite decoders can decode nested content.
    pub chain: DecoderChain<'a>,
}

impl DecodingContext<'_> {
    fn content_type_or_default(&self) -> String {
        self.content_type.clone().unwrap_or_default()
    }
}

/// Ordered set of decoders keyed by content type.
#[derive(Clone, Default)]
pub struct RequestDecoders {
    mappings: Vec<(ContentTypeMatcher, Decoder)>,
}

impl RequestDecoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoders for the common content types: plain text, JSON,
    /// urlencoded forms, multipart and octet streams.
    pub fn with_defaults() -> Self {
        let mut decoders = Self::new();
        decoders.register(TEXT_PLAIN, text_decoder());
        decoders.register("text/*", text_decoder());
        decoders.register(APPLICATION_JSON, json_decoder());
        decoders.register("text/json", json_decoder());
        decoders.register(APPLICATION_URLENCODED, form_decoder());
        decoders.register(MULTIPART_FORMDATA, multipart_decoder());
        decoders.register(MULTIPART_MIXED, multipart_decoder());
        decoders.register(APPLICATION_OCTET_STREAM, passthrough_decoder());
        decoders
    }

    /// Register a decoder; an existing entry with the same key is replaced.
    pub fn register(&mut self, content_type: impl Into<ContentTypeMatcher>, decoder: Decoder) {
        let matcher = content_type.into();
        self.mappings.retain(|(m, _)| !m.same_key(&matcher));
        self.mappings.push((matcher, decoder));
    }

    /// Find the decoder for a content type.
    ///
    /// When several entries match, an exact (non-wildcard) entry wins,
    /// otherwise the earliest registration.
    pub fn find(&self, content_type: &str) -> Option<&Decoder> {
        let first = self
            .mappings
            .iter()
            .find(|(matcher, _)| matcher.matches(content_type))
            .map(|(_, d)| d)?;
        let exact = self
            .mappings
            .iter()
            .find(|(matcher, _)| matcher.is_exact_for(content_type))
            .map(|(_, d)| d);
        Some(exact.unwrap_or(first))
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }
}

impl fmt::Debug for RequestDecoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mappings.iter().map(|(m, _)| m.to_string()))
            .finish()
    }
}

/// Two-level decoder lookup: expectation-scoped entries before server-wide ones.
#[derive(Clone, Copy)]
pub struct DecoderChain<'a> {
    local: &'a RequestDecoders,
    global: &'a RequestDecoders,
}

impl<'a> DecoderChain<'a> {
    pub fn new(local: &'a RequestDecoders, global: &'a RequestDecoders) -> Self {
        Self { local, global }
    }

    pub fn resolve(&self, content_type: &str) -> Option<&'a Decoder> {
        self.local
            .find(content_type)
            .or_else(|| self.global.find(content_type))
    }

    /// Decode with the resolved decoder, or fall back to raw bytes when
    /// nothing is registered for the content type.
    pub fn decode(
        &self,
        body: &[u8],
        content_type: &str,
        character_encoding: Option<String>,
    ) -> Result<DecodedValue, DecodeError> {
        self.decode_as(body, content_type, content_type, character_encoding)
    }

    /// Like [`decode`](Self::decode), but the decoder is resolved by `lookup`
    /// while the decoder itself sees the full `content_type`, parameters such
    /// as `boundary` included.
    pub fn decode_as(
        &self,
        body: &[u8],
        lookup: &str,
        content_type: &str,
        character_encoding: Option<String>,
    ) -> Result<DecodedValue, DecodeError> {
        let ctx = DecodingContext {
            content_length: body.len() as u64,
            content_type: Some(content_type.to_string()),
            character_encoding,
            chain: *self,
        };
        match self.resolve(lookup) {
            Some(decoder) => decoder(body, &ctx),
            None => Ok(DecodedValue::Bytes(Bytes::copy_from_slice(body))),
        }
    }
}

/// Leaves the body as raw bytes.
pub fn passthrough_decoder() -> Decoder {
    decoder(|body, _ctx| Ok(DecodedValue::Bytes(Bytes::copy_from_slice(body))))
}

/// Decodes the body as a string in the declared character encoding
/// (UTF-8 when none is declared; ISO-8859-1/Latin-1 and US-ASCII are mapped
/// byte for byte).
pub fn text_decoder() -> Decoder {
    decoder(|body, ctx| {
        let charset = ctx
            .character_encoding
            .as_deref()
            .unwrap_or("utf-8")
            .to_ascii_lowercase();
        let text: String = match charset.as_str() {
            "iso-8859-1" | "latin1" | "latin-1" | "us-ascii" | "ascii" => {
                body.iter().map(|&b| b as char).collect()
            }
            _ => String::from_utf8_lossy(body).into_owned(),
        };
        Ok(DecodedValue::Text(text))
    })
}

/// Parses the body as JSON.
pub fn json_decoder() -> Decoder {
    decoder(|body, ctx| {
        serde_json::from_slice(body)
            .map(DecodedValue::Json)
            .map_err(|e| DecodeError::Malformed {
                content_type: ctx.content_type_or_default(),
                reason: e.to_string(),
            })
    })
}

/// Parses an `application/x-www-form-urlencoded` body into a multi-valued map.
pub fn form_decoder() -> Decoder {
    decoder(|body, _ctx| {
        let raw = String::from_utf8_lossy(body);
        Ok(DecodedValue::Form(parse_query_string(&raw)))
    })
}

/// Parses a multipart body into [`super::MultipartContent`].
pub fn multipart_decoder() -> Decoder {
    decoder(decode_multipart)
}
