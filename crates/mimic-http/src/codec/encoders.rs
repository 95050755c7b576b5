//! Response content encoders.

use super::content_type::ContentTypeMatcher;
use super::multipart::encode_multipart;
use super::{ContentKind, EncodeError, ResponseContent, APPLICATION_JSON};
use base64::Engine;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Encoder function: content to bytes. The chain is passed along so that
/// composite content (multipart) can encode its parts.
pub type Encoder =
    Arc<dyn Fn(&ResponseContent, &EncoderChain<'_>) -> Result<Vec<u8>, EncodeError> + Send + Sync>;

/// Wrap a closure as an [`Encoder`].
pub fn encoder<F>(f: F) -> Encoder
where
    F: Fn(&ResponseContent, &EncoderChain<'_>) -> Result<Vec<u8>, EncodeError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
struct EncoderMapping {
    content_type: ContentTypeMatcher,
    kind: ContentKind,
    encoder: Encoder,
}

/// Ordered set of encoders keyed by `(content type, content kind)`.
#[derive(Clone, Default)]
pub struct ResponseEncoders {
    mappings: Vec<EncoderMapping>,
}

impl ResponseEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text as UTF-8 for textual types, JSON values via serde_json, and
    /// multipart content for `multipart/*`.
    pub fn with_defaults() -> Self {
        let mut encoders = Self::new();
        for content_type in [
            "text/*",
            APPLICATION_JSON,
            "application/xml",
            "application/javascript",
            "application/x-www-form-urlencoded",
        ] {
            encoders.register(content_type, ContentKind::Text, text_encoder());
        }
        encoders.register(APPLICATION_JSON, ContentKind::Json, json_encoder());
        encoders.register("text/json", ContentKind::Json, json_encoder());
        if let Ok(vendor_json) = ContentTypeMatcher::pattern(r"^application/[^;]+\+json") {
            encoders.register(vendor_json.clone(), ContentKind::Json, json_encoder());
            encoders.register(vendor_json, ContentKind::Text, text_encoder());
        }
        encoders.register("multipart/*", ContentKind::Multipart, multipart_encoder());
        encoders
    }

    /// Register an encoder; an existing entry with the same key is replaced.
    pub fn register(
        &mut self,
        content_type: impl Into<ContentTypeMatcher>,
        kind: ContentKind,
        encoder: Encoder,
    ) {
        let content_type = content_type.into();
        match self
            .mappings
            .iter_mut()
            .find(|m| m.kind == kind && m.content_type.same_key(&content_type))
        {
            Some(existing) => existing.encoder = encoder,
            None => self.mappings.push(EncoderMapping {
                content_type,
                kind,
                encoder,
            }),
        }
    }

    /// Register a typed encoder for [`ResponseContent::Object`] values of type `T`.
    pub fn register_object<T, F>(&mut self, content_type: impl Into<ContentTypeMatcher>, f: F)
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        let content_type = content_type.into();
        let label = content_type.to_string();
        self.register(
            content_type,
            ContentKind::of::<T>(),
            encoder(move |content, _chain| {
                let failed = |reason: String| EncodeError::Failed {
                    content_type: label.clone(),
                    kind: content.kind_name().to_string(),
                    reason,
                };
                match content {
                    ResponseContent::Object { value, .. } => match value.downcast_ref::<T>() {
                        Some(typed) => f(typed).map_err(failed),
                        None => Err(failed("content is not of the registered type".to_string())),
                    },
                    _ => Err(failed("expected an object value".to_string())),
                }
            }),
        );
    }

    pub fn find(&self, content_type: &str, kind: ContentKind) -> Option<&Encoder> {
        self.mappings
            .iter()
            .find(|m| m.kind == kind && m.content_type.matches(content_type))
            .map(|m| &m.encoder)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }
}

impl fmt::Debug for ResponseEncoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.mappings
                    .iter()
                    .map(|m| format!("{} ({:?})", m.content_type, m.kind)),
            )
            .finish()
    }
}

/// Two-level encoder lookup: response-scoped entries before server-wide ones.
#[derive(Clone, Copy)]
pub struct EncoderChain<'a> {
    local: &'a ResponseEncoders,
    global: &'a ResponseEncoders,
}

impl<'a> EncoderChain<'a> {
    pub fn new(local: &'a ResponseEncoders, global: &'a ResponseEncoders) -> Self {
        Self { local, global }
    }

    pub fn resolve(&self, content_type: &str, kind: ContentKind) -> Option<&'a Encoder> {
        self.local
            .find(content_type, kind)
            .or_else(|| self.global.find(content_type, kind))
    }

    /// Encode content declared as `content_type`.
    pub fn encode(
        &self,
        content: &ResponseContent,
        content_type: &str,
    ) -> Result<Vec<u8>, EncodeError> {
        let encoder = self.resolve(content_type, content.kind()).ok_or_else(|| {
            EncodeError::MissingEncoder {
                content_type: content_type.to_string(),
                kind: content.kind_name().to_string(),
            }
        })?;
        encoder(content, self)
    }
}

/// Text content as UTF-8 bytes; JSON values render to their text form.
pub fn text_encoder() -> Encoder {
    encoder(|content, _chain| match content {
        ResponseContent::Text(text) => Ok(text.as_bytes().to_vec()),
        ResponseContent::Json(json) => Ok(json.to_string().into_bytes()),
        other => Err(EncodeError::Failed {
            content_type: "text".to_string(),
            kind: other.kind_name().to_string(),
            reason: "text encoder only accepts text or json content".to_string(),
        }),
    })
}

/// JSON values serialised with serde_json; text is assumed to be JSON already.
pub fn json_encoder() -> Encoder {
    encoder(|content, _chain| match content {
        ResponseContent::Json(json) => {
            serde_json::to_vec(json).map_err(|e| EncodeError::Failed {
                content_type: APPLICATION_JSON.to_string(),
                kind: "json".to_string(),
                reason: e.to_string(),
            })
        }
        ResponseContent::Text(text) => Ok(text.as_bytes().to_vec()),
        other => Err(EncodeError::Failed {
            content_type: APPLICATION_JSON.to_string(),
            kind: other.kind_name().to_string(),
            reason: "json encoder only accepts json or text content".to_string(),
        }),
    })
}

/// Text content base64-encoded.
pub fn base64_encoder() -> Encoder {
    encoder(|content, _chain| match content {
        ResponseContent::Text(text) => Ok(base64::engine::general_purpose::STANDARD
            .encode(text.as_bytes())
            .into_bytes()),
        other => Err(EncodeError::Failed {
            content_type: "base64".to_string(),
            kind: other.kind_name().to_string(),
            reason: "base64 encoder only accepts text content".to_string(),
        }),
    })
}

/// Multipart content rendered with its boundary.
pub fn multipart_encoder() -> Encoder {
    encoder(|content, chain| match content {
        ResponseContent::Multipart(multipart) => encode_multipart(multipart, chain),
        other => Err(EncodeError::Failed {
            content_type: "multipart/*".to_string(),
            kind: other.kind_name().to_string(),
            reason: "multipart content is required".to_string(),
        }),
    })
}
