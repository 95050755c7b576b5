//! Body predicates and per-dispatch decode memoization.

use super::multipart::MultipartMatcher;
use super::matcher::ValueMatcher;
use super::values::ValuesMatcher;
use crate::codec::{DecodeError, DecodedValue, DecoderChain};
use crate::request::IncomingRequest;
use bytes::Bytes;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Predicate over a decoded request body.
#[derive(Clone)]
pub enum BodyMatcher {
    /// Decoded value equals this value
    Equals(DecodedValue),
    /// Decoded text matches
    Text(ValueMatcher),
    /// Decoded JSON equals this document
    Json(serde_json::Value),
    /// Value at a JSON pointer (`/a/0/b`) matches; strings compare unquoted
    JsonPointer { pointer: String, matcher: ValueMatcher },
    /// Decoded form has a matching parameter
    Form { name: String, values: ValuesMatcher },
    Multipart(MultipartMatcher),
    /// Raw body bytes equal these bytes, whatever the decoder produced
    Bytes(Bytes),
    /// Any body at all
    NotEmpty,
    Custom {
        description: String,
        test: Arc<dyn Fn(&DecodedValue) -> bool + Send + Sync>,
    },
}

impl BodyMatcher {
    pub fn text(matcher: impl Into<ValueMatcher>) -> Self {
        Self::Text(matcher.into())
    }

    pub fn json_pointer(pointer: impl Into<String>, matcher: impl Into<ValueMatcher>) -> Self {
        Self::JsonPointer {
            pointer: pointer.into(),
            matcher: matcher.into(),
        }
    }

    pub fn custom<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&DecodedValue) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Whether the matcher needs the decoded value (raw byte comparison
    /// and presence checks do not).
    pub(crate) fn needs_decoding(&self) -> bool {
        !matches!(self, Self::Bytes(_) | Self::NotEmpty)
    }

    pub fn matches_raw(&self, raw: &[u8]) -> bool {
        match self {
            Self::Bytes(expected) => expected.as_ref() == raw,
            Self::NotEmpty => !raw.is_empty(),
            _ => false,
        }
    }

    pub fn matches(&self, decoded: &DecodedValue) -> bool {
        match (self, decoded) {
            (Self::Equals(expected), actual) => expected == actual,
            (Self::Text(m), DecodedValue::Text(text)) => m.matches(text),
            (Self::Json(expected), DecodedValue::Json(actual)) => expected == actual,
            (Self::JsonPointer { pointer, matcher }, DecodedValue::Json(actual)) => {
                match actual.pointer(pointer) {
                    Some(serde_json::Value::String(s)) => matcher.matches(s),
                    Some(other) => matcher.matches(&other.to_string()),
                    None => false,
                }
            }
            (Self::Form { name, values }, DecodedValue::Form(form)) => values.matches(form.get_all(name)),
            (Self::Multipart(m), value) => m.matches(value),
            (Self::Custom { test, .. }, value) => test(value),
            (Self::Bytes(expected), DecodedValue::Bytes(actual)) => expected == actual,
            (Self::NotEmpty, _) => true,
            _ => false,
        }
    }
}

impl From<&str> for BodyMatcher {
    fn from(value: &str) -> Self {
        Self::Text(ValueMatcher::equals(value))
    }
}

impl From<ValueMatcher> for BodyMatcher {
    fn from(value: ValueMatcher) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for BodyMatcher {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<MultipartMatcher> for BodyMatcher {
    fn from(value: MultipartMatcher) -> Self {
        Self::Multipart(value)
    }
}

impl fmt::Display for BodyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(value) => write!(f, "equal to {value:?}"),
            Self::Text(m) => write!(f, "text {m}"),
            Self::Json(value) => write!(f, "json {value}"),
            Self::JsonPointer { pointer, matcher } => write!(f, "json at {pointer} {matcher}"),
            Self::Form { name, values } => write!(f, "form parameter {name} with {values}"),
            Self::Multipart(m) => write!(f, "{m}"),
            Self::Bytes(bytes) => write!(f, "bytes {:?}", bytes.as_ref()),
            Self::NotEmpty => f.write_str("not empty"),
            Self::Custom { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for BodyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyMatcher({self})")
    }
}

type CacheKey = (String, usize);

/// Decoded bodies for one dispatch call, keyed by content type and decoder
/// identity, so a body is decoded at most once per decoder.
#[derive(Default)]
pub struct BodyCache {
    entries: RefCell<Vec<(CacheKey, Result<Arc<DecodedValue>, DecodeError>)>>,
}

impl BodyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_decode(
        &self,
        key: CacheKey,
        decode: impl FnOnce() -> Result<DecodedValue, DecodeError>,
    ) -> Result<Arc<DecodedValue>, DecodeError> {
        if let Some((_, hit)) = self.entries.borrow().iter().find(|(k, _)| *k == key) {
            return hit.clone();
        }
        let result = decode().map(Arc::new);
        self.entries.borrow_mut().push((key, result.clone()));
        result
    }

    /// Number of distinct decodes performed.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Everything a predicate needs to evaluate one request against one
/// expectation: the request, the expectation's decoder chain, and the
/// dispatch-wide body cache.
pub struct MatchContext<'a> {
    pub request: &'a IncomingRequest,
    pub decoders: DecoderChain<'a>,
    pub cache: &'a BodyCache,
}

impl<'a> MatchContext<'a> {
    pub fn new(
        request: &'a IncomingRequest,
        decoders: DecoderChain<'a>,
        cache: &'a BodyCache,
    ) -> Self {
        Self {
            request,
            decoders,
            cache,
        }
    }

    /// Decode the request body as `content_type`. `None` when there is no body.
    pub fn decoded_body(&self, content_type: &str) -> Result<Option<Arc<DecodedValue>>, DecodeError> {
        let Some(body) = self.request.body() else {
            return Ok(None);
        };
        let decoder = self.decoders.resolve(content_type);
        // 0 marks the raw-bytes fallback
        let identity = decoder.map_or(0, |d| Arc::as_ptr(d) as *const () as usize);
        let key = (content_type.to_ascii_lowercase(), identity);
        self.cache
            .get_or_decode(key, || {
                let actual = self.request.content_type().unwrap_or(content_type);
                self.decoders.decode_as(
                    body,
                    content_type,
                    actual,
                    self.request.character_encoding(),
                )
            })
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decoder, RequestDecoders, APPLICATION_JSON, TEXT_PLAIN};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_text_and_json_matchers() {
        assert!(BodyMatcher::from("hello").matches(&DecodedValue::Text("hello".to_string())));
        assert!(!BodyMatcher::from("hello").matches(&DecodedValue::Json(serde_json::json!("hello"))));

        let doc = serde_json::json!({"user": {"name": "ada", "age": 36}});
        assert!(BodyMatcher::from(doc.clone()).matches(&DecodedValue::Json(doc.clone())));
        assert!(BodyMatcher::json_pointer("/user/name", "ada").matches(&DecodedValue::Json(doc.clone())));
        assert!(BodyMatcher::json_pointer("/user/age", "36").matches(&DecodedValue::Json(doc.clone())));
        assert!(!BodyMatcher::json_pointer("/user/missing", ValueMatcher::anything())
            .matches(&DecodedValue::Json(doc)));
    }

    #[test]
    fn test_bytes_fallback_supports_equality_only() {
        let raw = DecodedValue::Bytes(Bytes::from_static(b"\x01\x02"));
        assert!(BodyMatcher::Equals(raw.clone()).matches(&raw));
        assert!(!BodyMatcher::text(ValueMatcher::anything()).matches(&raw));
    }

    #[test]
    fn test_raw_matchers() {
        assert!(BodyMatcher::Bytes(Bytes::from_static(b"abc")).matches_raw(b"abc"));
        assert!(!BodyMatcher::NotEmpty.matches_raw(b""));
        assert!(!BodyMatcher::NotEmpty.needs_decoding());
    }

    #[test]
    fn test_cache_decodes_once_per_decoder() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut global = RequestDecoders::new();
        global.register(
            TEXT_PLAIN,
            decoder(move |body, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(DecodedValue::Text(String::from_utf8_lossy(body).into_owned()))
            }),
        );
        let local = RequestDecoders::new();
        let request = IncomingRequest::post("/").with_body("hi", TEXT_PLAIN);
        let cache = BodyCache::new();

        for _ in 0..3 {
            let ctx = MatchContext::new(&request, DecoderChain::new(&local, &global), &cache);
            let value = ctx.decoded_body(TEXT_PLAIN).unwrap().unwrap();
            assert_eq!(value.as_text(), Some("hi"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_keeps_decode_errors() {
        let global = RequestDecoders::with_defaults();
        let local = RequestDecoders::new();
        let request = IncomingRequest::post("/").with_body("{broken", APPLICATION_JSON);
        let cache = BodyCache::new();
        let ctx = MatchContext::new(&request, DecoderChain::new(&local, &global), &cache);
        assert!(ctx.decoded_body(APPLICATION_JSON).is_err());
        assert!(ctx.decoded_body(APPLICATION_JSON).is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_no_body_is_none() {
        let global = RequestDecoders::with_defaults();
        let local = RequestDecoders::new();
        let request = IncomingRequest::get("/");
        let cache = BodyCache::new();
        let ctx = MatchContext::new(&request, DecoderChain::new(&local, &global), &cache);
        assert!(ctx.decoded_body(TEXT_PLAIN).unwrap().is_none());
        assert!(cache.is_empty());
    }
}
