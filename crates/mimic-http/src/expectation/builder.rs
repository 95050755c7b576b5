//! Configurators for expectations and their responses.
//!
//! Both builders are handed out as `&mut` to configuration closures.
//! Declaration errors (a bad regex, a zero chunk count) are collected while
//! configuring and reported when the expectation is registered.

use super::core::{Expectation, Listener};
use super::types::ConfigError;
use crate::codec::{
    ContentKind, ContentTypeMatcher, Decoder, Encoder, MultipartContent, ResponseContent,
    RequestDecoders, APPLICATION_JSON, TEXT_PLAIN,
};
use crate::predicate::{
    BodyMatcher, CallCountConstraint, CookieMatcher, MethodMatcher, RequestPredicate,
    ValueMatcher, ValuesMatcher,
};
use crate::request::{Cookie, IncomingRequest, Scheme};
use crate::response::{ChunkingConfig, ResponseBody, ResponseDefinition};
use bytes::Bytes;
use std::time::Duration;

/// Declares the predicates, responses and bookkeeping of one expectation.
#[derive(Default)]
pub struct ExpectationBuilder {
    description: Option<String>,
    predicates: Vec<RequestPredicate>,
    constraint: CallCountConstraint,
    responses: Vec<ResponseDefinition>,
    listeners: Vec<Listener>,
    decoders: RequestDecoders,
    errors: Vec<ConfigError>,
}

impl ExpectationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with method and path predicates.
    pub fn for_route(method: impl Into<MethodMatcher>, path: impl Into<ValueMatcher>) -> Self {
        let method = method.into();
        let path = path.into();
        let mut builder = Self::new();
        builder.description = Some(format!("{method} {path}"));
        builder.predicates.push(RequestPredicate::Method(method));
        builder.predicates.push(RequestPredicate::Path(path));
        builder
    }

    /// Human-readable name used in verification failures and reports.
    pub fn describe(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn method(&mut self, method: impl Into<MethodMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Method(method.into()));
        self
    }

    pub fn path(&mut self, path: impl Into<ValueMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Path(path.into()));
        self
    }

    /// Path matched against a regex.
    pub fn path_matching(&mut self, pattern: &str) -> &mut Self {
        match ValueMatcher::regex(pattern) {
            Ok(matcher) => self.path(matcher),
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn scheme(&mut self, scheme: Scheme) -> &mut Self {
        self.predicates.push(RequestPredicate::Scheme(scheme));
        self
    }

    /// Require HTTPS (`true`) or plain HTTP (`false`).
    pub fn secure(&mut self, secure: bool) -> &mut Self {
        self.scheme(if secure { Scheme::Https } else { Scheme::Http })
    }

    pub fn query(&mut self, name: impl Into<String>, values: impl Into<ValuesMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Query {
            name: name.into(),
            values: values.into(),
        });
        self
    }

    /// Query parameter with exactly these values, in any order.
    pub fn queries<I, S>(&mut self, name: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ValueMatcher>,
    {
        self.query(name, ValuesMatcher::exactly(values))
    }

    pub fn header(&mut self, name: impl Into<String>, values: impl Into<ValuesMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Header {
            name: name.into(),
            values: values.into(),
        });
        self
    }

    pub fn cookie(&mut self, name: impl Into<String>, matcher: impl Into<CookieMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Cookie {
            name: name.into(),
            matcher: matcher.into(),
        });
        self
    }

    pub fn cookie_absent(&mut self, name: impl Into<String>) -> &mut Self {
        self.predicates
            .push(RequestPredicate::CookieAbsent(name.into()));
        self
    }

    pub fn no_cookies(&mut self) -> &mut Self {
        self.predicates.push(RequestPredicate::NoCookies);
        self
    }

    /// Parameter of a urlencoded form body.
    pub fn param(&mut self, name: impl Into<String>, values: impl Into<ValuesMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Param {
            name: name.into(),
            values: values.into(),
        });
        self
    }

    /// Body of the given content type, decoded and checked by `matcher`.
    pub fn body(&mut self, content_type: impl Into<String>, matcher: impl Into<BodyMatcher>) -> &mut Self {
        self.predicates.push(RequestPredicate::Body {
            content_type: content_type.into(),
            matcher: matcher.into(),
        });
        self
    }

    pub fn matching<F>(&mut self, description: impl Into<String>, test: F) -> &mut Self
    where
        F: Fn(&IncomingRequest) -> bool + Send + Sync + 'static,
    {
        self.predicates
            .push(RequestPredicate::custom(description, test));
        self
    }

    pub fn called(&mut self, constraint: impl Into<CallCountConstraint>) -> &mut Self {
        self.constraint = constraint.into();
        self
    }

    /// Decoder used only when matching this expectation.
    pub fn decoder(&mut self, content_type: impl Into<ContentTypeMatcher>, decoder: Decoder) -> &mut Self {
        self.decoders.register(content_type, decoder);
        self
    }

    pub fn listener<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&IncomingRequest) + Send + Sync + 'static,
    {
        self.listeners.push(std::sync::Arc::new(listener));
        self
    }

    /// Append a response to the cascade.
    pub fn responds<F>(&mut self, configure: F) -> &mut Self
    where
        F: FnOnce(&mut ResponseBuilder),
    {
        let mut response = ResponseBuilder::new();
        configure(&mut response);
        match response.build() {
            Ok(definition) => self.responses.push(definition),
            Err(e) => self.errors.push(e),
        }
        self
    }

    fn fail(&mut self, error: ConfigError) -> &mut Self {
        self.errors.push(error);
        self
    }

    pub(crate) fn build(mut self) -> Result<Expectation, ConfigError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        let description = self.description.unwrap_or_else(|| {
            let parts: Vec<String> = self.predicates.iter().map(ToString::to_string).collect();
            parts.join(" and ")
        });
        Ok(Expectation::new(
            description,
            self.predicates,
            self.constraint,
            self.responses,
            self.listeners,
            self.decoders,
        ))
    }
}

/// Declares one response.
#[derive(Default)]
pub struct ResponseBuilder {
    definition: ResponseDefinition,
    errors: Vec<ConfigError>,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        if (100..=999).contains(&status) {
            self.definition.status = status;
        } else {
            self.errors.push(ConfigError::InvalidStatus(status));
        }
        self
    }

    /// Append a header value; repeated names keep every value in order.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.definition.headers.append(name, value);
        self
    }

    /// Add (or replace) a response cookie.
    pub fn cookie(&mut self, name: impl Into<String>, cookie: impl Into<Cookie>) -> &mut Self {
        let name = name.into();
        let cookie = cookie.into();
        match self.definition.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = cookie,
            None => self.definition.cookies.push((name, cookie)),
        }
        self
    }

    pub fn content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.definition.content_type = content_type.into();
        self
    }

    /// Content encoded for `content_type`.
    pub fn body(&mut self, content: impl Into<ResponseContent>, content_type: impl Into<String>) -> &mut Self {
        self.definition.body = ResponseBody::Content(content.into());
        self.content_type(content_type)
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        let text: String = text.into();
        self.body(text, TEXT_PLAIN)
    }

    pub fn json(&mut self, value: serde_json::Value) -> &mut Self {
        self.body(value, APPLICATION_JSON)
    }

    /// Multipart body; the content type carries the content's boundary.
    pub fn multipart(&mut self, content: MultipartContent) -> &mut Self {
        let content_type = content.content_type();
        self.body(content, content_type)
    }

    /// Raw bytes, sent unchanged.
    pub fn bytes(&mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> &mut Self {
        self.definition.body = ResponseBody::Raw(body.into());
        self.content_type(content_type)
    }

    pub fn chunked(&mut self, chunks: usize, delay: Duration) -> &mut Self {
        match ChunkingConfig::new(chunks, delay) {
            Ok(config) => self.definition.chunking = Some(config),
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Wait before the response is sent.
    pub fn delay(&mut self, delay: Duration) -> &mut Self {
        self.definition.delay = Some(delay);
        self
    }

    /// Encoder used only for this response.
    pub fn encoder(
        &mut self,
        content_type: impl Into<ContentTypeMatcher>,
        kind: ContentKind,
        encoder: Encoder,
    ) -> &mut Self {
        self.definition.encoders.register(content_type, kind, encoder);
        self
    }

    pub fn build(mut self) -> Result<ResponseDefinition, ConfigError> {
        if self.errors.is_empty() {
            Ok(self.definition)
        } else {
            Err(self.errors.remove(0))
        }
    }
}
