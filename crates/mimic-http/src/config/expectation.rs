//! Declarative expectations and responses.

use crate::codec::{APPLICATION_OCTET_STREAM, TEXT_PLAIN};
use crate::expectation::{ConfigError, ExpectationBuilder, ResponseBuilder};
use crate::predicate::{BodyMatcher, CallCountConstraint, MethodMatcher, StringMatcher};
use base64::Engine;
use bytes::Bytes;
use hyper::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Omitted means any method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub path: StringMatcher,
    /// Header names compare case-insensitively, values case-sensitively
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, StringMatcher>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, StringMatcher>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, StringMatcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyConfig>,
    #[serde(default)]
    pub called: CallCountConstraint,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<ResponseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyConfig {
    #[serde(default = "default_body_content_type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<StringMatcher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// JSON pointer (`/a/0/b`) to matcher
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub json_pointers: BTreeMap<String, StringMatcher>,
    /// Form field name to matcher
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form: BTreeMap<String, StringMatcher>,
    #[serde(default)]
    pub not_empty: bool,
}

fn default_body_content_type() -> String {
    TEXT_PLAIN.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Raw body bytes, base64-encoded in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(default)]
    pub chunk_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            content_type: None,
            text: None,
            json: None,
            base64: None,
            chunks: None,
            chunk_delay_ms: 0,
            delay_ms: None,
        }
    }
}

pub(crate) fn parse_method(name: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(name.to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(name.to_string()))
}

impl ExpectationConfig {
    pub(crate) fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(method) = &self.method {
            parse_method(method)?;
        }
        if let Some(body) = &self.body {
            body.validate()?;
        }
        for response in &self.responses {
            response.validate()?;
        }
        Ok(())
    }

    /// Compile into a builder ready for registration.
    pub(crate) fn to_builder(&self) -> Result<ExpectationBuilder, anyhow::Error> {
        let method = match &self.method {
            Some(name) => MethodMatcher::from(parse_method(name)?),
            None => MethodMatcher::Any,
        };
        let mut builder = ExpectationBuilder::for_route(method, self.path.compile(true)?);
        if let Some(description) = &self.description {
            builder.describe(description.as_str());
        }
        for (name, matcher) in &self.headers {
            builder.header(name.as_str(), matcher.compile_values(true)?);
        }
        for (name, matcher) in &self.query {
            builder.query(name.as_str(), matcher.compile_values(true)?);
        }
        for (name, matcher) in &self.cookies {
            match matcher {
                StringMatcher::Exists(false) => builder.cookie_absent(name.as_str()),
                other => builder.cookie(name.as_str(), other.compile(true)?),
            };
        }
        if let Some(body) = &self.body {
            for matcher in body.compile()? {
                builder.body(body.content_type.as_str(), matcher);
            }
        }
        builder.called(self.called);
        for response in &self.responses {
            let raw = response.raw_body()?;
            builder.responds(|r| response.apply(r, raw));
        }
        Ok(builder)
    }
}

impl BodyConfig {
    fn validate(&self) -> Result<(), anyhow::Error> {
        let declared = usize::from(self.text.is_some())
            + usize::from(self.json.is_some())
            + self.json_pointers.len()
            + self.form.len()
            + usize::from(self.not_empty);
        if declared == 0 {
            anyhow::bail!(
                "Body matcher for '{}' declares nothing to match. \
                 Use one of: text, json, jsonPointers, form, notEmpty",
                self.content_type
            );
        }
        Ok(())
    }

    fn compile(&self) -> Result<Vec<BodyMatcher>, anyhow::Error> {
        let mut matchers = Vec::new();
        if self.not_empty {
            matchers.push(BodyMatcher::NotEmpty);
        }
        if let Some(text) = &self.text {
            matchers.push(BodyMatcher::text(text.compile(true)?));
        }
        if let Some(json) = &self.json {
            matchers.push(BodyMatcher::Json(json.clone()));
        }
        for (pointer, matcher) in &self.json_pointers {
            matchers.push(BodyMatcher::json_pointer(pointer.as_str(), matcher.compile(true)?));
        }
        for (name, matcher) in &self.form {
            matchers.push(BodyMatcher::Form {
                name: name.clone(),
                values: matcher.compile_values(true)?,
            });
        }
        Ok(matchers)
    }
}

impl ResponseConfig {
    fn validate(&self) -> Result<(), anyhow::Error> {
        let bodies = usize::from(self.text.is_some())
            + usize::from(self.json.is_some())
            + usize::from(self.base64.is_some());
        if bodies > 1 {
            anyhow::bail!("A response may declare at most one of: text, json, base64");
        }
        if !(100..=999).contains(&self.status) {
            anyhow::bail!("Invalid response status {}", self.status);
        }
        if self.chunks == Some(0) {
            anyhow::bail!("Response chunk count must be at least 1");
        }
        self.raw_body()?;
        Ok(())
    }

    fn raw_body(&self) -> Result<Option<Bytes>, ConfigError> {
        match &self.base64 {
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
                Ok(Some(Bytes::from(bytes)))
            }
            None => Ok(None),
        }
    }

    fn apply(&self, r: &mut ResponseBuilder, raw: Option<Bytes>) {
        r.status(self.status);
        for (name, value) in &self.headers {
            r.header(name.as_str(), value.as_str());
        }
        for (name, value) in &self.cookies {
            r.cookie(name.as_str(), value.as_str());
        }
        if let Some(text) = &self.text {
            r.text(text.as_str());
        } else if let Some(json) = &self.json {
            r.json(json.clone());
        } else if let Some(bytes) = raw {
            let content_type = self.content_type.as_deref().unwrap_or(APPLICATION_OCTET_STREAM);
            r.bytes(bytes, content_type);
        }
        if let Some(content_type) = &self.content_type {
            r.content_type(content_type.as_str());
        }
        if let Some(chunks) = self.chunks {
            r.chunked(chunks, Duration::from_millis(self.chunk_delay_ms));
        }
        if let Some(delay) = self.delay_ms {
            r.delay(Duration::from_millis(delay));
        }
    }
}
