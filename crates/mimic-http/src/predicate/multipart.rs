//! Matcher over decoded multipart bodies.
//!
//! One predicate per named field. Fields the matcher does not name are never
//! checked; a named field missing from the content fails the match.

use super::matcher::ValueMatcher;
use crate::codec::{DecodedValue, MultipartContent, MultipartPart, PartValue};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Predicate over the value of one part.
#[derive(Clone)]
pub enum PartValueMatcher {
    /// Text part compared on its decoded string; structured parts compare
    /// on their UTF-8 source
    Text(ValueMatcher),
    /// Part decoded as JSON and equal to this value
    Json(serde_json::Value),
    /// Raw byte equality (text parts compare on their UTF-8 bytes)
    Bytes(Bytes),
    Custom {
        description: String,
        test: Arc<dyn Fn(&PartValue) -> bool + Send + Sync>,
    },
}

impl PartValueMatcher {
    pub fn custom<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&PartValue) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    pub fn matches(&self, value: &PartValue) -> bool {
        match (self, value) {
            (Self::Text(m), PartValue::Text(text)) => m.matches(text),
            (Self::Text(_), PartValue::Bytes(_)) => false,
            (Self::Text(m), PartValue::Decoded { raw, .. }) => {
                std::str::from_utf8(raw).is_ok_and(|text| m.matches(text))
            }
            (Self::Json(expected), actual) => {
                matches!(actual.decoded(), Some(DecodedValue::Json(json)) if json == expected)
            }
            (Self::Bytes(expected), actual) => expected.as_ref() == actual.as_bytes(),
            (Self::Custom { test, .. }, actual) => test(actual),
        }
    }
}

impl From<&str> for PartValueMatcher {
    fn from(value: &str) -> Self {
        Self::Text(ValueMatcher::equals(value))
    }
}

impl From<ValueMatcher> for PartValueMatcher {
    fn from(value: ValueMatcher) -> Self {
        Self::Text(value)
    }
}

impl From<serde_json::Value> for PartValueMatcher {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<Vec<u8>> for PartValueMatcher {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl fmt::Display for PartValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(m) => write!(f, "{m}"),
            Self::Json(json) => write!(f, "json {json}"),
            Self::Bytes(bytes) => write!(f, "bytes {:?}", bytes.as_ref()),
            Self::Custom { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for PartValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartValueMatcher({self})")
    }
}

#[derive(Debug, Clone, Default)]
struct PartMatcher {
    value: Option<PartValueMatcher>,
    content_type: Option<ValueMatcher>,
    file_name: Option<ValueMatcher>,
}

impl PartMatcher {
    fn matches(&self, part: &MultipartPart) -> bool {
        self.value.as_ref().map_or(true, |m| m.matches(&part.value))
            && self
                .content_type
                .as_ref()
                .map_or(true, |m| m.matches(&part.content_type))
            && self.file_name.as_ref().map_or(true, |m| {
                part.file_name.as_deref().is_some_and(|name| m.matches(name))
            })
    }
}

/// Matches a [`DecodedValue::Multipart`]; any other decoded value fails.
#[derive(Debug, Clone, Default)]
pub struct MultipartMatcher {
    fields: Vec<(String, PartMatcher)>,
}

impl MultipartMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, field: &str, matcher: PartMatcher) -> Self {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = matcher,
            None => self.fields.push((field.to_string(), matcher)),
        }
        self
    }

    /// The field must be present.
    pub fn has_part(self, field: &str) -> Self {
        self.with(field, PartMatcher::default())
    }

    pub fn part(self, field: &str, value: impl Into<PartValueMatcher>) -> Self {
        self.with(
            field,
            PartMatcher {
                value: Some(value.into()),
                ..Default::default()
            },
        )
    }

    pub fn typed_part(
        self,
        field: &str,
        content_type: impl Into<ValueMatcher>,
        value: impl Into<PartValueMatcher>,
    ) -> Self {
        self.with(
            field,
            PartMatcher {
                value: Some(value.into()),
                content_type: Some(content_type.into()),
                file_name: None,
            },
        )
    }

    pub fn file_part(
        self,
        field: &str,
        file_name: impl Into<ValueMatcher>,
        content_type: impl Into<ValueMatcher>,
        value: impl Into<PartValueMatcher>,
    ) -> Self {
        self.with(
            field,
            PartMatcher {
                value: Some(value.into()),
                content_type: Some(content_type.into()),
                file_name: Some(file_name.into()),
            },
        )
    }

    pub fn matches_content(&self, content: &MultipartContent) -> bool {
        self.fields.iter().all(|(field, matcher)| {
            content
                .parts()
                .iter()
                .filter(|p| p.field_name == *field)
                .any(|p| matcher.matches(p))
        })
    }

    pub fn matches(&self, value: &DecodedValue) -> bool {
        match value {
            DecodedValue::Multipart(content) => self.matches_content(content),
            _ => false,
        }
    }
}

impl fmt::Display for MultipartMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multipart with ")?;
        for (i, (field, m)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "part {field:?}")?;
            if let Some(name) = &m.file_name {
                write!(f, " file name {name}")?;
            }
            if let Some(ct) = &m.content_type {
                write!(f, " content type {ct}")?;
            }
            if let Some(value) = &m.value {
                write!(f, " value {value}")?;
            }
        }
        Ok(())
    }
}
