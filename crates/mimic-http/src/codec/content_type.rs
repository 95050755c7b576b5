//! Content-type matching used to key decoders and encoders.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate over a MIME type string.
///
/// `Mime` compares `type/subtype` case-insensitively, ignores parameters
/// (`; charset=...`, `; boundary=...`) and honours `*` in either position.
#[derive(Debug, Clone)]
pub enum ContentTypeMatcher {
    Mime { main: String, sub: String },
    Prefix(String),
    Pattern(Arc<Regex>),
}

impl ContentTypeMatcher {
    /// Exact MIME match, e.g. `application/json` or `text/*`.
    pub fn mime(value: &str) -> Self {
        let (main, sub) = split_essence(value);
        Self::Mime { main, sub }
    }

    pub fn prefix(value: impl Into<String>) -> Self {
        Self::Prefix(value.into().to_ascii_lowercase())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Arc::new(Regex::new(pattern)?)))
    }

    pub fn matches(&self, content_type: &str) -> bool {
        match self {
            Self::Mime { main, sub } => {
                let (m, s) = split_essence(content_type);
                (main == "*" || m == "*" || *main == m) && (sub == "*" || s == "*" || *sub == s)
            }
            Self::Prefix(prefix) => content_type.to_ascii_lowercase().starts_with(prefix.as_str()),
            Self::Pattern(regex) => regex.is_match(content_type),
        }
    }

    /// True when this matcher names exactly the essence of `content_type`
    /// (no wildcard involved). Used to break ties between overlapping entries.
    pub fn is_exact_for(&self, content_type: &str) -> bool {
        match self {
            Self::Mime { main, sub } => {
                main != "*" && sub != "*" && (main.clone(), sub.clone()) == split_essence(content_type)
            }
            _ => false,
        }
    }

    /// Two matchers describe the same registration key.
    pub fn same_key(&self, other: &ContentTypeMatcher) -> bool {
        self.to_string() == other.to_string()
    }
}

impl From<&str> for ContentTypeMatcher {
    fn from(value: &str) -> Self {
        Self::mime(value)
    }
}

impl From<String> for ContentTypeMatcher {
    fn from(value: String) -> Self {
        Self::mime(&value)
    }
}

impl fmt::Display for ContentTypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mime { main, sub } => write!(f, "{main}/{sub}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Lowercased `(type, subtype)` of a content type; a missing subtype is `*`.
pub fn split_essence(content_type: &str) -> (String, String) {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.split_once('/') {
        Some((main, sub)) => (main.trim().to_string(), sub.trim().to_string()),
        None => (essence, "*".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_ignores_parameters_and_case() {
        let matcher = ContentTypeMatcher::mime("application/json");
        assert!(matcher.matches("application/json"));
        assert!(matcher.matches("Application/JSON; charset=utf-8"));
        assert!(!matcher.matches("application/xml"));
    }

    #[test]
    fn test_mime_wildcards() {
        let matcher = ContentTypeMatcher::mime("text/*");
        assert!(matcher.matches("text/plain"));
        assert!(matcher.matches("text/html; charset=utf-8"));
        assert!(!matcher.matches("application/json"));
        assert!(ContentTypeMatcher::mime("*/*").matches("image/png"));
    }

    #[test]
    fn test_prefix_and_pattern() {
        assert!(ContentTypeMatcher::prefix("multipart/").matches("multipart/form-data; boundary=x"));
        let pattern = ContentTypeMatcher::pattern(r"^application/.+\+json").unwrap();
        assert!(pattern.matches("application/vnd.api+json"));
        assert!(!pattern.matches("application/json"));
    }

    #[test]
    fn test_exactness() {
        assert!(ContentTypeMatcher::mime("text/plain").is_exact_for("text/plain; charset=utf-8"));
        assert!(!ContentTypeMatcher::mime("text/*").is_exact_for("text/plain"));
    }
}
