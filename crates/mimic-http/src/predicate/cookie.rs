//! Cookie predicate over the individual cookie attributes.

use super::matcher::ValueMatcher;
use crate::request::Cookie;
use std::fmt;

/// Matches a request cookie. Attributes left unset are not checked.
#[derive(Debug, Clone, Default)]
pub struct CookieMatcher {
    value: Option<ValueMatcher>,
    domain: Option<ValueMatcher>,
    path: Option<ValueMatcher>,
    comment: Option<ValueMatcher>,
    max_age: Option<i64>,
    version: Option<u32>,
    secure: Option<bool>,
    http_only: Option<bool>,
}

impl CookieMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, matcher: impl Into<ValueMatcher>) -> Self {
        self.value = Some(matcher.into());
        self
    }

    pub fn domain(mut self, matcher: impl Into<ValueMatcher>) -> Self {
        self.domain = Some(matcher.into());
        self
    }

    pub fn path(mut self, matcher: impl Into<ValueMatcher>) -> Self {
        self.path = Some(matcher.into());
        self
    }

    pub fn comment(mut self, matcher: impl Into<ValueMatcher>) -> Self {
        self.comment = Some(matcher.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    pub fn matches(&self, cookie: &Cookie) -> bool {
        fn optional(matcher: &Option<ValueMatcher>, actual: Option<&str>) -> bool {
            match (matcher, actual) {
                (None, _) => true,
                (Some(m), Some(actual)) => m.matches(actual),
                (Some(_), None) => false,
            }
        }

        self.value.as_ref().map_or(true, |m| m.matches(&cookie.value))
            && optional(&self.domain, cookie.domain.as_deref())
            && optional(&self.path, cookie.path.as_deref())
            && optional(&self.comment, cookie.comment.as_deref())
            && self.max_age.map_or(true, |age| cookie.max_age == Some(age))
            && self.version.map_or(true, |v| cookie.version == v)
            && self.secure.map_or(true, |s| cookie.secure == s)
            && self.http_only.map_or(true, |h| cookie.http_only == h)
    }
}

impl From<&str> for CookieMatcher {
    fn from(value: &str) -> Self {
        Self::new().value(value)
    }
}

impl From<ValueMatcher> for CookieMatcher {
    fn from(value: ValueMatcher) -> Self {
        Self::new().value(value)
    }
}

impl fmt::Display for CookieMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(m) = &self.value {
            parts.push(format!("value {m}"));
        }
        if let Some(m) = &self.domain {
            parts.push(format!("domain {m}"));
        }
        if let Some(m) = &self.path {
            parts.push(format!("path {m}"));
        }
        if let Some(m) = &self.comment {
            parts.push(format!("comment {m}"));
        }
        if let Some(age) = self.max_age {
            parts.push(format!("max-age {age}"));
        }
        if let Some(version) = self.version {
            parts.push(format!("version {version}"));
        }
        if let Some(secure) = self.secure {
            parts.push(format!("secure {secure}"));
        }
        if let Some(http_only) = self.http_only {
            parts.push(format!("http-only {http_only}"));
        }
        if parts.is_empty() {
            f.write_str("any cookie")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_only() {
        let matcher = CookieMatcher::from("abc");
        assert!(matcher.matches(&Cookie::new("abc")));
        assert!(!matcher.matches(&Cookie::new("xyz")));
    }

    #[test]
    fn test_attribute_fields() {
        let cookie = Cookie::new("v")
            .domain("example.com")
            .path("/")
            .max_age(60)
            .secure(true)
            .http_only(true)
            .version(1);

        let matcher = CookieMatcher::new()
            .value(ValueMatcher::starts_with("v"))
            .domain("example.com")
            .max_age(60)
            .secure(true)
            .http_only(true)
            .version(1);
        assert!(matcher.matches(&cookie));

        assert!(!CookieMatcher::new().secure(false).matches(&cookie));
        assert!(!CookieMatcher::new().comment("note").matches(&cookie));
        assert!(CookieMatcher::new().matches(&cookie));
    }

    #[test]
    fn test_display() {
        let matcher = CookieMatcher::from("abc").secure(true);
        assert_eq!(matcher.to_string(), "value equal to \"abc\", secure true");
        assert_eq!(CookieMatcher::new().to_string(), "any cookie");
    }
}
