//! Declarative string matchers used in configuration files.
//!
//! A [`StringMatcher`] is the serde form (`{equals: ...}`, `{matches: ...}`,
//! ...); it compiles into a runtime [`ValueMatcher`] or, for multi-valued
//! fields, a [`ValuesMatcher`].

use super::matcher::ValueMatcher;
use super::values::ValuesMatcher;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum StringMatcher {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// Regex pattern
    Matches(String),
    /// Whether the field should exist at all
    Exists(bool),
}

impl Default for StringMatcher {
    fn default() -> Self {
        StringMatcher::Exists(true)
    }
}

impl StringMatcher {
    /// Compile into a single-value matcher. `exists: true` accepts any value,
    /// `exists: false` none.
    pub fn compile(&self, case_sensitive: bool) -> Result<ValueMatcher, regex::Error> {
        let matcher = match self {
            StringMatcher::Equals(v) => ValueMatcher::equals(v.as_str()),
            StringMatcher::Contains(v) => ValueMatcher::contains(v.as_str()),
            StringMatcher::StartsWith(v) => ValueMatcher::starts_with(v.as_str()),
            StringMatcher::EndsWith(v) => ValueMatcher::ends_with(v.as_str()),
            StringMatcher::Matches(pattern) => ValueMatcher::regex(pattern)?,
            StringMatcher::Exists(true) => ValueMatcher::anything(),
            StringMatcher::Exists(false) => ValueMatcher::not(ValueMatcher::anything()),
        };
        Ok(if case_sensitive {
            matcher
        } else {
            matcher.ignoring_case()
        })
    }

    /// Compile into a matcher over a multi-valued field: `exists` checks
    /// presence, every other operator must match one of the values.
    pub fn compile_values(&self, case_sensitive: bool) -> Result<ValuesMatcher, regex::Error> {
        match self {
            StringMatcher::Exists(true) => Ok(ValuesMatcher::Present),
            StringMatcher::Exists(false) => Ok(ValuesMatcher::Absent),
            other => Ok(ValuesMatcher::HasItem(other.compile(case_sensitive)?)),
        }
    }
}
