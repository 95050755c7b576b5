//! Runtime string matchers shared by every predicate kind.
//!
//! - `CachedValue` - expected value with its lowercase form computed once
//! - `ValueMatcher` - composable matcher over a single string value

use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A string value with pre-computed lowercase for case-insensitive matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub value: String,
    pub lower: String,
}

impl CachedValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let lower = value.to_lowercase();
        Self { value, lower }
    }

    #[inline]
    pub fn equals(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value == self.value
        } else {
            value.to_lowercase() == self.lower
        }
    }

    #[inline]
    pub fn contained_in(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.contains(&self.value)
        } else {
            value.to_lowercase().contains(&self.lower)
        }
    }

    #[inline]
    pub fn starts(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.starts_with(&self.value)
        } else {
            value.to_lowercase().starts_with(&self.lower)
        }
    }

    #[inline]
    pub fn ends(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value.ends_with(&self.value)
        } else {
            value.to_lowercase().ends_with(&self.lower)
        }
    }
}

/// Comparison applied by [`ValueMatcher::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

/// Matcher over one string value.
#[derive(Clone)]
pub enum ValueMatcher {
    Text {
        op: TextOp,
        expected: CachedValue,
        case_sensitive: bool,
    },
    /// Regex search (case sensitivity is in the pattern itself)
    Regex(Arc<Regex>),
    /// Matches every value
    Anything,
    Not(Box<ValueMatcher>),
    AnyOf(Vec<ValueMatcher>),
    AllOf(Vec<ValueMatcher>),
    Predicate {
        description: String,
        test: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    },
}

impl ValueMatcher {
    fn text(op: TextOp, expected: impl Into<String>) -> Self {
        Self::Text {
            op,
            expected: CachedValue::new(expected),
            case_sensitive: true,
        }
    }

    pub fn equals(expected: impl Into<String>) -> Self {
        Self::text(TextOp::Equals, expected)
    }

    pub fn contains(expected: impl Into<String>) -> Self {
        Self::text(TextOp::Contains, expected)
    }

    pub fn starts_with(expected: impl Into<String>) -> Self {
        Self::text(TextOp::StartsWith, expected)
    }

    pub fn ends_with(expected: impl Into<String>) -> Self {
        Self::text(TextOp::EndsWith, expected)
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Arc::new(Regex::new(pattern)?)))
    }

    pub fn anything() -> Self {
        Self::Anything
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(matcher: ValueMatcher) -> Self {
        Self::Not(Box::new(matcher))
    }

    pub fn any_of(matchers: impl IntoIterator<Item = ValueMatcher>) -> Self {
        Self::AnyOf(matchers.into_iter().collect())
    }

    pub fn all_of(matchers: impl IntoIterator<Item = ValueMatcher>) -> Self {
        Self::AllOf(matchers.into_iter().collect())
    }

    pub fn predicate<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Case-insensitive variant of a text comparison. Other matchers are
    /// returned unchanged, composites recurse.
    pub fn ignoring_case(self) -> Self {
        match self {
            Self::Text { op, expected, .. } => Self::Text {
                op,
                expected,
                case_sensitive: false,
            },
            Self::Not(inner) => Self::Not(Box::new(inner.ignoring_case())),
            Self::AnyOf(inner) => Self::AnyOf(inner.into_iter().map(Self::ignoring_case).collect()),
            Self::AllOf(inner) => Self::AllOf(inner.into_iter().map(Self::ignoring_case).collect()),
            other => other,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Text {
                op,
                expected,
                case_sensitive,
            } => match op {
                TextOp::Equals => expected.equals(value, *case_sensitive),
                TextOp::Contains => expected.contained_in(value, *case_sensitive),
                TextOp::StartsWith => expected.starts(value, *case_sensitive),
                TextOp::EndsWith => expected.ends(value, *case_sensitive),
            },
            Self::Regex(regex) => regex.is_match(value),
            Self::Anything => true,
            Self::Not(inner) => !inner.matches(value),
            Self::AnyOf(inner) => inner.iter().any(|m| m.matches(value)),
            Self::AllOf(inner) => inner.iter().all(|m| m.matches(value)),
            Self::Predicate { test, .. } => test(value),
        }
    }
}

impl From<&str> for ValueMatcher {
    fn from(value: &str) -> Self {
        Self::equals(value)
    }
}

impl From<String> for ValueMatcher {
    fn from(value: String) -> Self {
        Self::equals(value)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[ValueMatcher], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

impl fmt::Display for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text {
                op,
                expected,
                case_sensitive,
            } => {
                let verb = match op {
                    TextOp::Equals => "equal to",
                    TextOp::Contains => "containing",
                    TextOp::StartsWith => "starting with",
                    TextOp::EndsWith => "ending with",
                };
                write!(f, "{verb} {:?}", expected.value)?;
                if !case_sensitive {
                    f.write_str(" ignoring case")?;
                }
                Ok(())
            }
            Self::Regex(regex) => write!(f, "matching /{}/", regex.as_str()),
            Self::Anything => f.write_str("anything"),
            Self::Not(inner) => write!(f, "not {inner}"),
            Self::AnyOf(inner) => write_joined(f, inner, " or "),
            Self::AllOf(inner) => write_joined(f, inner, " and "),
            Self::Predicate { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for ValueMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueMatcher({self})")
    }
}
