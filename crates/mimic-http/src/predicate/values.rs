//! Multiplicity-aware matching over the values of a multi-valued field
//! (query parameters, headers, form parameters).

use super::matcher::ValueMatcher;
use std::fmt;

/// Predicate over all values recorded for one field name.
///
/// The field is `None` when the request does not carry it at all.
#[derive(Debug, Clone)]
pub enum ValuesMatcher {
    /// At least one value matches
    HasItem(ValueMatcher),
    /// Field present and every value matches
    Every(ValueMatcher),
    /// Exactly these values, in any order
    Exactly(Vec<ValueMatcher>),
    Present,
    Absent,
}

impl ValuesMatcher {
    pub fn has_item(matcher: impl Into<ValueMatcher>) -> Self {
        Self::HasItem(matcher.into())
    }

    pub fn every(matcher: impl Into<ValueMatcher>) -> Self {
        Self::Every(matcher.into())
    }

    pub fn exactly<I, M>(matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ValueMatcher>,
    {
        Self::Exactly(matchers.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, values: Option<&[String]>) -> bool {
        match (self, values) {
            (Self::Present, v) => v.is_some(),
            (Self::Absent, v) => v.is_none(),
            (_, None) => false,
            (Self::HasItem(m), Some(values)) => values.iter().any(|v| m.matches(v)),
            (Self::Every(m), Some(values)) => values.iter().all(|v| m.matches(v)),
            (Self::Exactly(matchers), Some(values)) => {
                matchers.len() == values.len() && {
                    let mut used = vec![false; values.len()];
                    assign(matchers, values, &mut used)
                }
            }
        }
    }
}

/// Pairs every matcher with a distinct value (backtracking).
fn assign(matchers: &[ValueMatcher], values: &[String], used: &mut [bool]) -> bool {
    let Some((first, rest)) = matchers.split_first() else {
        return true;
    };
    for (i, value) in values.iter().enumerate() {
        if !used[i] && first.matches(value) {
            used[i] = true;
            if assign(rest, values, used) {
                return true;
            }
            used[i] = false;
        }
    }
    false
}

impl From<&str> for ValuesMatcher {
    fn from(value: &str) -> Self {
        Self::has_item(value)
    }
}

impl From<String> for ValuesMatcher {
    fn from(value: String) -> Self {
        Self::has_item(value)
    }
}

impl From<ValueMatcher> for ValuesMatcher {
    fn from(value: ValueMatcher) -> Self {
        Self::HasItem(value)
    }
}

impl fmt::Display for ValuesMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasItem(m) => write!(f, "a value {m}"),
            Self::Every(m) => write!(f, "every value {m}"),
            Self::Exactly(matchers) => {
                f.write_str("exactly [")?;
                for (i, m) in matchers.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{m}")?;
                }
                f.write_str("] in any order")
            }
            Self::Present => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_has_item() {
        let values = vals(&["a", "b"]);
        assert!(ValuesMatcher::from("b").matches(Some(&values)));
        assert!(!ValuesMatcher::from("c").matches(Some(&values)));
        assert!(!ValuesMatcher::from("a").matches(None));
    }

    #[test]
    fn test_every() {
        let matcher = ValuesMatcher::every(ValueMatcher::starts_with("x"));
        assert!(matcher.matches(Some(&vals(&["x1", "x2"]))));
        assert!(!matcher.matches(Some(&vals(&["x1", "y2"]))));
        assert!(!matcher.matches(None));
    }

    #[test]
    fn test_exactly_any_order() {
        let matcher = ValuesMatcher::exactly(["alpha", "bravo"]);
        assert!(matcher.matches(Some(&vals(&["bravo", "alpha"]))));
        assert!(!matcher.matches(Some(&vals(&["alpha"]))));
        assert!(!matcher.matches(Some(&vals(&["alpha", "bravo", "charlie"]))));
    }

    #[test]
    fn test_exactly_needs_backtracking() {
        // the loose matcher must not steal the only value the strict one accepts
        let matcher = ValuesMatcher::exactly([ValueMatcher::anything(), ValueMatcher::equals("a")]);
        assert!(matcher.matches(Some(&vals(&["a", "b"]))));
    }

    #[test]
    fn test_presence() {
        let empty: Vec<String> = Vec::new();
        assert!(ValuesMatcher::Present.matches(Some(&empty)));
        assert!(!ValuesMatcher::Present.matches(None));
        assert!(ValuesMatcher::Absent.matches(None));
        assert!(!ValuesMatcher::Absent.matches(Some(&empty)));
    }
}
