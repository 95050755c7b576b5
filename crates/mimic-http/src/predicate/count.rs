//! Call-count constraints checked at verification time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Constraint on how many times an expectation was matched.
///
/// Never consulted while matching; a request beyond the expected count is
/// still answered and only shows up at verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CallCountConstraint {
    #[default]
    Any,
    Exactly(u64),
    AtLeast(u64),
    AtMost(u64),
    /// Inclusive range
    Between(u64, u64),
}

impl CallCountConstraint {
    pub fn test(&self, count: u64) -> bool {
        match *self {
            Self::Any => true,
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
            Self::AtMost(n) => count <= n,
            Self::Between(lo, hi) => (lo..=hi).contains(&count),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<u64> for CallCountConstraint {
    fn from(value: u64) -> Self {
        Self::Exactly(value)
    }
}

impl fmt::Display for CallCountConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any number of calls"),
            Self::Exactly(n) => write!(f, "exactly {n} call(s)"),
            Self::AtLeast(n) => write!(f, "at least {n} call(s)"),
            Self::AtMost(n) => write!(f, "at most {n} call(s)"),
            Self::Between(lo, hi) => write!(f, "between {lo} and {hi} calls"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_two() {
        let constraint = CallCountConstraint::Exactly(2);
        assert!(!constraint.test(1));
        assert!(constraint.test(2));
        assert!(!constraint.test(3));
    }

    #[test]
    fn test_bounds() {
        assert!(CallCountConstraint::AtLeast(1).test(5));
        assert!(!CallCountConstraint::AtLeast(1).test(0));
        assert!(CallCountConstraint::AtMost(1).test(0));
        assert!(!CallCountConstraint::AtMost(1).test(2));
        assert!(CallCountConstraint::Between(2, 4).test(4));
        assert!(!CallCountConstraint::Between(2, 4).test(5));
        assert!(CallCountConstraint::Any.test(0));
    }

    #[test]
    fn test_serde_forms() {
        let constraint: CallCountConstraint = crate::config::from_yaml("exactly: 3").unwrap();
        assert_eq!(constraint, CallCountConstraint::Exactly(3));
        let constraint: CallCountConstraint = crate::config::from_yaml("between: [1, 2]").unwrap();
        assert_eq!(constraint, CallCountConstraint::Between(1, 2));
        let constraint: CallCountConstraint = crate::config::from_yaml("any").unwrap();
        assert_eq!(constraint, CallCountConstraint::Any);
    }
}
