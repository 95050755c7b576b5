//! Error types for declaring, dispatching and verifying expectations.

use crate::codec::{DecodeError, EncodeError};
use crate::predicate::CallCountConstraint;
use std::fmt;

/// Invalid expectation or response declaration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("chunk count must be at least 1, got {0}")]
    InvalidChunking(usize),
    #[error("invalid status code {0}")]
    InvalidStatus(u16),
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("invalid base64 body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("invalid method {0}")]
    InvalidMethod(String),
}

/// A request could not be dispatched. Unmatched requests are not errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// One expectation whose call-count constraint does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetExpectation {
    /// Registration index
    pub index: usize,
    pub description: String,
    pub constraint: CallCountConstraint,
    pub actual: u64,
}

impl fmt::Display for UnmetExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expectation #{} ({}) expected {} but was called {} time(s)",
            self.index, self.description, self.constraint, self.actual
        )
    }
}

/// Every unmet expectation found by a verification pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} expectation(s) not satisfied{}", .unmet.len(), render_unmet(.unmet))]
pub struct VerificationFailure {
    pub unmet: Vec<UnmetExpectation>,
}

fn render_unmet(unmet: &[UnmetExpectation]) -> String {
    unmet.iter().map(|u| format!("\n  - {u}")).collect()
}
