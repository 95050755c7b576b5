//! Verification of call-count constraints.

use super::registry::ExpectationRegistry;
use super::types::{UnmetExpectation, VerificationFailure};
use crate::metrics;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

impl ExpectationRegistry {
    /// Expectations whose constraint does not hold right now.
    pub fn unmet(&self) -> Vec<UnmetExpectation> {
        self.snapshot()
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_satisfied())
            .map(|(index, e)| UnmetExpectation {
                index,
                description: e.description().to_string(),
                constraint: e.constraint(),
                actual: e.call_count(),
            })
            .collect()
    }

    /// Whether every expectation's call-count constraint holds.
    pub fn verify(&self) -> bool {
        let satisfied = self.unmet().is_empty();
        metrics::record_verification(satisfied);
        satisfied
    }

    /// Like [`verify`](Self::verify) but reports every unmet expectation.
    pub fn assert_verified(&self) -> Result<(), VerificationFailure> {
        let unmet = self.unmet();
        metrics::record_verification(unmet.is_empty());
        if unmet.is_empty() {
            debug!("All {} expectation(s) verified", self.len());
            Ok(())
        } else {
            let failure = VerificationFailure { unmet };
            info!("{}", failure);
            Err(failure)
        }
    }

    /// Poll until every constraint holds or `timeout` elapses. Used when
    /// requests may still be in flight when verification starts.
    pub fn verify_within(&self, timeout: Duration) -> Result<(), VerificationFailure> {
        let deadline = Instant::now() + timeout;
        loop {
            let unmet = self.unmet();
            if unmet.is_empty() {
                metrics::record_verification(true);
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                metrics::record_verification(false);
                return Err(VerificationFailure { unmet });
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expectation::ExpectationRegistry;
    use crate::predicate::CallCountConstraint;
    use crate::request::IncomingRequest;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry_expecting_two() -> ExpectationRegistry {
        let registry = ExpectationRegistry::new();
        registry
            .get("/twice", |e| {
                e.called(CallCountConstraint::Exactly(2));
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_exactly_two_semantics() {
        let registry = registry_expecting_two();
        let request = IncomingRequest::get("/twice");

        registry.respond(&request);
        assert!(!registry.verify());
        registry.respond(&request);
        assert!(registry.verify());
        registry.respond(&request);
        assert!(!registry.verify());
    }

    #[test]
    fn test_assert_verified_reports_all_failures() {
        let registry = registry_expecting_two();
        registry
            .post("/never", |e| {
                e.called(CallCountConstraint::AtLeast(1));
            })
            .unwrap();
        registry
            .get("/free", |_| {})
            .unwrap();

        let failure = registry.assert_verified().unwrap_err();
        assert_eq!(failure.unmet.len(), 2);
        assert_eq!(failure.unmet[0].index, 0);
        assert_eq!(failure.unmet[0].actual, 0);
        assert_eq!(failure.unmet[1].constraint, CallCountConstraint::AtLeast(1));
        assert!(failure.to_string().starts_with("2 expectation(s) not satisfied"));
    }

    #[test]
    fn test_verify_within_waits_for_late_requests() {
        let registry = Arc::new(registry_expecting_two());
        let background = Arc::clone(&registry);
        let worker = std::thread::spawn(move || {
            for _ in 0..2 {
                std::thread::sleep(Duration::from_millis(20));
                background.respond(&IncomingRequest::get("/twice"));
            }
        });
        assert!(registry.verify_within(Duration::from_secs(2)).is_ok());
        worker.join().unwrap();
    }

    #[test]
    fn test_verify_within_times_out() {
        let registry = registry_expecting_two();
        let failure = registry
            .verify_within(Duration::from_millis(30))
            .unwrap_err();
        assert_eq!(failure.unmet[0].actual, 0);
    }
}
