//! Expectations: declaration, dispatch and verification.
//!
//! An [`Expectation`] pairs a conjunction of request predicates with a
//! cascade of canned responses and a live match counter. The
//! [`ExpectationRegistry`] keeps them in registration order, which is also
//! the priority order: the first expectation whose predicates all hold
//! answers the request.
//!
//! # Module Structure
//!
//! - `core` - the `Expectation` type and response selection
//! - `builder` - `ExpectationBuilder` and `ResponseBuilder` configurators
//! - `registry` - copy-on-write registry and dispatch engine
//! - `report` - unmatched-request report
//! - `verify` - call-count verification
//! - `types` - error types

mod builder;
mod core;
mod registry;
mod report;
mod types;
mod verify;

pub use self::core::{Expectation, Listener, Selection};
pub use builder::{ExpectationBuilder, ResponseBuilder};
pub use registry::{DispatchOutcome, ExpectationRegistry};
pub use report::render_unmatched;
pub use types::{ConfigError, DispatchError, UnmetExpectation, VerificationFailure};
