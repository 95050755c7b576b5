//! Mimic: an HTTP test double.
//!
//! Tests declare [`Expectation`]s (a conjunction of request predicates and a
//! cascade of canned responses) on an [`ExpectationRegistry`], point the code
//! under test at a [`MockServer`], and verify afterwards that every
//! expectation was matched the expected number of times.
//!
//! ```no_run
//! use mimic_http::{CallCountConstraint, ExpectationRegistry, MockServer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ExpectationRegistry::new());
//! registry.get("/foo", |e| {
//!     e.header("Accept", "text/plain")
//!         .called(CallCountConstraint::Exactly(2))
//!         .responds(|r| { r.text("first"); })
//!         .responds(|r| { r.status(201).text("second"); });
//! })?;
//!
//! let server = MockServer::start(Arc::clone(&registry)).await?;
//! // ... exercise the client against server.url("/foo") ...
//! server.verify(Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Structure
//!
//! - `request` - inbound request model (query, headers, cookies, body)
//! - `predicate` - composable request predicates and matchers
//! - `codec` - request decoders, response encoders, multipart content
//! - `response` - response definitions, materialization and chunking
//! - `expectation` - expectations, registry, dispatch and verification
//! - `server` - hyper HTTP/1.1 adapter
//! - `config` - YAML/JSON configuration for the `mimic` binary
//! - `metrics` - Prometheus counters and histograms

pub mod codec;
pub mod config;
pub mod expectation;
pub mod metrics;
pub mod predicate;
pub mod request;
pub mod response;
pub mod server;

pub use codec::{DecodedValue, MultipartContent, ResponseContent};
pub use expectation::{
    ConfigError, DispatchOutcome, Expectation, ExpectationBuilder, ExpectationRegistry,
    ResponseBuilder, VerificationFailure,
};
pub use predicate::{BodyMatcher, CallCountConstraint, CookieMatcher, ValueMatcher, ValuesMatcher};
pub use request::{Cookie, IncomingRequest, Scheme};
pub use response::{Reply, ReplyBody, NOT_FOUND_BODY};
pub use server::{MockServer, ServerError, ServerOptions};
