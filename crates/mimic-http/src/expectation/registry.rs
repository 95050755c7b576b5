//! Ordered expectation registry and the dispatch engine.

use super::builder::ExpectationBuilder;
use super::core::Expectation;
use super::report::render_unmatched;
use super::types::{ConfigError, DispatchError};
use crate::codec::{ContentKind, ContentTypeMatcher, Decoder, Encoder, RequestDecoders, ResponseEncoders};
use crate::metrics;
use crate::predicate::{BodyCache, MethodMatcher, ValueMatcher};
use crate::request::IncomingRequest;
use crate::response::{materialize, Reply, ResponseDefinition};
use hyper::Method;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Result of matching one request.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Matched {
        /// Registration index of the matched expectation
        index: usize,
        /// Zero-based call number within that expectation
        call: u64,
        expectation: Arc<Expectation>,
        /// `None` when the expectation declares no response
        response: Option<Arc<ResponseDefinition>>,
    },
    NotFound,
}

/// Expectations in registration order plus the server-wide codecs.
///
/// Reads take a snapshot and never hold a lock while matching; writes
/// replace the snapshot.
pub struct ExpectationRegistry {
    expectations: RwLock<Arc<Vec<Arc<Expectation>>>>,
    decoders: RwLock<Arc<RequestDecoders>>,
    encoders: RwLock<Arc<ResponseEncoders>>,
    report_to_console: AtomicBool,
}

impl fmt::Debug for ExpectationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationRegistry")
            .field("expectations", &self.len())
            .field("decoders", &self.decoders.read().len())
            .field("encoders", &self.encoders.read().len())
            .finish()
    }
}

impl Default for ExpectationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpectationRegistry {
    /// Empty registry with the default decoders and encoders.
    pub fn new() -> Self {
        Self {
            expectations: RwLock::new(Arc::new(Vec::new())),
            decoders: RwLock::new(Arc::new(RequestDecoders::with_defaults())),
            encoders: RwLock::new(Arc::new(ResponseEncoders::with_defaults())),
            report_to_console: AtomicBool::new(false),
        }
    }

    /// Also print unmatched-request reports to stdout.
    pub fn set_report_to_console(&self, enabled: bool) {
        self.report_to_console.store(enabled, Ordering::Relaxed);
    }

    /// Register an expectation for `method` and `path`, configured by the closure.
    pub fn expect<F>(
        &self,
        method: impl Into<MethodMatcher>,
        path: impl Into<ValueMatcher>,
        configure: F,
    ) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        let mut builder = ExpectationBuilder::for_route(method, path);
        configure(&mut builder);
        self.register(builder)
    }

    pub fn any<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(MethodMatcher::Any, path, configure)
    }

    pub fn get<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::GET, path, configure)
    }

    pub fn head<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::HEAD, path, configure)
    }

    pub fn post<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::POST, path, configure)
    }

    pub fn put<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::PUT, path, configure)
    }

    pub fn patch<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::PATCH, path, configure)
    }

    pub fn delete<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::DELETE, path, configure)
    }

    pub fn options<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::OPTIONS, path, configure)
    }

    pub fn trace<F>(&self, path: impl Into<ValueMatcher>, configure: F) -> Result<Arc<Expectation>, ConfigError>
    where
        F: FnOnce(&mut ExpectationBuilder),
    {
        self.expect(Method::TRACE, path, configure)
    }

    /// Register a fully configured builder at the end of the priority order.
    pub fn register(&self, builder: ExpectationBuilder) -> Result<Arc<Expectation>, ConfigError> {
        let expectation = Arc::new(builder.build()?);
        let mut guard = self.expectations.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(Arc::clone(&expectation));
        *guard = Arc::new(next);
        debug!(
            "Registered expectation #{}: {}",
            guard.len() - 1,
            expectation.description()
        );
        Ok(expectation)
    }

    /// Register a server-wide decoder.
    pub fn register_decoder(&self, content_type: impl Into<ContentTypeMatcher>, decoder: Decoder) {
        let mut guard = self.decoders.write();
        let mut next = (**guard).clone();
        next.register(content_type, decoder);
        *guard = Arc::new(next);
    }

    /// Register a server-wide encoder.
    pub fn register_encoder(
        &self,
        content_type: impl Into<ContentTypeMatcher>,
        kind: ContentKind,
        encoder: Encoder,
    ) {
        let mut guard = self.encoders.write();
        let mut next = (**guard).clone();
        next.register(content_type, kind, encoder);
        *guard = Arc::new(next);
    }

    /// Register a server-wide encoder for object content of type `T`.
    pub fn register_object_encoder<T, F>(&self, content_type: impl Into<ContentTypeMatcher>, f: F)
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        let mut guard = self.encoders.write();
        let mut next = (**guard).clone();
        next.register_object::<T, F>(content_type, f);
        *guard = Arc::new(next);
    }

    /// Current expectations, in priority order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Expectation>>> {
        Arc::clone(&self.expectations.read())
    }

    pub fn decoders(&self) -> Arc<RequestDecoders> {
        Arc::clone(&self.decoders.read())
    }

    pub fn encoders(&self) -> Arc<ResponseEncoders> {
        Arc::clone(&self.encoders.read())
    }

    pub fn len(&self) -> usize {
        self.expectations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.read().is_empty()
    }

    /// Drop every expectation (and with them their counters). Codecs stay.
    pub fn clear(&self) {
        *self.expectations.write() = Arc::new(Vec::new());
        debug!("Cleared all expectations");
    }

    /// Find the first expectation matching the request, count the match and
    /// select its response.
    pub fn dispatch(&self, request: &IncomingRequest) -> Result<DispatchOutcome, DispatchError> {
        let expectations = self.snapshot();
        let decoders = self.decoders();
        self.dispatch_in(request, &expectations, &decoders)
    }

    fn dispatch_in(
        &self,
        request: &IncomingRequest,
        expectations: &[Arc<Expectation>],
        decoders: &RequestDecoders,
    ) -> Result<DispatchOutcome, DispatchError> {
        let cache = BodyCache::new();
        for (index, expectation) in expectations.iter().enumerate() {
            if expectation.matches(request, decoders, &cache)? {
                let selection = expectation.select_response();
                debug!(
                    "Request {} matched expectation #{} (call {})",
                    request, index, selection.call
                );
                expectation.notify(request);
                return Ok(DispatchOutcome::Matched {
                    index,
                    call: selection.call,
                    expectation: Arc::clone(expectation),
                    response: selection.response,
                });
            }
        }
        debug!("Request {} matched no expectation", request);
        Ok(DispatchOutcome::NotFound)
    }

    /// Dispatch and materialize: the reply the transport should send.
    ///
    /// Unmatched requests get a 404 with [`crate::response::NOT_FOUND_BODY`];
    /// decode or encode failures get a 500; a matched expectation with no
    /// responses gets a 204.
    pub fn respond(&self, request: &IncomingRequest) -> Reply {
        let started = Instant::now();
        let expectations = self.snapshot();
        let decoders = self.decoders();

        let (reply, outcome) = match self.dispatch_in(request, &expectations, &decoders) {
            Ok(DispatchOutcome::Matched {
                response: Some(definition),
                index,
                ..
            }) => match materialize(&definition, &self.encoders()) {
                Ok(reply) => (reply, metrics::OUTCOME_MATCHED),
                Err(e) => {
                    error!("Failed to encode response of expectation #{}: {}", index, e);
                    (Reply::server_error(e), metrics::OUTCOME_ERROR)
                }
            },
            Ok(DispatchOutcome::Matched { response: None, .. }) => {
                (Reply::no_content(), metrics::OUTCOME_MATCHED)
            }
            Ok(DispatchOutcome::NotFound) => {
                let report = render_unmatched(request, &expectations, &decoders);
                warn!("{}", report);
                if self.report_to_console.load(Ordering::Relaxed) {
                    println!("{report}");
                }
                (Reply::not_found(), metrics::OUTCOME_NOT_FOUND)
            }
            Err(e) => {
                error!("Failed to dispatch {}: {}", request, e);
                (Reply::server_error(e), metrics::OUTCOME_ERROR)
            }
        };

        metrics::record_dispatch(
            request.method().as_str(),
            outcome,
            started.elapsed().as_secs_f64() * 1000.0,
        );
        reply
    }
}
