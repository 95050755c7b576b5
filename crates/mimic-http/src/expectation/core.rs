//! A single declared expectation and its runtime state.

use crate::codec::{DecodeError, DecoderChain, RequestDecoders};
use crate::predicate::{BodyCache, CallCountConstraint, MatchContext, RequestPredicate};
use crate::request::IncomingRequest;
use crate::response::ResponseDefinition;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked with the request each time an expectation matches.
pub type Listener = Arc<dyn Fn(&IncomingRequest) + Send + Sync>;

/// Response chosen for one matched request.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Zero-based call number of this match
    pub call: u64,
    /// `None` when the expectation declares no response
    pub response: Option<Arc<ResponseDefinition>>,
}

/// Predicates, cascading responses and the live match counter of one rule.
pub struct Expectation {
    description: String,
    predicates: Vec<RequestPredicate>,
    constraint: CallCountConstraint,
    responses: Vec<Arc<ResponseDefinition>>,
    listeners: Vec<Listener>,
    decoders: RequestDecoders,
    count: AtomicU64,
}

impl Expectation {
    /// Predicates are reordered cheapest-first; ties keep declaration order.
    pub(crate) fn new(
        description: String,
        mut predicates: Vec<RequestPredicate>,
        constraint: CallCountConstraint,
        responses: Vec<ResponseDefinition>,
        listeners: Vec<Listener>,
        decoders: RequestDecoders,
    ) -> Self {
        predicates.sort_by_key(RequestPredicate::cost);
        Self {
            description,
            predicates,
            constraint,
            responses: responses.into_iter().map(Arc::new).collect(),
            listeners,
            decoders,
            count: AtomicU64::new(0),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn predicates(&self) -> &[RequestPredicate] {
        &self.predicates
    }

    pub fn constraint(&self) -> CallCountConstraint {
        self.constraint
    }

    pub fn responses(&self) -> &[Arc<ResponseDefinition>] {
        &self.responses
    }

    pub fn decoders(&self) -> &RequestDecoders {
        &self.decoders
    }

    pub fn call_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the call-count constraint holds right now.
    pub fn is_satisfied(&self) -> bool {
        self.constraint.test(self.call_count())
    }

    /// Evaluate every predicate against the request, short-circuiting on
    /// the first failure.
    pub fn matches(
        &self,
        request: &IncomingRequest,
        global: &RequestDecoders,
        cache: &BodyCache,
    ) -> Result<bool, DecodeError> {
        let ctx = MatchContext::new(request, DecoderChain::new(&self.decoders, global), cache);
        for predicate in &self.predicates {
            if !predicate.matches(&ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Record a match and pick the response for it.
    ///
    /// The counter increment is the selection: concurrent matches each get a
    /// distinct call number, and call `n` is answered with response
    /// `min(n, len - 1)`.
    pub(crate) fn select_response(&self) -> Selection {
        let call = self.count.fetch_add(1, Ordering::AcqRel);
        let response = match self.responses.len() {
            0 => None,
            len => {
                let index = usize::try_from(call).map_or(len - 1, |c| c.min(len - 1));
                Some(Arc::clone(&self.responses[index]))
            }
        };
        Selection { call, response }
    }

    /// Run listeners in registration order.
    pub(crate) fn notify(&self, request: &IncomingRequest) {
        for listener in &self.listeners {
            listener(request);
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("description", &self.description)
            .field("predicates", &self.predicates)
            .field("constraint", &self.constraint)
            .field("responses", &self.responses.len())
            .field("listeners", &self.listeners.len())
            .field("count", &self.call_count())
            .finish()
    }
}
