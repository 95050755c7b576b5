//! Request predicate system.
//!
//! An expectation is a conjunction of [`RequestPredicate`]s. Each predicate
//! inspects one request attribute (method, path, scheme, query, headers,
//! cookies, form parameters, decoded body) or runs a custom test. Predicates
//! are evaluated cheapest-first and short-circuit; decoded bodies are shared
//! across all expectations tried for one request through [`BodyCache`].
//!
//! # Module Structure
//!
//! - `matcher` - `CachedValue` and the composable single-value `ValueMatcher`
//! - `string_matcher` - serde `StringMatcher` used by configuration files
//! - `values` - multiplicity over multi-valued fields (has item, every, exactly, present, absent)
//! - `cookie` - cookie attribute matcher
//! - `multipart` - matcher over named multipart parts
//! - `body` - body matchers, `MatchContext` and the per-dispatch decode cache
//! - `count` - call-count constraints used by verification
//! - `request` - the `RequestPredicate` enum

mod body;
mod cookie;
mod count;
mod matcher;
mod multipart;
mod request;
mod string_matcher;
mod values;

pub use body::{BodyCache, BodyMatcher, MatchContext};
pub use cookie::CookieMatcher;
pub use count::CallCountConstraint;
pub use matcher::{CachedValue, TextOp, ValueMatcher};
pub use multipart::{MultipartMatcher, PartValueMatcher};
pub use request::{MethodMatcher, RequestPredicate, RequestTest};
pub use string_matcher::StringMatcher;
pub use values::ValuesMatcher;
