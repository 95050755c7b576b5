//! Request predicate: one condition over one request attribute.

use super::body::{BodyMatcher, MatchContext};
use super::cookie::CookieMatcher;
use super::matcher::ValueMatcher;
use super::values::ValuesMatcher;
use crate::codec::{split_essence, DecodeError, DecodedValue, APPLICATION_URLENCODED};
use crate::request::{IncomingRequest, Scheme};
use hyper::Method;
use std::fmt;
use std::sync::Arc;

/// HTTP method condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    Any,
    OneOf(Vec<Method>),
}

impl MethodMatcher {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(methods) => methods.contains(method),
        }
    }
}

impl From<Method> for MethodMatcher {
    fn from(value: Method) -> Self {
        Self::OneOf(vec![value])
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::OneOf(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join(" or "))
            }
        }
    }
}

/// Custom request test.
pub type RequestTest = Arc<dyn Fn(&IncomingRequest) -> bool + Send + Sync>;

/// A single condition of an expectation. All predicates of an expectation
/// must hold for it to match.
#[derive(Clone)]
pub enum RequestPredicate {
    Method(MethodMatcher),
    Path(ValueMatcher),
    Scheme(Scheme),
    Query { name: String, values: ValuesMatcher },
    Header { name: String, values: ValuesMatcher },
    Cookie { name: String, matcher: CookieMatcher },
    CookieAbsent(String),
    NoCookies,
    /// Parameter of an `application/x-www-form-urlencoded` body
    Param { name: String, values: ValuesMatcher },
    /// The request content type must start with `content_type`; the body is
    /// decoded with the decoder resolved for `content_type`.
    Body { content_type: String, matcher: BodyMatcher },
    Custom { description: String, test: RequestTest },
}

impl RequestPredicate {
    pub fn custom<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&IncomingRequest) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Evaluation rank, cheapest first. Body predicates go last since they
    /// may need decoding.
    pub fn cost(&self) -> u8 {
        match self {
            Self::Method(_) => 0,
            Self::Path(_) => 1,
            Self::Scheme(_) => 2,
            Self::Query { .. } => 3,
            Self::Header { .. } => 4,
            Self::Cookie { .. } | Self::CookieAbsent(_) | Self::NoCookies => 5,
            Self::Custom { .. } => 6,
            Self::Param { .. } => 7,
            Self::Body { .. } => 8,
        }
    }

    pub fn matches(&self, ctx: &MatchContext<'_>) -> Result<bool, DecodeError> {
        let request = ctx.request;
        let matched = match self {
            Self::Method(m) => m.matches(request.method()),
            Self::Path(m) => m.matches(request.path()),
            Self::Scheme(scheme) => request.scheme() == *scheme,
            Self::Query { name, values } => values.matches(request.query().get_all(name)),
            Self::Header { name, values } => values.matches(request.headers().get_all(name)),
            Self::Cookie { name, matcher } => request
                .cookies()
                .get(name)
                .is_some_and(|cookie| matcher.matches(cookie)),
            Self::CookieAbsent(name) => !request.cookies().contains_key(name),
            Self::NoCookies => request.cookies().is_empty(),
            Self::Param { name, values } => {
                let is_form = request
                    .content_type()
                    .is_some_and(|ct| split_essence(ct) == split_essence(APPLICATION_URLENCODED));
                if !is_form {
                    return Ok(values.matches(None));
                }
                match ctx.decoded_body(APPLICATION_URLENCODED)?.as_deref() {
                    Some(DecodedValue::Form(form)) => values.matches(form.get_all(name)),
                    _ => values.matches(None),
                }
            }
            Self::Body {
                content_type,
                matcher,
            } => {
                let type_matches = request.content_type().is_some_and(|ct| {
                    ct.to_ascii_lowercase()
                        .starts_with(&content_type.to_ascii_lowercase())
                });
                match request.body() {
                    None => false,
                    Some(_) if !type_matches => false,
                    Some(raw) if !matcher.needs_decoding() => matcher.matches_raw(raw),
                    Some(_) => match ctx.decoded_body(content_type)? {
                        Some(decoded) => matcher.matches(&decoded),
                        None => false,
                    },
                }
            }
            Self::Custom { test, .. } => test(request),
        };
        Ok(matched)
    }
}

impl fmt::Display for RequestPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(m) => write!(f, "HTTP method is {m}"),
            Self::Path(m) => write!(f, "Path is {m}"),
            Self::Scheme(scheme) => write!(f, "Scheme is {scheme}"),
            Self::Query { name, values } => write!(f, "Query param {name} is {values}"),
            Self::Header { name, values } => write!(f, "Header {name} is {values}"),
            Self::Cookie { name, matcher } => write!(f, "Cookie {name} is {matcher}"),
            Self::CookieAbsent(name) => write!(f, "Cookie {name} is absent"),
            Self::NoCookies => f.write_str("No cookies"),
            Self::Param { name, values } => write!(f, "Form param {name} is {values}"),
            Self::Body {
                content_type,
                matcher,
            } => write!(f, "Body ({content_type}) is {matcher}"),
            Self::Custom { description, .. } => write!(f, "Request matches {description}"),
        }
    }
}

impl fmt::Debug for RequestPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestPredicate({self})")
    }
}
