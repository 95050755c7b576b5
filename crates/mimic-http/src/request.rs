//! Inbound request snapshot handed to the dispatch engine.
//!
//! The transport layer decodes the wire request into an [`IncomingRequest`];
//! everything downstream (predicates, decoders, listeners, reports) works on
//! this value and never touches the connection.

use bytes::Bytes;
use hyper::Method;
use std::collections::BTreeMap;
use std::fmt;

/// Request scheme as seen by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cookie attributes carried by a request (or set on a response).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub version: u32,
    pub comment: Option<String>,
}

impl Cookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Render as a `Set-Cookie` header value for the given cookie name.
    pub fn to_set_cookie(&self, name: &str) -> String {
        let mut out = format!("{name}={}", self.value);
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

impl From<&str> for Cookie {
    fn from(value: &str) -> Self {
        Cookie::new(value)
    }
}

/// Ordered multi-valued map (query parameters, headers, form fields).
///
/// Insertion order is kept per name; values for a repeated name are appended.
/// Header maps compare names case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap {
    entries: Vec<(String, Vec<String>)>,
    ignore_case: bool,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map whose names compare case-insensitively (HTTP headers).
    pub fn case_insensitive() -> Self {
        Self {
            entries: Vec::new(),
            ignore_case: true,
        }
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        if self.ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Append a value under `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let ignore_case = self.ignore_case;
        let existing = self.entries.iter_mut().find(|(n, _)| {
            if ignore_case {
                n.eq_ignore_ascii_case(&name)
            } else {
                *n == name
            }
        });
        match existing {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Register a name with no values (e.g. `?flag` in a query string).
    pub fn touch(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.entries.push((name, Vec::new()));
        }
    }

    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| self.same_name(n, name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_all(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Snapshot of an inbound HTTP request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    scheme: Scheme,
    path: String,
    query: MultiMap,
    headers: MultiMap,
    cookies: BTreeMap<String, Cookie>,
    body: Option<Bytes>,
    content_length: Option<u64>,
    character_encoding: Option<String>,
    content_type: Option<String>,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            scheme: Scheme::Http,
            path: path.into(),
            query: MultiMap::new(),
            headers: MultiMap::case_insensitive(),
            cookies: BTreeMap::new(),
            body: None,
            content_length: None,
            character_encoding: None,
            content_type: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(name, value);
        self
    }

    /// Replace the query parameters with those parsed from a raw query string.
    pub fn with_raw_query(mut self, raw: &str) -> Self {
        self.query = parse_query_string(raw);
        self
    }

    /// Append a header. `Content-Type` and `Cookie` headers also populate
    /// the derived content type and cookie map.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("content-type") && self.content_type.is_none() {
            self.content_type = Some(value.clone());
        }
        if name.eq_ignore_ascii_case("cookie") {
            for (cookie_name, cookie) in parse_cookie_header(&value) {
                self.cookies.insert(cookie_name, cookie);
            }
        }
        self.headers.append(name, value);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, cookie: Cookie) -> Self {
        self.cookies.insert(name.into(), cookie);
        self
    }

    /// Attach a body with its declared content type.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !self.headers.contains("content-type") {
            self.headers.append("Content-Type", content_type.clone());
        }
        self.content_type = Some(content_type);
        self.body = Some(body.into());
        self
    }

    /// Attach a body without touching the content type.
    pub fn with_raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn with_character_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.character_encoding = Some(encoding.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &MultiMap {
        &self.query
    }

    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }

    /// Body bytes; `None` for bodyless requests. An empty body counts as none.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref().filter(|b| !b.is_empty())
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
            .unwrap_or_else(|| self.body.as_ref().map_or(0, |b| b.len() as u64))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Declared character encoding, falling back to the `charset` parameter
    /// of the content type.
    pub fn character_encoding(&self) -> Option<String> {
        if let Some(encoding) = &self.character_encoding {
            return Some(encoding.clone());
        }
        self.content_type
            .as_deref()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_string()))
    }
}

impl fmt::Display for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.scheme, self.method, self.path)?;
        if !self.query.is_empty() {
            let query: Vec<String> = self
                .query
                .iter()
                .map(|(name, values)| format!("{name}={values:?}"))
                .collect();
            write!(f, " ? {}", query.join(", "))?;
        }
        Ok(())
    }
}

/// Parse a raw query string, URL-decoding both keys and values.
///
/// Repeated keys accumulate values; keys without `=` are recorded with no value.
pub fn parse_query_string(raw: &str) -> MultiMap {
    let mut map = MultiMap::new();
    for pair in raw.split('&').filter(|s| !s.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next().unwrap_or_default();
        let key = decode_component(key);
        match parts.next() {
            Some(value) => map.append(key, decode_component(value)),
            None => map.touch(key),
        }
    }
    map
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Parse a `Cookie` request header into name/cookie pairs.
pub fn parse_cookie_header(value: &str) -> Vec<(String, Cookie)> {
    value
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or_default().trim().trim_matches('"');
            Some((name.to_string(), Cookie::new(value)))
        })
        .collect()
}
