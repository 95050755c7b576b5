//! Text report rendered when a request matches no expectation.

use super::core::Expectation;
use crate::codec::{DecoderChain, RequestDecoders};
use crate::predicate::{BodyCache, MatchContext};
use crate::request::IncomingRequest;
use std::fmt::Write;
use std::sync::Arc;

const TEXT_CONTENT_HINTS: [&str; 3] = ["text/", "/json", "application/x-www-form-urlencoded"];

/// Describe the request, then every expectation with each predicate marked
/// as met (`✓`) or failed (`X`).
pub fn render_unmatched(
    request: &IncomingRequest,
    expectations: &[Arc<Expectation>],
    global: &RequestDecoders,
) -> String {
    let mut out = String::from("# Unmatched Request\n\n");
    render_request(&mut out, request);
    out.push_str("\n# Expectations\n\n");

    let cache = BodyCache::new();
    for (index, expectation) in expectations.iter().enumerate() {
        let predicates = expectation.predicates();
        let _ = writeln!(
            out,
            "Expectation {index} ({} matchers):",
            predicates.len()
        );
        let ctx = MatchContext::new(
            request,
            DecoderChain::new(expectation.decoders(), global),
            &cache,
        );
        let mut failed = 0;
        for predicate in predicates {
            match predicate.matches(&ctx) {
                Ok(true) => {
                    let _ = writeln!(out, "  ✓ {predicate}");
                }
                Ok(false) => {
                    failed += 1;
                    let _ = writeln!(out, "  X {predicate}");
                }
                Err(e) => {
                    failed += 1;
                    let _ = writeln!(out, "  X {predicate} ({e})");
                }
            }
        }
        let _ = writeln!(
            out,
            "  ({} matchers: {} matched, {failed} failed)\n",
            predicates.len(),
            predicates.len() - failed
        );
    }
    out
}

fn render_request(out: &mut String, request: &IncomingRequest) {
    let _ = writeln!(out, "{request}");

    if !request.headers().is_empty() {
        out.push_str("Headers:\n");
        for (name, values) in request.headers().iter() {
            let _ = writeln!(out, " - {name}: {values:?}");
        }
    }

    if !request.cookies().is_empty() {
        out.push_str("Cookies:\n");
        for (name, cookie) in request.cookies() {
            let _ = writeln!(
                out,
                " - {name} ({}, {}): {}",
                cookie.domain.as_deref().unwrap_or("-"),
                cookie.path.as_deref().unwrap_or("-"),
                cookie.value
            );
        }
    }

    if let Some(encoding) = request.character_encoding() {
        let _ = writeln!(out, "Character-Encoding: {encoding}");
    }
    if let Some(content_type) = request.content_type() {
        let _ = writeln!(out, "Content-Type: {content_type}");
    }
    if request.content_length() > 0 {
        let _ = writeln!(out, "Content-Length: {}", request.content_length());
    }

    if let Some(body) = request.body() {
        out.push_str("Content:\n");
        let textual = request
            .content_type()
            .is_some_and(|ct| TEXT_CONTENT_HINTS.iter().any(|hint| ct.contains(hint)));
        if textual {
            let _ = writeln!(out, "  {}", String::from_utf8_lossy(body));
        } else {
            let _ = writeln!(out, "  {:?}", body.as_ref());
        }
    }
}
