//! Conversion between hyper messages and the dispatch engine's types.

use crate::expectation::ExpectationRegistry;
use crate::request::{IncomingRequest, Scheme};
use crate::response::{Reply, ReplyBody};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

pub type MockBody = UnsyncBoxBody<Bytes, Infallible>;

/// Serve one request: convert, dispatch, honour delays, convert back.
pub async fn handle_request(
    req: Request<Incoming>,
    registry: Arc<ExpectationRegistry>,
    log_content: bool,
) -> Result<Response<MockBody>, Infallible> {
    let request = match to_incoming(req).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(to_response(Reply::server_error(e)));
        }
    };

    let reply = registry.respond(&request);
    if log_content {
        debug!(
            "Responding to {} with {} ({} bytes)",
            request,
            reply.status,
            reply.body.to_bytes().len()
        );
    }

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    Ok(to_response(reply))
}

/// Read the full request into an [`IncomingRequest`].
pub async fn to_incoming(req: Request<Incoming>) -> Result<IncomingRequest, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let mut request = IncomingRequest::new(parts.method, parts.uri.path()).with_scheme(Scheme::Http);
    if let Some(query) = parts.uri.query() {
        request = request.with_raw_query(query);
    }
    for (name, value) in parts.headers.iter() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        request = request.with_header(name.as_str(), value);
    }
    if let Some(length) = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        request = request.with_content_length(length);
    }
    if !body.is_empty() {
        request = request.with_raw_body(body);
    }
    Ok(request)
}

/// Build the hyper response. Invalid header names or values are skipped.
pub fn to_response(reply: Reply) -> Response<MockBody> {
    let body = match reply.body {
        ReplyBody::Full(bytes) => Full::new(bytes).boxed_unsync(),
        ReplyBody::Chunked { chunks, delay } => {
            let stream = futures::stream::iter(chunks.into_iter().enumerate()).then(
                move |(i, chunk)| async move {
                    if i > 0 && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok::<_, Infallible>(Frame::data(chunk))
                },
            );
            StreamBody::new(stream).boxed_unsync()
        }
    };

    let mut response = Response::new(body);
    *response.status_mut() =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    for (name, values) in reply.headers.iter() {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("Skipping invalid response header name {:?}", name);
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => warn!("Skipping invalid value for response header {}", name),
            }
        }
    }
    for (name, cookie) in &reply.cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_set_cookie(name)) {
            headers.append(SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Cookie;
    use std::time::Duration;

    #[tokio::test]
    async fn test_full_reply_conversion() {
        let mut reply = Reply::new(201, "created");
        reply.headers.append("X-Multi", "a");
        reply.headers.append("X-Multi", "b");
        reply.cookies.push(("sid".to_string(), Cookie::new("1").path("/")));

        let response = to_response(reply);
        assert_eq!(response.status(), StatusCode::CREATED);
        let multi: Vec<_> = response.headers().get_all("x-multi").iter().collect();
        assert_eq!(multi.len(), 2);
        assert_eq!(response.headers().get(SET_COOKIE).unwrap(), "sid=1; Path=/");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"created"));
    }

    #[tokio::test]
    async fn test_chunked_reply_streams_every_chunk() {
        let reply = Reply {
            body: ReplyBody::Chunked {
                chunks: vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")],
                delay: Duration::from_millis(1),
            },
            ..Reply::new(200, Bytes::new())
        };
        let body = to_response(reply).into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"abcd"));
    }

    #[test]
    fn test_invalid_status_becomes_server_error() {
        let response = to_response(Reply::new(1000, Bytes::new()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
