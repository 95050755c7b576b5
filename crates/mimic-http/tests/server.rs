//! Integration tests for the hyper adapter.
//!
//! Each test starts a `MockServer` on an ephemeral port and drives it with
//! reqwest.

use mimic_http::codec::MultipartContent;
use mimic_http::predicate::MultipartMatcher;
use mimic_http::{
    BodyMatcher, CallCountConstraint, CookieMatcher, ExpectationRegistry, MockServer,
    NOT_FOUND_BODY,
};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn start(registry: ExpectationRegistry) -> (MockServer, Client) {
    let server = MockServer::start(Arc::new(registry))
        .await
        .expect("Failed to start mock server");
    (server, Client::new())
}

#[tokio::test]
async fn test_cascading_responses_over_http() {
    let registry = ExpectationRegistry::new();
    registry
        .get("/foo", |e| {
            e.called(CallCountConstraint::Exactly(3))
                .responds(|r| {
                    r.text("first");
                })
                .responds(|r| {
                    r.status(201).header("X-Step", "second").text("second");
                });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let first = client.get(server.url("/foo")).send().await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(first.text().await.unwrap(), "first");

    for _ in 0..2 {
        let next = client.get(server.url("/foo")).send().await.unwrap();
        assert_eq!(next.status(), 201);
        assert_eq!(next.headers()["x-step"], "second");
        assert_eq!(next.text().await.unwrap(), "second");
    }

    server.verify(Duration::from_secs(1)).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_request_is_404() {
    let registry = ExpectationRegistry::new();
    registry.get("/known", |_| {}).unwrap();
    let (server, client) = start(registry).await;

    let response = client.post(server.url("/unknown")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), NOT_FOUND_BODY);

    let empty = client.get(server.url("/known")).send().await.unwrap();
    assert_eq!(empty.status(), 204);
    server.shutdown().await;
}

#[tokio::test]
async fn test_query_header_and_cookie_predicates() {
    let registry = ExpectationRegistry::new();
    registry
        .get("/search", |e| {
            e.query("q", "rust")
                .header("Accept", "application/json")
                .cookie("session", CookieMatcher::from("abc"))
                .responds(|r| {
                    r.json(serde_json::json!({"hits": 1}))
                        .cookie("seen", mimic_http::Cookie::new("yes").path("/"));
                });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let response = client
        .get(server.url("/search?q=rust&page=2"))
        .header("accept", "application/json")
        .header("cookie", "session=abc; other=1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["set-cookie"], "seen=yes; Path=/");
    assert_eq!(response.headers()["content-type"], "application/json");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["hits"], 1);

    let missing_cookie = client
        .get(server.url("/search?q=rust"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(missing_cookie.status(), 404);
    server.shutdown().await;
}

#[tokio::test]
async fn test_json_and_form_bodies() {
    let registry = ExpectationRegistry::new();
    registry
        .post("/json", |e| {
            e.body("application/json", BodyMatcher::json_pointer("/name", "widget"))
                .responds(|r| {
                    r.status(201);
                });
        })
        .unwrap();
    registry
        .post("/form", |e| {
            e.param("color", "blue").responds(|r| {
                r.text("form ok");
            });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let created = client
        .post(server.url("/json"))
        .header("content-type", "application/json; charset=utf-8")
        .body(r#"{"name":"widget","count":2}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    let form = client
        .post(server.url("/form"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("size=10&color=blue")
        .send()
        .await
        .unwrap();
    assert_eq!(form.text().await.unwrap(), "form ok");

    let malformed = client
        .post(server.url("/json"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 500);
    server.shutdown().await;
}

#[tokio::test]
async fn test_multipart_request_and_response() {
    let registry = ExpectationRegistry::new();
    registry
        .post("/upload", |e| {
            e.body(
                "multipart/form-data",
                MultipartMatcher::new()
                    .part("alpha", "one")
                    .file_part("bravo", "bravo.txt", "text/plain", "two"),
            )
            .responds(|r| {
                r.multipart(MultipartContent::with_boundary("xyz").field("status", "stored"));
            });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let body = "--B\r\n\
        Content-Disposition: form-data; name=\"alpha\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        one\r\n\
        --B\r\n\
        Content-Disposition: form-data; name=\"bravo\"; filename=\"bravo.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        two\r\n\
        --B--\r\n";
    let response = client
        .post(server.url("/upload"))
        .header("content-type", "multipart/form-data; boundary=B")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "multipart/form-data; boundary=xyz"
    );
    let text = response.text().await.unwrap();
    assert!(text.contains("name=\"status\""));
    assert!(text.contains("stored"));
    assert!(text.ends_with("--xyz--\r\n"));
    server.shutdown().await;
}

#[tokio::test]
async fn test_chunked_response_reassembles() {
    let payload = "abcdefghijklmnopqrstuvwxyz";
    let registry = ExpectationRegistry::new();
    registry
        .get("/chunked", |e| {
            e.responds(|r| {
                r.text(payload).chunked(4, Duration::from_millis(20));
            });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let started = Instant::now();
    let response = client.get(server.url("/chunked")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), payload);
    assert!(started.elapsed() >= Duration::from_millis(60));
    server.shutdown().await;
}

#[tokio::test]
async fn test_response_delay() {
    let registry = ExpectationRegistry::new();
    registry
        .get("/slow", |e| {
            e.responds(|r| {
                r.delay(Duration::from_millis(100)).text("done");
            });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let started = Instant::now();
    let response = client.get(server.url("/slow")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "done");
    assert!(started.elapsed() >= Duration::from_millis(100));
    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests_are_all_counted() {
    const REQUESTS: usize = 32;
    let seen = Arc::new(AtomicUsize::new(0));
    let listener_seen = Arc::clone(&seen);

    let registry = ExpectationRegistry::new();
    registry
        .get("/busy", |e| {
            e.called(CallCountConstraint::Exactly(REQUESTS as u64))
                .listener(move |_| {
                    listener_seen.fetch_add(1, Ordering::SeqCst);
                })
                .responds(|r| {
                    r.text("ok");
                });
        })
        .unwrap();
    let (server, client) = start(registry).await;

    let mut handles = Vec::new();
    for _ in 0..REQUESTS {
        let client = client.clone();
        let url = server.url("/busy");
        handles.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    server.verify(Duration::from_secs(1)).await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), REQUESTS);
    server.shutdown().await;
}

#[tokio::test]
async fn test_verify_reports_unmet_expectations() {
    let registry = ExpectationRegistry::new();
    registry
        .get("/twice", |e| {
            e.called(CallCountConstraint::Exactly(2));
        })
        .unwrap();
    let (server, client) = start(registry).await;

    client.get(server.url("/twice")).send().await.unwrap();
    let failure = server
        .verify(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(failure.unmet.len(), 1);
    assert_eq!(failure.unmet[0].actual, 1);

    client.get(server.url("/twice")).send().await.unwrap();
    server.verify(Duration::from_secs(1)).await.unwrap();
    server.shutdown().await;
}
