use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mimic_http::predicate::BodyMatcher;
use mimic_http::{ExpectationRegistry, IncomingRequest, ValueMatcher};
use std::time::Duration;

fn registry_with(count: usize) -> ExpectationRegistry {
    let registry = ExpectationRegistry::new();
    for i in 0..count {
        registry
            .get(format!("/api/v1/endpoint{i}"), |e| {
                e.header("Accept", "application/json").responds(|r| {
                    r.json(serde_json::json!({"id": i}));
                });
            })
            .unwrap();
    }
    registry
}

fn regex_registry_with(count: usize) -> ExpectationRegistry {
    let registry = ExpectationRegistry::new();
    for i in 0..count {
        let path = ValueMatcher::regex(&format!(r"^/api/v\d+/endpoint{i}$")).unwrap();
        registry
            .get(path, |e| {
                e.responds(|r| {
                    r.text("ok");
                });
            })
            .unwrap();
    }
    registry
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for count in [10, 50, 100, 500, 1000].iter() {
        let registry = registry_with(*count);
        let first = IncomingRequest::get("/api/v1/endpoint0").with_header("Accept", "application/json");
        let last = IncomingRequest::get(format!("/api/v1/endpoint{}", count - 1))
            .with_header("Accept", "application/json");
        let miss = IncomingRequest::get("/api/v1/nowhere");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("match_first", count), count, |b, _| {
            b.iter(|| registry.dispatch(black_box(&first)))
        });
        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| registry.dispatch(black_box(&last)))
        });
        group.bench_with_input(BenchmarkId::new("no_match", count), count, |b, _| {
            b.iter(|| registry.dispatch(black_box(&miss)))
        });
    }

    group.finish();
}

fn bench_regex_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("regex_dispatch");

    for count in [10, 100, 1000].iter() {
        let registry = regex_registry_with(*count);
        let last = IncomingRequest::get(format!("/api/v2/endpoint{}", count - 1));
        group.bench_with_input(BenchmarkId::new("match_last", count), count, |b, _| {
            b.iter(|| registry.dispatch(black_box(&last)))
        });
    }

    group.finish();
}

fn bench_body_decoding(c: &mut Criterion) {
    let registry = ExpectationRegistry::new();
    // Several body predicates over the same content type share one decode.
    for name in ["alpha", "bravo", "charlie", "delta"] {
        registry
            .post("/items", |e| {
                e.body("application/json", BodyMatcher::json_pointer("/name", name));
            })
            .unwrap();
    }
    let body = serde_json::to_vec(&serde_json::json!({
        "name": "delta",
        "tags": (0..64).map(|i| format!("tag{i}")).collect::<Vec<_>>(),
    }))
    .unwrap();
    let request = IncomingRequest::post("/items").with_body(body, "application/json");

    c.bench_function("body_decoding/json_pointer_x4", |b| {
        b.iter(|| registry.respond(black_box(&request)))
    });
}

fn bench_chunked_materialization(c: &mut Criterion) {
    let registry = ExpectationRegistry::new();
    let payload = "x".repeat(64 * 1024);
    registry
        .get("/large", |e| {
            e.responds(|r| {
                r.text(payload).chunked(16, Duration::ZERO);
            });
        })
        .unwrap();
    let request = IncomingRequest::get("/large");

    c.bench_function("materialize/chunked_64k_x16", |b| {
        b.iter(|| registry.respond(black_box(&request)))
    });
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_regex_dispatch,
    bench_body_decoding,
    bench_chunked_materialization
);
criterion_main!(benches);
