// SPDX-License-Identifier: Apache-2.0

//! Access Phase Integration Tests
//!
//! Load real handler scripts through the worker and check the decision the
//! host would act on for each request.

use access_sdk::{Bridge, BridgeConfig};
use scripted_access::access::AccessDecision;
use scripted_access::init::config::AccessConfig;
use scripted_access::worker::Worker;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use utilities::request::FakeRequest;

const RULES: &str = r#"
BLOCKED = {"10.0.0.66"}


def handle_request(r):
    if request_uri(r).startswith("/public/"):
        return 200
    if request_header(r, "x-real-ip") in BLOCKED:
        return False
    if request_exten(r) == "php":
        return 404
    if request_method(r) == "OTHER":
        return "deny"
    if request_uri(r) == "/boom":
        raise RuntimeError("boom")
    if request_uri(r) == "/spin":
        while True:
            pass
    if request_user(r) == "admin":
        return "allow"
    return None
"#;

fn script(code: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(code.as_bytes()).unwrap();
    file
}

fn worker(file: &NamedTempFile, timeout: Option<Duration>) -> Worker {
    let config = AccessConfig {
        bridge: BridgeConfig::new(file.path()),
        timeout,
    };
    let bridge = Bridge::load(config.bridge.clone()).unwrap();
    Worker::new(bridge, &config)
}

#[test]
fn decides_each_request() {
    let file = script(RULES);
    let worker = worker(&file, Some(Duration::from_secs(5)));

    let cases = [
        (FakeRequest::get("/public/logo.png"), AccessDecision::Allow),
        (
            FakeRequest::get("/app").header("X-Real-IP", "10.0.0.66"),
            AccessDecision::Deny(403),
        ),
        (FakeRequest::get("/index.php"), AccessDecision::Deny(404)),
        (FakeRequest::new("PATCH", "/doc"), AccessDecision::Deny(403)),
        (
            // "admin:pw"
            FakeRequest::get("/admin").header("Authorization", "Basic YWRtaW46cHc="),
            AccessDecision::Allow,
        ),
        (FakeRequest::get("/app"), AccessDecision::Declined),
    ];

    for (request, expected) in cases {
        let outcome = worker.process(request.raw());
        assert_eq!(outcome.decision, expected, "{:?}", outcome.request_line);
        assert!(outcome.request_line.is_some());
    }
}

#[test]
fn malformed_requests_are_rejected_before_the_handler() {
    let file = script(RULES);
    let worker = worker(&file, None);

    let outcome = worker.process(bytes::Bytes::from_static(b"GET /x HTTP/1.1\r\n\r\n"));
    assert_eq!(outcome.decision, AccessDecision::Deny(400));
    assert_eq!(outcome.request_line, None);

    let outcome = worker.process(
        FakeRequest::get("/x")
            .header("Host", "second.example.com")
            .raw(),
    );
    assert_eq!(outcome.decision, AccessDecision::Deny(400));
}

#[test]
fn failures_do_not_affect_later_requests() {
    let file = script(RULES);
    let worker = worker(&file, Some(Duration::from_millis(50)));

    let outcome = worker.process(FakeRequest::get("/boom").raw());
    assert_eq!(outcome.decision, AccessDecision::Error(500));

    let outcome = worker.process(FakeRequest::get("/spin").raw());
    assert_eq!(outcome.decision, AccessDecision::Error(500));

    let outcome = worker.process(FakeRequest::get("/public/ok").raw());
    assert_eq!(outcome.decision, AccessDecision::Allow);
}

#[test]
fn second_run_on_the_same_request_declines() {
    let file = script("def handle_request(r):\n    return 'deny'\n");
    let worker = worker(&file, None);

    let request = FakeRequest::simple_get().parsed();
    assert_eq!(worker.handle(&request), AccessDecision::Deny(403));
    assert_eq!(worker.handle(&request), AccessDecision::Declined);
}

#[test]
fn cancellation_stops_a_running_handler() {
    let file = script(RULES);
    let token = CancellationToken::new();
    let worker = worker(&file, None).with_cancellation(token.clone());

    token.cancel();
    let outcome = worker.process(FakeRequest::get("/spin").raw());
    assert_eq!(outcome.decision, AccessDecision::Error(500));
}
