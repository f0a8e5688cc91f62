//! Integration tests for the HTTP requester, the GraphQL requester and the downloader
//! against a local mock server.

use core::num::NonZeroU32;
use core::time::Duration;
use flate2::Compression;
use flate2::write::GzEncoder;
use losh_crawler_lib::net::{
    Attempt, AttemptOutcome, CallContext, Downloader, GraphQlRequester, HttpRequester, RateLimiter, RequestError,
};
use reqwest::StatusCode;
use serde_json::json;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Requester with short delays that records every attempt.
fn requester(retry_count: u32) -> (HttpRequester, Arc<Mutex<Vec<Attempt>>>) {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&attempts);

    let requester = HttpRequester::builder()
        .name("test")
        .retry_count(retry_count)
        .base_delay(Duration::from_millis(10))
        .max_wait(Duration::from_secs(2))
        .timeout(Duration::from_secs(5))
        .max_redirects(3)
        .observer(Arc::new(move |attempt: &Attempt| recorded.lock().unwrap().push(attempt.clone())))
        .build()
        .unwrap();

    (requester, attempts)
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let (requester, attempts) = requester(3);
    let response = requester.get(&CallContext::new(), &format!("{}/flaky", server.uri())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "finally");

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].outcome, AttemptOutcome::RetryableStatus(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(attempts[1].delay, Duration::from_millis(10));
    assert_eq!(attempts[2].delay, Duration::from_millis(20));
    assert_eq!(attempts[2].outcome, AttemptOutcome::Response(StatusCode::OK));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (requester, attempts) = requester(5);
    let response = requester.get(&CallContext::new(), &format!("{}/missing", server.uri())).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(attempts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn retry_after_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (requester, attempts) = requester(2);
    let started = Instant::now();
    let response = requester.get(&CallContext::new(), &format!("{}/limited", server.uri())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(attempts.lock().unwrap()[1].delay, Duration::from_secs(1));
}

#[tokio::test]
async fn exhausted_retries_return_last_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let (requester, _) = requester(2);
    let error = requester.get(&CallContext::new(), &format!("{}/down", server.uri())).await.unwrap_err();

    assert_eq!(error.status(), Some(StatusCode::BAD_GATEWAY));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let requester = HttpRequester::builder()
        .retry_count(5)
        .base_delay(Duration::from_secs(30))
        .max_wait(Duration::from_secs(60))
        .build()
        .unwrap();

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    let _ = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let error = requester.get(&ctx, &format!("{}/down", server.uri())).await.unwrap_err();

    assert!(matches!(error, RequestError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn redirect_loops_are_cut_off() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let (requester, attempts) = requester(5);
    let error = requester.get(&CallContext::new(), &format!("{}/loop", server.uri())).await.unwrap_err();

    assert!(matches!(error, RequestError::RedirectLoop { max_redirects: 3 }));
    assert!(!error.is_retryable());
    assert_eq!(attempts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn shared_limiter_spaces_out_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let requester = HttpRequester::builder()
        .rate_limiter(RateLimiter::new(NonZeroU32::new(2).unwrap(), Duration::from_millis(300)))
        .build()
        .unwrap();
    let ctx = CallContext::new();

    let started = Instant::now();
    for _ in 0..3 {
        let _ = requester.get(&ctx, &server.uri()).await.unwrap();
    }

    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn gzip_bodies_are_decoded() {
    let server = MockServer::start().await;
    let body = "x".repeat(10_000);
    Mock::given(method("GET"))
        .and(path("/doc.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(body.as_bytes())),
        )
        .mount(&server)
        .await;

    let (requester, _) = requester(0);
    let content = Downloader::new(requester)
        .download_content(&CallContext::new(), &format!("{}/doc.json", server.uri()), Some(20_000))
        .await
        .unwrap();

    assert_eq!(content.len(), 10_000);
}

#[tokio::test]
async fn declared_size_above_limit_fails_up_front() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
        .mount(&server)
        .await;

    let (requester, _) = requester(0);
    let error = Downloader::new(requester)
        .download_content(&CallContext::new(), &format!("{}/big", server.uri()), Some(1024))
        .await
        .unwrap_err();

    assert!(matches!(error, RequestError::ContentTooLarge { size: Some(2048), limit: 1024 }));
}

#[tokio::test]
async fn decoded_size_above_limit_fails_while_streaming() {
    let server = MockServer::start().await;
    // compresses far below the limit, expands far above it
    Mock::given(method("GET"))
        .and(path("/bomb"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(&vec![0u8; 1_000_000])),
        )
        .mount(&server)
        .await;

    let (requester, _) = requester(0);
    let error = Downloader::new(requester)
        .download_content(&CallContext::new(), &format!("{}/bomb", server.uri()), Some(10_000))
        .await
        .unwrap_err();

    assert!(matches!(error, RequestError::ContentTooLarge { size: None, limit: 10_000 }));
}

/// Serve `body` with chunked transfer encoding, so no length is declared up front.
fn chunked_server(body: Vec<u8>, connections: usize) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let _ = std::thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n");
            for chunk in body.chunks(4096) {
                let sent = stream
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .and_then(|()| stream.write_all(chunk))
                    .and_then(|()| stream.write_all(b"\r\n"));
                if sent.is_err() {
                    break;
                }
            }
            let _ = stream.write_all(b"0\r\n\r\n");
        }
    });

    format!("http://{addr}/stream")
}

#[tokio::test]
async fn undeclared_plain_body_above_limit_fails_while_streaming() {
    let url = chunked_server(vec![b'a'; 40_000], 2);
    let (requester, _) = requester(0);
    let downloader = Downloader::new(requester);
    let ctx = CallContext::new();

    let error = downloader.download_content(&ctx, &url, Some(10_000)).await.unwrap_err();
    assert!(matches!(error, RequestError::ContentTooLarge { size: None, limit: 10_000 }), "{error:?}");

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("stream.bin");
    let error = downloader.download_file(&ctx, &url, &target, Some(10_000)).await.unwrap_err();

    assert!(matches!(error, RequestError::ContentTooLarge { size: None, limit: 10_000 }), "{error:?}");
    assert!(!target.exists());
}

#[tokio::test]
async fn undeclared_plain_body_within_limit_is_complete() {
    let url = chunked_server(vec![b'a'; 40_000], 1);
    let (requester, _) = requester(0);

    let content = Downloader::new(requester)
        .download_content(&CallContext::new(), &url, Some(40_000))
        .await
        .unwrap();

    assert_eq!(content.len(), 40_000);
}

#[tokio::test]
async fn status_outside_allow_list_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/created"))
        .respond_with(ResponseTemplate::new(201).set_body_string("new"))
        .mount(&server)
        .await;

    let (requester, _) = requester(0);
    let downloader = Downloader::new(requester).with_ok_codes([StatusCode::OK, StatusCode::CREATED]);
    let ctx = CallContext::new();

    let error = downloader.download_content(&ctx, &format!("{}/gone", server.uri()), None).await.unwrap_err();
    assert_eq!(error.status(), Some(StatusCode::GONE));

    let content = downloader.download_content(&ctx, &format!("{}/created", server.uri()), None).await.unwrap();
    assert_eq!(&content[..], b"new");
}

#[tokio::test]
async fn failed_file_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bomb"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(&vec![0u8; 1_000_000])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let (requester, _) = requester(0);
    let downloader = Downloader::new(requester);
    let ctx = CallContext::new();

    let partial = tmp.path().join("bomb.bin");
    let _ = downloader
        .download_file(&ctx, &format!("{}/bomb", server.uri()), &partial, Some(10_000))
        .await
        .unwrap_err();
    assert!(!partial.exists());

    let complete = tmp.path().join("ok.txt");
    let written = downloader.download_file(&ctx, &format!("{}/ok", server.uri()), &complete, None).await.unwrap();
    assert_eq!(written, 5);
    assert_eq!(std::fs::read_to_string(&complete).unwrap(), "hello");
}

#[tokio::test]
async fn graphql_errors_fail_the_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "Broken" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "value": 1 },
            "errors": [{ "message": "field is deprecated" }, { "message": "rate limited" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({ "operationName": "Fine", "variables": { "n": 7 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "value": 7 } })))
        .mount(&server)
        .await;

    let (http, _) = requester(0);
    let graphql = GraphQlRequester::new(http, Url::parse(&format!("{}/graphql", server.uri())).unwrap());
    let ctx = CallContext::new();

    #[derive(Debug, serde::Deserialize)]
    struct Value {
        value: u32,
    }

    let error = graphql.query::<_, Value>(&ctx, "Broken", "query Broken { value }", &json!({})).await.unwrap_err();
    match error {
        RequestError::GraphQl(messages) => assert_eq!(messages, ["field is deprecated", "rate limited"]),
        other => panic!("unexpected error: {other}"),
    }

    let value: Value = graphql
        .query(&ctx, "Fine", "query Fine($n: Int!) { value(n: $n) }", &json!({ "n": 7 }))
        .await
        .unwrap();
    assert_eq!(value.value, 7);
}
