use lookalike_http::{HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client(attempts: u32) -> HttpClient {
    HttpClient::new()
        .expect("client builds")
        .with_max_attempts(attempts)
        .with_backoff(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn returns_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client(3)
        .get_bytes(&format!("{}/cat.jpg", server.uri()), RequestOpts::default())
        .await
        .expect("download succeeds");

    assert_eq!(body.as_ref(), &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn persistent_503_uses_exactly_the_attempt_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = fast_client(3)
        .get_bytes(&format!("{}/busy.jpg", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status, attempts, ..
        } => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;

    let err = fast_client(3)
        .get_bytes(&format!("{}/missing.jpg", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();

    assert!(!err.is_transient());
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.jpg"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client(3)
        .get_bytes(&format!("{}/flaky.jpg", server.uri()), RequestOpts::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn per_request_budget_overrides_client_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        max_attempts: Some(1),
        ..Default::default()
    };
    let err = fast_client(5)
        .get_bytes(&format!("{}/once.jpg", server.uri()), opts)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "lookalike-test/1.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    fast_client(1)
        .with_user_agent("lookalike-test/1.0")
        .expect("valid header")
        .get_bytes(&format!("{}/ua.jpg", server.uri()), RequestOpts::default())
        .await
        .expect("matched on user agent");
}

#[tokio::test]
async fn rejects_non_http_schemes_without_sending() {
    let err = fast_client(3)
        .get_bytes("file:///etc/passwd", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Url(_)));
    assert_eq!(err.attempts(), 0);
}

#[tokio::test]
async fn refused_connections_use_the_attempt_budget() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
        listener.local_addr().expect("local addr").port()
    };

    let err = fast_client(3)
        .get_bytes(&format!("http://127.0.0.1:{port}/gone.jpg"), RequestOpts::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Network { attempts: 3, .. }), "got {err:?}");
    assert!(err.is_transient());
}
