//! CSRF, rate limiting, security headers and request ids through the full pipeline.

use reqwest::header::{CONTENT_TYPE, COOKIE};
use std::time::Duration;

use webguard::config::{RouteConfig, RouteRateLimit, ServerConfig};

mod common;

#[tokio::test]
async fn test_csrf_blocks_post_without_token() {
    let server = common::start_server(ServerConfig::default()).await;
    let client = common::client();

    let res = client.get(server.url("/form")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(common::set_cookie(&res, "_csrf").is_some());

    let res = client.post(server.url("/submit")).send().await.unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_csrf_accepts_matching_form_token() {
    let server = common::start_server(ServerConfig::default()).await;
    let client = common::client();

    let res = client.get(server.url("/form")).send().await.unwrap();
    let cookie = common::set_cookie(&res, "_csrf").unwrap();
    let token = cookie.trim_start_matches("_csrf=").to_string();
    assert_eq!(token.len(), 64);

    let res = client
        .post(server.url("/submit"))
        .header(COOKIE, &cookie)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(format!("_csrf={token}&name=ada"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "accepted");

    // Header token works too, a mismatched one does not.
    let res = client
        .post(server.url("/submit"))
        .header(COOKIE, &cookie)
        .header("x-csrf-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .post(server.url("/submit"))
        .header(COOKIE, &cookie)
        .header("x-csrf-token", "0".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let mut config = ServerConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.requests = 2;
    config.rate_limit.window_secs = 60;
    let server = common::start_server(config).await;
    let client = common::client();

    for _ in 0..2 {
        let res = client.get(server.url("/whoami")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["retry-after"], "60");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let server = common::start_server(ServerConfig::default()).await;
    let res = common::client().get(server.url("/whoami")).send().await.unwrap();

    let headers = res.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert!(headers.contains_key("strict-transport-security"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_incoming_request_id_is_propagated() {
    let server = common::start_server(ServerConfig::default()).await;
    let res = common::client()
        .get(server.url("/whoami"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_dev_mode_headers() {
    let mut config = ServerConfig::default();
    config.dev_mode = true;
    let server = common::start_server(config).await;
    let res = common::client().get(server.url("/whoami")).send().await.unwrap();

    assert!(!res.headers().contains_key("strict-transport-security"));
    assert!(res.headers().contains_key("cache-control"));
}

#[tokio::test]
async fn test_unknown_path_and_engine_failure() {
    let server = common::start_server(ServerConfig::default()).await;
    let client = common::client();

    let res = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = client.get(server.url("/boom")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert!(!res.text().await.unwrap().contains("boom"));
}

#[tokio::test]
async fn test_signed_literal_prop_is_verified() {
    let server = common::start_server(ServerConfig::default()).await;
    let codec = server.state.literals.clone().unwrap();
    let client = common::client();

    let wrapped = codec.wrap("{id: 7}").to_string();
    let res = client
        .get(server.url("/literal"))
        .query(&[("record", wrapped.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "{id: 7}");

    let forged = r#"{"__pln":"AAAA:e2lkOiA3fQ=="}"#;
    let res = client
        .get(server.url("/literal"))
        .query(&[("record", forged)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "untrusted");
}

fn multipart_body(boundary: &str, token: &str) -> String {
    format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"_csrf\"\r\n\r\n\
         {token}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         holiday\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"photo\"; filename=\"beach.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n\
         not really a jpeg\r\n\
         --{b}--\r\n",
        b = boundary
    )
}

#[tokio::test]
async fn test_csrf_accepts_multipart_form_token() {
    let server = common::start_server(ServerConfig::default()).await;
    let client = common::client();
    let token = "a".repeat(64);

    let res = client
        .post(server.url("/upload"))
        .header(COOKIE, format!("_csrf={token}"))
        .header(CONTENT_TYPE, "multipart/form-data; boundary=webguard-boundary")
        .body(multipart_body("webguard-boundary", &token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "uploaded holiday");

    let res = client
        .post(server.url("/upload"))
        .header(COOKIE, format!("_csrf={token}"))
        .header(CONTENT_TYPE, "multipart/form-data; boundary=webguard-boundary")
        .body(multipart_body("webguard-boundary", &"b".repeat(64)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_pruning_keeps_exhausted_long_window_bucket() {
    let mut config = ServerConfig::default();
    config.rate_limit.enabled = true;
    let mut strict = RouteConfig::new("strict", "/");
    strict.rate_limit = Some(RouteRateLimit {
        requests: 1,
        window_secs: 3600,
    });
    config.routes = vec![strict];
    let server = common::start_server(config).await;
    let client = common::client();

    assert_eq!(client.get(server.url("/whoami")).send().await.unwrap().status(), 200);
    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["retry-after"], "3600");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let limiter = server.state.limiter.clone().unwrap();
    assert_eq!(limiter.prune_idle(Duration::from_millis(10)), 0);

    let res = client.get(server.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), 429);
}
