use std::time::{SystemTime, UNIX_EPOCH};

use httpmock::{Mock, MockServer};
use tempfile::TempDir;
use wechat_draft_rs::{Config, WeChatClient, WeChatError};

fn client(server: &MockServer, dir: &TempDir) -> WeChatClient {
    let config = Config::new("wx_test", "s3cret")
        .with_base_url(server.base_url())
        .with_token_cache_path(dir.path().join("token_cache"));
    WeChatClient::from_config(config).expect("client")
}

fn token_mock(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method("GET")
            .path("/cgi-bin/token")
            .query_param("grant_type", "client_credential")
            .query_param("appid", "wx_test")
            .query_param("secret", "s3cret");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"access_token":"FRESH_TOKEN","expires_in":7200}"#);
    })
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

#[tokio::test]
async fn second_call_within_window_uses_memory() {
    let server = MockServer::start();
    let mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir);

    let first = client.get_access_token().await.unwrap();
    let second = client.get_access_token().await.unwrap();

    assert_eq!(first, "FRESH_TOKEN");
    assert_eq!(first, second);
    mock.assert_hits(1);

    let info = client.get_token_info().await.unwrap();
    assert!(!info.is_expired());
    let remaining = info.expires_at - now();
    assert!(remaining > 7000.0 && remaining <= 7140.0, "remaining {remaining}");
}

#[tokio::test]
async fn refresh_persists_cache_file() {
    let server = MockServer::start();
    let _mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir);

    client.get_access_token().await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("token_cache")).unwrap();
    let (token, expires_at) = contents.split_once(',').unwrap();
    assert_eq!(token, "FRESH_TOKEN");
    assert!(expires_at.parse::<f64>().unwrap() > now());
}

#[tokio::test]
async fn valid_cache_file_skips_network() {
    let server = MockServer::start();
    let mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("token_cache"),
        format!("CACHED_TOKEN,{}", now() + 3600.0),
    )
    .unwrap();
    let client = client(&server, &dir);

    assert_eq!(client.get_access_token().await.unwrap(), "CACHED_TOKEN");
    assert_eq!(client.get_access_token().await.unwrap(), "CACHED_TOKEN");
    mock.assert_hits(0);
}

#[tokio::test]
async fn expired_cache_file_refreshes_once() {
    let server = MockServer::start();
    let mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("token_cache"), "OLD_TOKEN,1.0").unwrap();
    let client = client(&server, &dir);

    assert_eq!(client.get_access_token().await.unwrap(), "FRESH_TOKEN");
    assert_eq!(client.get_access_token().await.unwrap(), "FRESH_TOKEN");
    mock.assert_hits(1);

    let contents = std::fs::read_to_string(dir.path().join("token_cache")).unwrap();
    assert!(contents.starts_with("FRESH_TOKEN,"));
}

#[tokio::test]
async fn garbled_cache_file_is_ignored() {
    let server = MockServer::start();
    let mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("token_cache"), "not,a,cache").unwrap();
    let client = client(&server, &dir);

    assert_eq!(client.get_access_token().await.unwrap(), "FRESH_TOKEN");
    mock.assert_hits(1);
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
    let server = MockServer::start();
    let mock = token_mock(&server);
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir);

    client.get_access_token().await.unwrap();
    client.refresh_token().await.unwrap();
    mock.assert_hits(2);
}

#[tokio::test]
async fn missing_access_token_embeds_response() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/cgi-bin/token");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"errcode":40013,"errmsg":"invalid appid"}"#);
    });
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir);

    let err = client.get_access_token().await.unwrap_err();
    assert!(matches!(err, WeChatError::Auth { .. }));
    assert!(err.to_string().contains("invalid appid"));
    assert!(err.to_string().contains("40013"));
    assert!(!dir.path().join("token_cache").exists());
    mock.assert();
}

#[tokio::test]
async fn non_json_reply_keeps_raw_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/cgi-bin/token");
        then.status(502)
            .header("content-type", "text/html")
            .body("<html><body>502 Bad Gateway</body></html>");
    });
    let dir = TempDir::new().unwrap();
    let client = client(&server, &dir);

    let err = client.get_access_token().await.unwrap_err();
    match &err {
        WeChatError::InvalidResponse { status, body } => {
            assert_eq!(*status, 502);
            assert!(body.contains("502 Bad Gateway"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("502 Bad Gateway"));
    assert!(!dir.path().join("token_cache").exists());
}
