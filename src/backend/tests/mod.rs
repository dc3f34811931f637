use super::*;
use crate::config::BackendConfig;
use crate::error::Error;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, category: Option<&str>) -> QbittorrentClient {
    QbittorrentClient::new(BackendConfig {
        url: server.uri(),
        username: "admin".into(),
        password: "adminadmin".into(),
        save_path: Some("/downloads/ranked".into()),
        category: category.map(str::to_string),
        tags: Some("ranked".into()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .and(body_string_contains("username=admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SID=s3ss10n; HttpOnly; path=/")
                .set_body_string("Ok."),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_submit_logs_in_and_posts_link_with_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .and(header("cookie", "SID=s3ss10n"))
        .and(body_string_contains("urls=magnet"))
        .and(body_string_contains("savepath=%2Fdownloads%2Franked"))
        .and(body_string_contains("tags=ranked"))
        .and(body_string_contains("paused=false"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server, None)
        .submit("magnet:?xt=urn:btih:abc")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fails_body_is_a_rejection() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .submit("magnet:?xt=urn:btih:abc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend(_)), "got {err:?}");
}

#[tokio::test]
async fn test_login_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .submit("magnet:?xt=urn:btih:abc")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend(ref msg) if msg.contains("403")), "got {err:?}");
}

#[tokio::test]
async fn test_add_error_status_carries_body() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/add"))
        .respond_with(ResponseTemplate::new(415).set_body_string("Torrent file is not valid"))
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .submit("http://tracker/x.torrent")
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("415"), "{message}");
    assert!(message.contains("Torrent file is not valid"), "{message}");
}

#[tokio::test]
async fn test_torrent_progress_is_keyed_by_lowercase_hash() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/info"))
        .and(query_param("category", "ranked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"hash": "ABCDEF", "progress": 0.42, "name": "x"},
            {"hash": "123456", "progress": 1.0, "name": "y"}
        ])))
        .mount(&server)
        .await;

    let progress = client_for(&server, Some("ranked"))
        .torrent_progress()
        .await
        .unwrap();

    assert_eq!(progress.len(), 2);
    assert_eq!(progress.get("abcdef"), Some(&0.42));
    assert_eq!(progress.get("123456"), Some(&1.0));
}
