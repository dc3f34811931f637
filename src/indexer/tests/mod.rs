use super::jackett::info_hash_from_magnet;
use super::*;
use crate::config::IndexerConfig;
use crate::error::Error;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> JackettClient {
    JackettClient::new(IndexerConfig {
        url: server.uri(),
        api_key: "secret".into(),
        categories: vec![2000],
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_search_maps_results_and_prefers_magnets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2.0/indexers/all/results"))
        .and(query_param("apikey", "secret"))
        .and(query_param("Query", "ABC-123"))
        .and(query_param("Category[]", "2000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Results": [
                {
                    "Title": "ABC-123 1080p",
                    "Tracker": "tracker-a",
                    "Size": 4_000_000_000_i64,
                    "Link": "http://jackett/dl/1.torrent",
                    "MagnetUri": "magnet:?xt=urn:btih:ABCDEF0123&dn=x",
                    "Seeders": 12,
                    "Peers": 20
                },
                {
                    "Title": "ABC-123 720p",
                    "Tracker": "tracker-b",
                    "Size": 1_500_000_000_i64,
                    "Link": "http://jackett/dl/2.torrent",
                    "MagnetUri": null,
                    "Seeders": 3,
                    "Peers": 4,
                    "InfoHash": "FEDCBA"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server).search("ABC-123").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].link, "magnet:?xt=urn:btih:ABCDEF0123&dn=x");
    assert_eq!(results[0].info_hash.as_deref(), Some("abcdef0123"));
    assert_eq!(results[0].seeders, 12);
    assert_eq!(results[1].link, "http://jackett/dl/2.torrent");
    assert_eq!(results[1].info_hash.as_deref(), Some("fedcba"));
    assert_eq!(results[1].tracker, "tracker-b");
}

#[tokio::test]
async fn test_empty_results_are_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2.0/indexers/all/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Results": [],
            "Indexers": []
        })))
        .mount(&server)
        .await;

    let results = client_for(&server).search("NONE-000").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_results_without_any_link_are_dropped_and_rest_kept_in_order() {
    let server = MockServer::start().await;
    let mut results: Vec<_> = (0..25)
        .map(|i| {
            serde_json::json!({
                "Title": format!("small-{i}"),
                "Size": 100 + i,
                "Link": format!("http://jackett/dl/{i}.torrent"),
                "Seeders": 1
            })
        })
        .collect();
    results.insert(0, serde_json::json!({"Title": "no link", "Size": 99}));
    results.push(serde_json::json!({
        "Title": "best-1080p",
        "Size": 9_000_000_000_i64,
        "MagnetUri": "magnet:?xt=urn:btih:b35t",
        "Seeders": 50
    }));
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "Results": results })),
        )
        .mount(&server)
        .await;

    let found = client_for(&server).search("ABC-123").await.unwrap();

    assert_eq!(found.len(), 26);
    assert_eq!(found[0].title, "small-0");

    // The largest release sits after every other result and still wins
    let picked = crate::selector::select(&found, 1).unwrap();
    assert_eq!(picked.title, "best-1080p");
    assert_eq!(picked.info_hash.as_deref(), Some("b35t"));
}

#[tokio::test]
async fn test_search_keeps_base_url_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jackett/api/v2.0/indexers/all/results"))
        .and(query_param("Query", "ABC-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Results": [
                {"Title": "ABC-123", "Size": 10, "Link": "http://jackett/dl/1.torrent", "Seeders": 2}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = JackettClient::new(IndexerConfig {
        url: format!("{}/jackett/", server.uri()),
        api_key: "secret".into(),
        categories: Vec::new(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    let found = client.search("ABC-123").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_http_error_status_is_an_indexer_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).search("ABC-123").await.unwrap_err();
    assert!(matches!(err, Error::Indexer(ref msg) if msg.contains("401")), "got {err:?}");
}

#[test]
fn test_info_hash_from_magnet() {
    assert_eq!(
        info_hash_from_magnet("magnet:?dn=x&xt=urn:btih:0123abcd&tr=udp").as_deref(),
        Some("0123abcd")
    );
    assert_eq!(info_hash_from_magnet("http://example.com/x.torrent"), None);
}
