//! Integration tests for the provider aggregator against mocked booru APIs.

use std::collections::HashSet;

use dotmoe::config::Config;
use dotmoe::providers::{
    default_aggregator, is_allowed_source, Aggregator, KonachanAdapter, ProviderFetchError,
    SafebooruAdapter,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn safebooru_xml(count: u64) -> String {
    let mut body = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><posts count="100" offset="0">"#);
    for id in 1..=count {
        body.push_str(&format!(
            r#"<post id="{id}" parent_id="" width="800" height="600" source="https://pixiv.net/artworks/{id}" file_url="https://cdn.safebooru.test/{id}.png" sample_url="https://cdn.safebooru.test/s{id}.jpg" preview_url="https://cdn.safebooru.test/t{id}.jpg"/>"#
        ));
    }
    // Dropped: no usable source.
    body.push_str(r#"<post id="900" parent_id="" width="1" height="1" source="" file_url="https://cdn.safebooru.test/x.png" sample_url="" preview_url=""/>"#);
    body.push_str("</posts>");
    body
}

fn konachan_json(count: u64) -> serde_json::Value {
    let mut posts: Vec<serde_json::Value> = (1..=count)
        .map(|id| {
            serde_json::json!({
                "id": 1000 + id,
                "parent_id": null,
                "author": "kona",
                "creator_id": 7,
                "source": format!("https://twitter.com/artist/status/{id}"),
                "file_url": format!("https://cdn.konachan.test/{id}.png"),
                "sample_url": format!("https://cdn.konachan.test/s{id}.jpg"),
                "preview_url": format!("https://cdn.konachan.test/t{id}.jpg"),
                "width": 1920,
                "height": 1080,
                "rating": "s"
            })
        })
        .collect();
    // Dropped: no id at all.
    posts.push(serde_json::json!({
        "id": null, "parent_id": null, "source": "https://x.test",
        "file_url": "https://cdn.konachan.test/none.png"
    }));
    serde_json::Value::Array(posts)
}

fn aggregator_for(server: &MockServer) -> Aggregator {
    let mut aggregator = Aggregator::new(reqwest::Client::new());
    aggregator.register(Box::new(SafebooruAdapter::new(&server.uri())));
    aggregator.register(Box::new(KonachanAdapter::new(&server.uri())));
    aggregator
}

#[tokio::test]
async fn test_merges_two_providers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "dapi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(safebooru_xml(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post.json"))
        .and(query_param("tags", "rating:s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(konachan_json(7)))
        .mount(&server)
        .await;

    let outcome = aggregator_for(&server).fetch().await;

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    assert_eq!(outcome.posts.len(), 12);

    let safebooru: Vec<_> = outcome
        .posts
        .iter()
        .filter(|p| p.provider_name.as_deref() == Some("Safebooru"))
        .collect();
    let konachan: Vec<_> = outcome
        .posts
        .iter()
        .filter(|p| p.provider_name.as_deref() == Some("Konachan"))
        .collect();
    assert_eq!(safebooru.len(), 5);
    assert_eq!(konachan.len(), 7);

    for post in &outcome.posts {
        assert!(!post.post_id.is_empty());
        assert!(is_allowed_source(&post.message));
        assert!(!post.attachments.is_empty());
    }
    assert!(konachan.iter().all(|p| p.provider.as_deref() == Some("Konachan")));
    assert!(safebooru.iter().all(|p| p.provider.is_none()));

    let ids: HashSet<_> = outcome.posts.iter().map(|p| p.post_id.as_str()).collect();
    assert_eq!(ids.len(), 12);
}

#[tokio::test]
async fn test_overloaded_provider_is_reported_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(safebooru_xml(3)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let outcome = aggregator_for(&server).fetch().await;

    assert_eq!(outcome.posts.len(), 3);
    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(
        outcome.errors[0],
        ProviderFetchError::Overloaded {
            provider: "Konachan"
        }
    ));
    assert_eq!(outcome.errors[0].to_string(), "[Konachan] Server overload!");
}

#[tokio::test]
async fn test_server_error_is_isolated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(konachan_json(2)))
        .mount(&server)
        .await;

    let config = Config {
        safebooru_url: server.uri(),
        konachan_url: server.uri(),
        ..Config::for_testing()
    };
    let outcome = default_aggregator(&config, reqwest::Client::new())
        .fetch()
        .await;

    assert_eq!(outcome.posts.len(), 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].provider(), "Safebooru");
}
