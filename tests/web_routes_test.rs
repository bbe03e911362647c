//! Integration tests for web routes.

use std::io::Cursor;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use dotmoe::config::Config;
use dotmoe::db::{add_user, count_queued, create_session, Database, QueueKind};
use dotmoe::web::{create_app, AppState};
use image::{DynamicImage, ImageBuffer, Rgb};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIE: &str = "session=cookie-1";

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn app_with(db: &Database, config: Config) -> Router {
    create_app(AppState::new(config, db.clone()).expect("Failed to build state"))
}

fn app(db: &Database) -> Router {
    app_with(db, Config::for_testing())
}

/// Insert a moderator with a live session behind [`COOKIE`].
async fn logged_in(db: &Database) {
    add_user(db.pool(), "mod@example.com", "unused").await.unwrap();
    create_session(
        db.pool(),
        "cookie-1",
        "mod@example.com",
        "client-token",
        "2999-01-01T00:00:00+00:00",
    )
    .await
    .unwrap();
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, COOKIE)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_and_home() {
    let (db, _temp_dir) = setup_db().await;

    let response = app(&db).oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");

    let response = app(&db).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.social/@dotmoe"
    );
}

#[tokio::test]
async fn test_webhook_handshake() {
    let (db, _temp_dir) = setup_db().await;

    let response = app(&db)
        .oneshot(get(
            "/facebook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "1158201444");

    let response = app(&db)
        .oneshot(get(
            "/facebook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&db).oneshot(get("/facebook")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_webhook_delivery_is_acknowledged() {
    let (db, _temp_dir) = setup_db().await;

    // Unsigned deliveries are still acknowledged; they are rejected in the background.
    let response = app(&db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/facebook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"object":"page","entry":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verify_reports_token_only_with_session() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let response = app(&db).oneshot(get("/client/verify")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"token":null}"#);

    let response = app(&db)
        .oneshot(get_with_cookie("/client/verify"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, r#"{"token":"client-token"}"#);
}

#[tokio::test]
async fn test_client_page_requires_login() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let response = app(&db).oneshot(get("/client")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    let response = app(&db).oneshot(get_with_cookie("/client")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("mod@example.com"));
}

#[tokio::test]
async fn test_posts_requires_matching_token() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": 5, "parent_id": null, "author": "kona", "creator_id": 1,
            "source": "https://pixiv.net/artworks/5",
            "file_url": "https://cdn.test/5.png",
            "sample_url": "https://cdn.test/s5.jpg",
            "preview_url": "https://cdn.test/t5.jpg",
            "width": 100, "height": 100, "rating": "s"
        }])))
        .mount(&server)
        .await;
    let config = Config {
        safebooru_url: server.uri(),
        konachan_url: server.uri(),
        ..Config::for_testing()
    };

    let response = app_with(&db, config.clone())
        .oneshot(get("/client/posts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let wrong_token = Request::builder()
        .uri("/client/posts")
        .header(header::COOKIE, COOKIE)
        .header(header::AUTHORIZATION, "not-the-token")
        .body(Body::empty())
        .unwrap();
    let response = app_with(&db, config.clone())
        .oneshot(wrong_token)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let authorized = Request::builder()
        .uri("/client/posts")
        .header(header::COOKIE, COOKIE)
        .header(header::AUTHORIZATION, "client-token")
        .body(Body::empty())
        .unwrap();
    let response = app_with(&db, config).oneshot(authorized).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let posts: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["provider_name"], "Konachan");
    assert_eq!(posts[0]["message"], "https://pixiv.net/artworks/5");
}

#[tokio::test]
async fn test_submit_requires_session_and_queues() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let payload = serde_json::json!({
        "post_id": "kona-5",
        "author": "kona",
        "author_link": "https://konachan.test/user/1",
        "message": "https://pixiv.net/artworks/5",
        "attachments": ["https://cdn.test/5.png"],
        "provider": "Konachan",
        "is_explicit": false,
        "links": null
    })
    .to_string();

    let anonymous = Request::builder()
        .method("POST")
        .uri("/booru")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app(&db).oneshot(anonymous).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(count_queued(db.pool(), QueueKind::Default).await.unwrap(), 0);

    for expected in [r#"{"queued":true,"queue":"default"}"#, r#"{"queued":false,"queue":"default"}"#] {
        let request = Request::builder()
            .method("POST")
            .uri("/booru")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, COOKIE)
            .body(Body::from(payload.clone()))
            .unwrap();
        let response = app(&db).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, expected);
    }
    assert_eq!(count_queued(db.pool(), QueueKind::Default).await.unwrap(), 1);
}

#[tokio::test]
async fn test_relay_requires_session() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let response = app(&db)
        .oneshot(get("/client/uncors?url=https://cdn.test/a.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for missing in ["/client/uncors", "/client/uncors?url="] {
        let response = app(&db).oneshot(get_with_cookie(missing)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = app(&db)
        .oneshot(get_with_cookie("/client/uncors?url=ftp://cdn.test/a.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_relay_recompresses_image() {
    let (db, _temp_dir) = setup_db().await;
    logged_in(&db).await;

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb([200u8, 30, 90])))
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("not an image"),
        )
        .mount(&server)
        .await;

    let uri = format!(
        "/client/uncors?url={}",
        urlencoding::encode(&format!("{}/a.png", server.uri()))
    );
    let response = app(&db).oneshot(get_with_cookie(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=60"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);

    // Unknown formats are passed through untouched.
    let uri = format!(
        "/client/uncors?url={}",
        urlencoding::encode(&format!("{}/plain.txt", server.uri()))
    );
    let response = app(&db).oneshot(get_with_cookie(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_string(response).await, "not an image");

    let uri = format!(
        "/client/uncors?url={}",
        urlencoding::encode(&format!("{}/missing.png", server.uri()))
    );
    let response = app(&db).oneshot(get_with_cookie(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_routes_nested_under_endpoint() {
    let (db, _temp_dir) = setup_db().await;
    let config = Config {
        endpoint: "/moe".to_string(),
        ..Config::for_testing()
    };

    let response = app_with(&db, config.clone())
        .oneshot(get("/moe/healthz"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app_with(&db, config.clone())
        .oneshot(get("/healthz"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app_with(&db, config)
        .oneshot(get("/moe/client"))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::LOCATION], "/moe/login");
}
