//! Integration tests for moderator authentication.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use dotmoe::auth::{
    generate_client_token, generate_session_token, hash_password, verify_password,
};
use dotmoe::config::Config;
use dotmoe::db::{add_user, get_session_by_cookie, Database};
use dotmoe::web::{create_app, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn app(db: &Database) -> axum::Router {
    create_app(AppState::new(Config::for_testing(), db.clone()).expect("Failed to build state"))
}

fn login_request(email: &str, password: &str) -> Request<Body> {
    let form = format!(
        "email={}&password={}",
        urlencoding::encode(email),
        urlencoding::encode(password)
    );
    Request::builder()
        .method("POST")
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

/// The `session=` value from a Set-Cookie header.
fn session_value(response: &axum::response::Response) -> String {
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("session="))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_password_hashing() {
    let password = "SecureP@ssw0rd123";
    let hash = hash_password(password).expect("Failed to hash password");

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(password, &hash).expect("Failed to verify password"));
    assert!(!verify_password("WrongPassword", &hash).expect("Failed to verify password"));

    // Salted: the same password hashes differently.
    assert_ne!(hash, hash_password(password).unwrap());
}

#[tokio::test]
async fn test_token_generation() {
    let cookie = generate_session_token();
    let token = generate_client_token();

    assert_eq!(cookie.len(), 64);
    assert_eq!(token.len(), 16);
    assert!(cookie.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(cookie, generate_session_token());
    assert_ne!(token, generate_client_token());
}

#[tokio::test]
async fn test_login_success_sets_session() {
    let (db, _temp_dir) = setup_test_db().await;
    let hash = hash_password("hunter2hunter2").unwrap();
    add_user(db.pool(), "mod@example.com", &hash).await.unwrap();

    let response = app(&db)
        .oneshot(login_request("mod@example.com", "hunter2hunter2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/client");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/;"));
    assert!(!set_cookie.contains("Secure"));

    let cookie = session_value(&response);
    let session = get_session_by_cookie(db.pool(), &cookie)
        .await
        .unwrap()
        .expect("session should exist");
    assert_eq!(session.email, "mod@example.com");
    assert_eq!(session.token.len(), 16);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (db, _temp_dir) = setup_test_db().await;
    let hash = hash_password("hunter2hunter2").unwrap();
    add_user(db.pool(), "mod@example.com", &hash).await.unwrap();

    for (email, password) in [
        ("mod@example.com", "wrong-password"),
        ("nobody@example.com", "hunter2hunter2"),
    ] {
        let response = app(&db)
            .oneshot(login_request(email, password))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Incorrect email or password"));
    }
}

#[tokio::test]
async fn test_login_page_redirects_when_logged_in() {
    let (db, _temp_dir) = setup_test_db().await;
    let hash = hash_password("hunter2hunter2").unwrap();
    add_user(db.pool(), "mod@example.com", &hash).await.unwrap();

    let response = app(&db)
        .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let login = app(&db)
        .oneshot(login_request("mod@example.com", "hunter2hunter2"))
        .await
        .unwrap();
    let cookie = session_value(&login);

    let response = app(&db)
        .oneshot(
            Request::builder()
                .uri("/login")
                .header(header::COOKIE, format!("session={cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/client");
}

#[tokio::test]
async fn test_logout_destroys_session() {
    let (db, _temp_dir) = setup_test_db().await;
    let hash = hash_password("hunter2hunter2").unwrap();
    add_user(db.pool(), "mod@example.com", &hash).await.unwrap();

    let login = app(&db)
        .oneshot(login_request("mod@example.com", "hunter2hunter2"))
        .await
        .unwrap();
    let cookie = session_value(&login);

    let response = app(&db)
        .oneshot(
            Request::builder()
                .uri("/logout")
                .header(header::COOKIE, format!("session={cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));
    assert!(get_session_by_cookie(db.pool(), &cookie)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_session_is_ignored() {
    let (db, _temp_dir) = setup_test_db().await;
    add_user(db.pool(), "mod@example.com", "unused").await.unwrap();
    dotmoe::db::create_session(
        db.pool(),
        "stale",
        "mod@example.com",
        "stale-token",
        "2000-01-01T00:00:00+00:00",
    )
    .await
    .unwrap();

    let response = app(&db)
        .oneshot(
            Request::builder()
                .uri("/client/verify")
                .header(header::COOKIE, "session=stale")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], br#"{"token":null}"#);

    // The stale row is removed on sight.
    assert!(get_session_by_cookie(db.pool(), "stale")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_login_prunes_expired_sessions() {
    let (db, _temp_dir) = setup_test_db().await;
    let hash = hash_password("hunter2hunter2").unwrap();
    add_user(db.pool(), "mod@example.com", &hash).await.unwrap();
    dotmoe::db::create_session(
        db.pool(),
        "old-login",
        "mod@example.com",
        "old-token",
        "2000-01-01T00:00:00+00:00",
    )
    .await
    .unwrap();

    let response = app(&db)
        .oneshot(login_request("mod@example.com", "hunter2hunter2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    assert!(get_session_by_cookie(db.pool(), "old-login")
        .await
        .unwrap()
        .is_none());
    let fresh = session_value(&response);
    assert!(get_session_by_cookie(db.pool(), &fresh)
        .await
        .unwrap()
        .is_some());
}
