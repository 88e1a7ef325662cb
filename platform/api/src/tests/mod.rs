use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::context::{Context, Handler};
use hyper::{Body, Client, Request, StatusCode};
use serde_json::{json, Value};
use serial_test::serial;

use crate::api;
use crate::api::jwt::IdentityToken;
use crate::config::AppConfig;
use crate::global::GlobalState;

/// Boots the real API server on a free port.
///
/// The database pool is lazy, so everything that does not touch Postgres is
/// exercisable without one.
struct TestServer {
    global: Arc<GlobalState>,
    handler: Handler,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    base: String,
}

impl TestServer {
    async fn start() -> Self {
        let port = portpicker::pick_unused_port().expect("no free port");

        let mut config = AppConfig::default();
        config.api.bind_address = format!("127.0.0.1:{port}").parse().unwrap();

        common::logging::init(&config.logging.level, config.logging.mode)
            .expect("failed to initialize logging");

        let db = Arc::new(
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy(&config.database.uri)
                .expect("failed to build lazy pool"),
        );

        let (ctx, handler) = Context::new();
        let global = Arc::new(GlobalState::new(config, db, ctx));

        let handle = tokio::spawn(api::run(global.clone()));

        // We need to wait for the server to start
        tokio::time::sleep(Duration::from_millis(300)).await;

        Self {
            base: format!("http://127.0.0.1:{port}"),
            global,
            handler,
            handle,
        }
    }

    fn token(&self, subject: &str) -> String {
        IdentityToken {
            subject: subject.to_string(),
            email: Some(format!("{subject}@example.com")),
            name: Some("Test User".to_string()),
            issued_at: Some(Utc::now()),
            expiration: Some(Utc::now() + chrono::Duration::hours(1)),
        }
        .sign(&self.global.config.jwt)
        .expect("failed to sign token")
    }

    async fn shutdown(self) {
        let Self {
            global,
            handler,
            handle,
            ..
        } = self;

        drop(global);

        tokio::time::timeout(Duration::from_secs(1), handler.cancel())
            .await
            .expect("failed to cancel context");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("failed to stop api")
            .expect("api panicked")
            .expect("api failed");
    }
}

async fn body_json(resp: hyper::Response<Body>) -> Value {
    let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&body).expect("response is not json")
}

#[tokio::test]
#[serial]
async fn test_health_and_root() {
    let server = TestServer::start().await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/health", server.base).parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );

    let body = body_json(resp).await;
    assert_eq!(body["status"], "healthy");

    let resp = client
        .get(format!("{}/", server.base).parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["message"], "Welcome to RetroLens API");

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_unknown_route_is_json_404() {
    let server = TestServer::start().await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/api/v1/nonsense", server.base).parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = body_json(resp).await;
    assert_eq!(body, json!({ "detail": "Resource not found" }));

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_cors_headers() {
    let server = TestServer::start().await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/health", server.base).parse().unwrap())
        .await
        .unwrap();

    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(
        resp.headers().get("access-control-allow-headers").unwrap(),
        "Content-Type, Authorization"
    );

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_auth_required() {
    let server = TestServer::start().await;
    let client = Client::new();

    // No token at all
    let resp = client
        .get(format!("{}/api/v1/auth/me", server.base).parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({ "detail": "not logged in" }));

    // Not a bearer token
    let req = Request::builder()
        .uri(format!("{}/api/v1/auth/me", server.base))
        .header("authorization", "Basic abc")
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(resp).await,
        json!({ "detail": "token must be a bearer token" })
    );

    // A bearer token that does not verify
    let req = Request::builder()
        .uri(format!("{}/api/v1/auth/me", server.base))
        .header("authorization", "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({ "detail": "invalid token" }));

    // Mutating endpoints refuse anonymous traffic before anything else
    let req = Request::builder()
        .method("POST")
        .uri(format!("{}/api/v1/likes", server.base))
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_auth_me_with_valid_token() {
    let server = TestServer::start().await;
    let client = Client::new();

    let req = Request::builder()
        .uri(format!("{}/api/v1/auth/me", server.base))
        .header("authorization", format!("Bearer {}", server.token("user_42")))
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["user_id"], "user_42");
    assert_eq!(body["email"], "user_42@example.com");
    assert_eq!(body["authenticated"], true);

    let req = Request::builder()
        .uri(format!("{}/api/v1/auth/verify-token", server.base))
        .header("authorization", format!("Bearer {}", server.token("user_42")))
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({ "valid": true, "user_id": "user_42" })
    );

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_anonymous_feed_is_empty() {
    let server = TestServer::start().await;
    let client = Client::new();

    let resp = client
        .get(
            format!("{}/api/v1/discussions/feed", server.base)
                .parse()
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!([]));

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_like_target_validation() {
    let server = TestServer::start().await;
    let client = Client::new();

    // No target
    let resp = client
        .get(format!("{}/api/v1/likes/count", server.base).parse().unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // More than one target
    let uri = format!(
        "{}/api/v1/likes/count?discussion_id={}&camera_id={}",
        server.base,
        uuid::Uuid::new_v4(),
        uuid::Uuid::new_v4()
    );
    let resp = client.get(uri.parse().unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = body_json(resp).await;
    assert_eq!(
        body["detail"],
        "Exactly one of discussion_id, camera_id, or comment_id must be provided"
    );

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_self_follow_is_rejected() {
    let server = TestServer::start().await;
    let client = Client::new();

    let req = Request::builder()
        .method("POST")
        .uri(format!(
            "{}/api/v1/follows?follower_id=user_1&following_id=user_1",
            server.base
        ))
        .body(Body::empty())
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        json!({ "detail": "Cannot follow yourself" })
    );

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_upload_requires_multipart() {
    let server = TestServer::start().await;
    let client = Client::new();

    let req = Request::builder()
        .method("POST")
        .uri(format!("{}/api/v1/upload/camera-image", server.base))
        .header("authorization", format!("Bearer {}", server.token("user_42")))
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = client.request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        json!({ "detail": "invalid content-type header" })
    );

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_invalid_uuid_params_are_rejected() {
    let server = TestServer::start().await;
    let client = Client::new();

    let resp = client
        .get(
            format!("{}/api/v1/cameras/not-a-uuid", server.base)
                .parse()
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "detail": "invalid camera id" }));

    drop(client);
    server.shutdown().await;
}
