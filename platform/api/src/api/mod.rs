use std::sync::Arc;

use anyhow::Result;
use common::make_response;
use hyper::{Body, Request, Response, Server, StatusCode};
use routerify::{Router, RouterService};
use serde_json::json;

use self::error::ApiError;
use crate::global::GlobalState;

pub mod auth;
pub mod error;
pub mod ext;
pub mod jwt;
pub mod middleware;
pub mod request_context;
pub mod v1;

use common::http::RouteError;

async fn root(_: Request<Body>) -> error::Result<Response<Body>> {
    Ok(make_response!(
        StatusCode::OK,
        json!({
            "message": "Welcome to RetroLens API",
            "version": env!("CARGO_PKG_VERSION"),
        })
    ))
}

async fn health(_: Request<Body>) -> error::Result<Response<Body>> {
    Ok(make_response!(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })
    ))
}

async fn not_found(_: Request<Body>) -> error::Result<Response<Body>> {
    Ok(make_response!(
        StatusCode::NOT_FOUND,
        json!({
            "detail": "Resource not found",
        })
    ))
}

pub fn routes(global: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    let weak = Arc::downgrade(global);
    Router::builder()
        .data(weak)
        // The auth middleware checks the Authorization header, and if it's valid, it stores the
        // identity in the request context. This way we can access the identity in the handlers.
        // A missing header does not fail the request.
        .middleware(middleware::auth::auth_middleware(global))
        // The CORS middleware adds the CORS headers to the response
        .middleware(middleware::cors::cors_middleware(global))
        .get("/", root)
        .get("/health", health)
        .scope("/api/v1", v1::routes(global))
        .any(not_found)
        .err_handler_with_info(common::http::error_handler::<ApiError>)
        .build()
        .expect("failed to build router")
}

pub async fn run(global: Arc<GlobalState>) -> Result<()> {
    let addr = global.config.api.bind_address;

    tracing::info!("listening on {}", addr);

    // The router holds a Weak reference to the global state, so open
    // keep-alive connections do not keep the process alive past shutdown.
    let service = RouterService::new(routes(&global))
        .map_err(|err| anyhow::anyhow!("failed to build router service: {err}"))?;

    let server = Server::try_bind(&addr)?.serve(service);

    let ctx = global.ctx.clone();
    drop(global);

    server
        .with_graceful_shutdown(async move { ctx.done().await })
        .await?;

    Ok(())
}
