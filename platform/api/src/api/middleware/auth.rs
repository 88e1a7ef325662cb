use std::sync::Arc;

use common::http::ext::RequestGlobalExt;
use common::http::RouteError;
use hyper::http::header;
use hyper::Body;
use routerify::prelude::RequestExt as _;
use routerify::Middleware;

use crate::api::auth::{AuthData, AuthError};
use crate::api::error::ApiError;
use crate::api::jwt::IdentityToken;
use crate::api::request_context::RequestContext;
use crate::global::GlobalState;

/// Installs a [`RequestContext`] on every request and resolves the bearer
/// token into it when one is presented. A missing token leaves the request
/// anonymous, a present-but-invalid token fails the request.
pub fn auth_middleware(_: &Arc<GlobalState>) -> Middleware<Body, RouteError<ApiError>> {
    Middleware::pre(|req| async move {
        let context = RequestContext::default();
        req.set_context(context.clone());

        let Some(token) = req.headers().get(header::AUTHORIZATION) else {
            return Ok(req);
        };

        let global: Arc<GlobalState> = req.get_global()?;

        let token = token
            .to_str()
            .map_err(|_| AuthError::HeaderToStr)?
            .strip_prefix("Bearer ")
            .ok_or(AuthError::NotBearerToken)?;

        let identity =
            IdentityToken::verify(&global.config.jwt, token).ok_or(AuthError::InvalidToken)?;

        context.set_auth(AuthData::from(identity)).await;

        Ok(req)
    })
}
