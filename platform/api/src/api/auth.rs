use common::http::RouteError;
use hyper::StatusCode;

use super::error::ApiError;
use super::jwt::IdentityToken;

#[derive(thiserror::Error, Debug, Clone)]
pub enum AuthError {
    #[error("token must be ascii only")]
    HeaderToStr,
    #[error("token must be a bearer token")]
    NotBearerToken,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid token")]
    InvalidToken,
}

impl From<AuthError> for RouteError<ApiError> {
    fn from(value: AuthError) -> Self {
        RouteError::from(match &value {
            AuthError::HeaderToStr => (StatusCode::UNAUTHORIZED, "token must be ascii only"),
            AuthError::NotBearerToken => (StatusCode::UNAUTHORIZED, "token must be a bearer token"),
            AuthError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "not logged in"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid token"),
        })
        .with_source(Some(ApiError::Auth(value)))
    }
}

/// The verified identity attached to a request by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthData {
    /// The identity provider's user id, also the `users` primary key.
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<IdentityToken> for AuthData {
    fn from(token: IdentityToken) -> Self {
        Self {
            user_id: token.subject,
            email: token.email,
            name: token.name,
        }
    }
}
