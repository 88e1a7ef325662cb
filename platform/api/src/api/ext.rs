use std::collections::HashMap;

use common::http::ext::ResultExt;
use common::make_response;
use hyper::{Body, Request, Response, StatusCode};
use routerify::prelude::RequestExt as _;

use super::auth::{AuthData, AuthError};
use super::error::Result;
use super::request_context::RequestContext;

/// Auth access for handlers. The companion middleware installs a
/// [`RequestContext`] on every request, so these never fail to find one.
#[async_trait::async_trait]
pub trait RequestExt {
    /// The authenticated identity, if a valid token was presented.
    async fn auth(&self) -> Option<AuthData>;

    /// The authenticated identity, or a 401.
    async fn require_auth(&self) -> Result<AuthData>;
}

#[async_trait::async_trait]
impl RequestExt for Request<Body> {
    async fn auth(&self) -> Option<AuthData> {
        let context = self.context::<RequestContext>()?;
        context.auth().await
    }

    async fn require_auth(&self) -> Result<AuthData> {
        self.auth().await.ok_or_else(|| AuthError::NotLoggedIn.into())
    }
}

/// Reads and deserializes a JSON request body.
pub async fn parse_json_body<T: serde::de::DeserializeOwned>(req: Request<Body>) -> Result<T> {
    let body = hyper::body::to_bytes(req.into_body())
        .await
        .map_err_route((StatusCode::BAD_REQUEST, "failed to read request body"))?;

    if body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "body has no data").into());
    }

    serde_json::from_slice(&body).map_err_route((StatusCode::BAD_REQUEST, "body is not valid json"))
}

/// Serializes a value into a JSON response.
pub fn json_response<T: serde::Serialize + ?Sized>(
    status: StatusCode,
    value: &T,
) -> Result<Response<Body>> {
    let body = serde_json::to_string(value).map_err_route((
        StatusCode::INTERNAL_SERVER_ERROR,
        "failed to serialize response",
    ))?;

    Ok(make_response!(status, body))
}

/// Single-valued query parameters. Repeated keys keep the last value.
pub fn query_params(req: &Request<Body>) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Every value of a repeated query parameter, e.g. `user_ids=a&user_ids=b`.
pub fn query_param_values(req: &Request<Body>, name: &str) -> Vec<String> {
    req.uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// `limit`/`offset` pagination, capped the way the listing endpoints cap it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let limit = params
            .get("limit")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);

        let offset = params
            .get("offset")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);

        Self { limit, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pagination_defaults() {
        let page = Pagination::from_query(&params(&[]));
        assert_eq!(page, Pagination { limit: 20, offset: 0 });
    }

    #[test]
    fn test_pagination_caps() {
        let page = Pagination::from_query(&params(&[("limit", "1000"), ("offset", "-5")]));
        assert_eq!(page, Pagination { limit: 100, offset: 0 });

        let page = Pagination::from_query(&params(&[("limit", "0")]));
        assert_eq!(page.limit, 1);

        let page = Pagination::from_query(&params(&[("limit", "banana"), ("offset", "30")]));
        assert_eq!(page, Pagination { limit: 20, offset: 30 });
    }
}
