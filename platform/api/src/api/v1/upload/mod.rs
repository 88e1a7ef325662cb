use std::sync::Arc;

use bytes::Bytes;
use common::http::ext::{OptionExt, RequestGlobalExt, ResultExt};
use common::http::RouteError;
use common::make_response;
use common::s3::{Bucket, ObjectCannedAcl, PutObjectOptions};
use hyper::{Body, Request, Response, StatusCode};
use multer::{Constraints, SizeLimit};
use routerify::Router;
use serde_json::json;

use self::avatar::AvatarUpload;
use self::camera_image::CameraImageUpload;
use crate::api::auth::AuthData;
use crate::api::error::{ApiError, Result};
use crate::api::ext::RequestExt;
use crate::global::GlobalState;

pub(crate) mod avatar;
pub(crate) mod camera_image;

/// Image formats the upload endpoints accept, keyed by multipart content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum AcceptedFormats {
    Webp,
    Avif,
    Gif,
    Png,
    Apng,
    Jpeg,
    Bmp,
}

impl AcceptedFormats {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/webp" => Some(Self::Webp),
            "image/avif" => Some(Self::Avif),
            "image/gif" => Some(Self::Gif),
            "image/png" => Some(Self::Png),
            "image/apng" => Some(Self::Apng),
            "image/jpeg" => Some(Self::Jpeg),
            "image/bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub const fn ext(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
            Self::Png => "png",
            Self::Apng => "apng",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
        }
    }
}

/// One implementation per upload endpoint: which bucket it writes to, how
/// large the file may be and where the object lands.
trait UploadType {
    fn bucket(global: &Arc<GlobalState>) -> &Bucket;

    fn max_size(global: &Arc<GlobalState>) -> usize;

    fn object_key(auth: &AuthData, format: AcceptedFormats) -> String;
}

async fn handler<U: UploadType>(req: Request<Body>) -> Result<Response<Body>> {
    let global: Arc<GlobalState> = req.get_global()?;

    let auth = req.require_auth().await?;

    let content_type = req
        .headers()
        .get("content-type")
        .map_err_route((StatusCode::BAD_REQUEST, "missing content-type header"))?;
    let content_type = content_type
        .to_str()
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid content-type header"))?;

    let boundary = multer::parse_boundary(content_type)
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid content-type header"))?;

    let constraints = Constraints::new()
        .allowed_fields(vec!["file"])
        .size_limit(SizeLimit::new().for_field("file", U::max_size(&global) as u64));

    let mut multipart = multer::Multipart::with_constraints(req.into_body(), boundary, constraints);

    let mut file: Option<Bytes> = None;
    let mut file_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid multipart body"))?
    {
        let name = field
            .name()
            .map_err_route((StatusCode::BAD_REQUEST, "invalid multipart body"))?
            .to_owned();

        match name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .map_err_route((
                        StatusCode::BAD_REQUEST,
                        "invalid multipart body, missing file content-type",
                    ))?
                    .as_ref()
                    .to_owned();

                file_content_type = Some(content_type);

                let data = field
                    .bytes()
                    .await
                    .map_ignore_err_route((StatusCode::BAD_REQUEST, "invalid multipart body"))?;
                file = Some(data);
            }
            _ => return Err((StatusCode::BAD_REQUEST, "invalid multipart body").into()),
        }
    }

    let file = file.map_err_route((StatusCode::BAD_REQUEST, "missing file field"))?;
    let content_type =
        file_content_type.map_err_route((StatusCode::BAD_REQUEST, "missing file content-type"))?;

    let format = AcceptedFormats::from_content_type(&content_type)
        .map_err_route((StatusCode::BAD_REQUEST, "File must be an image"))?;

    let key = U::object_key(&auth, format);
    let bucket = U::bucket(&global);

    bucket
        .put_object(
            key.as_str(),
            file,
            Some(PutObjectOptions {
                acl: Some(ObjectCannedAcl::PublicRead),
                content_type: Some(content_type),
            }),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = %err, bucket = %bucket.name(), "failed to upload file");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to upload file")
        })?;

    Ok(make_response!(
        StatusCode::OK,
        json!({
            "url": bucket.public_url(&key),
            "path": key,
        })
    ))
}

pub fn routes(_: &Arc<GlobalState>) -> Router<Body, RouteError<ApiError>> {
    Router::builder()
        .post("/camera-image", handler::<CameraImageUpload>)
        .post("/avatar", handler::<AvatarUpload>)
        .build()
        .expect("failed to build router")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_formats() {
        assert_eq!(
            AcceptedFormats::from_content_type("image/jpeg"),
            Some(AcceptedFormats::Jpeg)
        );
        assert_eq!(AcceptedFormats::Jpeg.ext(), "jpg");

        assert_eq!(AcceptedFormats::from_content_type("video/mp4"), None);
        assert_eq!(AcceptedFormats::from_content_type("application/pdf"), None);
        assert_eq!(AcceptedFormats::from_content_type(""), None);
    }
}
