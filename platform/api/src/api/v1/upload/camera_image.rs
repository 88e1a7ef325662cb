use std::sync::Arc;

use common::s3::Bucket;
use uuid::Uuid;

use super::{AcceptedFormats, UploadType};
use crate::api::auth::AuthData;
use crate::global::GlobalState;

pub(crate) struct CameraImageUpload;

impl UploadType for CameraImageUpload {
    fn bucket(global: &Arc<GlobalState>) -> &Bucket {
        &global.camera_images
    }

    fn max_size(global: &Arc<GlobalState>) -> usize {
        global.config.uploads.max_image_size
    }

    /// Every upload gets a fresh object, scoped under the uploader.
    fn object_key(auth: &AuthData, format: AcceptedFormats) -> String {
        format!("{}/{}.{}", auth.user_id, Uuid::new_v4(), format.ext())
    }
}
