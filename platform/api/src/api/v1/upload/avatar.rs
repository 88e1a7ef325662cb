use std::sync::Arc;

use common::s3::Bucket;

use super::{AcceptedFormats, UploadType};
use crate::api::auth::AuthData;
use crate::global::GlobalState;

pub(crate) struct AvatarUpload;

impl UploadType for AvatarUpload {
    fn bucket(global: &Arc<GlobalState>) -> &Bucket {
        &global.user_avatars
    }

    fn max_size(global: &Arc<GlobalState>) -> usize {
        global.config.uploads.max_avatar_size
    }

    /// One avatar per user, re-uploading overwrites it.
    fn object_key(auth: &AuthData, format: AcceptedFormats) -> String {
        format!("{}/avatar.{}", auth.user_id, format.ext())
    }
}
