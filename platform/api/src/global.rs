use std::sync::Arc;

use common::context::Context;
use common::s3::Bucket;

use crate::config::AppConfig;

pub struct GlobalState {
    pub config: AppConfig,
    pub db: Arc<sqlx::PgPool>,
    pub ctx: Context,

    pub camera_images: Bucket,
    pub user_avatars: Bucket,
}

impl GlobalState {
    pub fn new(config: AppConfig, db: Arc<sqlx::PgPool>, ctx: Context) -> Self {
        Self {
            camera_images: config.buckets.camera_images.setup(),
            user_avatars: config.buckets.user_avatars.setup(),
            config,
            db,
            ctx,
        }
    }
}
