use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;

pub use aws_sdk_s3::types::ObjectCannedAcl;

#[cfg(feature = "config")]
use crate::config::S3BucketConfig;
#[cfg(feature = "config")]
use crate::config::S3CredentialsConfig;

/// A bucket on any S3-compatible storage service.
#[derive(Debug, Clone)]
pub struct Bucket {
    name: String,
    public_base: String,
    client: aws_sdk_s3::Client,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectOptions {
    pub acl: Option<ObjectCannedAcl>,
    pub content_type: Option<String>,
}

#[cfg(feature = "config")]
impl From<S3CredentialsConfig> for Credentials {
    fn from(value: S3CredentialsConfig) -> Self {
        Self::from_keys(
            value.access_key.unwrap_or_default(),
            value.secret_key.unwrap_or_default(),
            None,
        )
    }
}

#[cfg(feature = "config")]
impl S3BucketConfig {
    pub fn setup(&self) -> Bucket {
        Bucket::new(
            self.name.clone(),
            self.credentials.clone().into(),
            Region::new(self.region.clone()),
            self.endpoint.clone(),
            self.public_base.clone(),
        )
    }
}

impl Bucket {
    pub fn new(
        name: String,
        credentials: Credentials,
        region: Region,
        endpoint: Option<String>,
        public_base: Option<String>,
    ) -> Self {
        let public_base = public_base
            .or_else(|| endpoint.as_ref().map(|e| format!("{}/{}", e.trim_end_matches('/'), name)))
            .unwrap_or_else(|| format!("https://{}.s3.{}.amazonaws.com", name, region));

        let config = if let Some(endpoint) = endpoint {
            aws_sdk_s3::config::Builder::new().endpoint_url(endpoint)
        } else {
            aws_sdk_s3::config::Builder::new()
        }
        .region(region)
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

        let client = aws_sdk_s3::Client::from_conf(config);

        Self {
            name,
            public_base,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URL the object at `key` is publicly served from.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), key)
    }

    /// The object key for a public URL previously produced by
    /// [`Bucket::public_url`], if it belongs to this bucket.
    pub fn key_for_public_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base.trim_end_matches('/'))
            .map(|key| key.trim_start_matches('/'))
            .filter(|key| !key.is_empty())
    }

    pub async fn put_object(
        &self,
        key: impl Into<String>,
        body: impl Into<ByteStream>,
        options: Option<PutObjectOptions>,
    ) -> Result<(), SdkError<PutObjectError>> {
        let options = options.unwrap_or_default();

        self.client
            .put_object()
            .bucket(self.name())
            .key(key)
            .body(body.into())
            .set_acl(options.acl)
            .set_content_type(options.content_type)
            .send()
            .await?;

        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), SdkError<DeleteObjectError>> {
        self.client
            .delete_object()
            .bucket(self.name())
            .key(key)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(all(test, feature = "config"))]
mod tests {
    use super::*;

    fn bucket(public_base: Option<&str>) -> Bucket {
        S3BucketConfig {
            name: "camera-images".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://localhost:9000".into()),
            public_base: public_base.map(Into::into),
            credentials: S3CredentialsConfig::default(),
        }
        .setup()
    }

    #[test]
    fn test_public_url_from_endpoint() {
        let bucket = bucket(None);
        assert_eq!(
            bucket.public_url("u_1/photo.jpg"),
            "http://localhost:9000/camera-images/u_1/photo.jpg"
        );
    }

    #[test]
    fn test_public_url_from_base() {
        let bucket = bucket(Some("https://cdn.retrolens.app/cameras/"));
        assert_eq!(
            bucket.public_url("u_1/photo.jpg"),
            "https://cdn.retrolens.app/cameras/u_1/photo.jpg"
        );
    }

    #[test]
    fn test_key_for_public_url() {
        let bucket = bucket(None);
        let url = bucket.public_url("u_1/photo.jpg");
        assert_eq!(bucket.key_for_public_url(&url), Some("u_1/photo.jpg"));
        assert_eq!(bucket.key_for_public_url("https://elsewhere.example/x"), None);
        assert_eq!(bucket.key_for_public_url(&bucket.public_url("")), None);
    }
}
