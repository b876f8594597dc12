// Banner image storage on S3-compatible buckets.

use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::config::S3Config;
use crate::error::ApiError;

#[derive(Clone)]
pub struct Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl Storage {
    pub async fn from_config(cfg: &S3Config) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);

        // MinIO and friends need path-style addressing
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.clone(),
        }
    }

    /// Uploads and returns the public URL of the object.
    pub async fn put_public(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("s3 put_object failed: {e}")))?;

        Ok(build_public_url(&self.public_base_url, &self.bucket, key))
    }
}

pub fn build_public_url(base: &str, bucket: &str, key: &str) -> String {
    let trimmed = base.trim_end_matches('/');

    // https://host/{bucket}/{key} style templates
    if trimmed.contains("{bucket}") || trimmed.contains("{key}") {
        return trimmed.replace("{bucket}", bucket).replace("{key}", key);
    }

    if trimmed.contains(bucket) {
        format!("{}/{}", trimmed, key)
    } else {
        format!("{}/{}/{}", trimmed, bucket, key)
    }
}

/// Extension for the accepted banner image types.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
