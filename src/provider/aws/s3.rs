//! S3 evidence storage

use crate::error::{GateError, Result};
use crate::provider::{StorageProvider, Visibility};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;

/// Storage provider backed by an S3 bucket
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    /// Create a provider from an existing client
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create a provider from shared SDK configuration
    pub fn from_config(config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self::new(aws_sdk_s3::Client::new(config), bucket)
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageProvider for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, visibility: Visibility) -> Result<()> {
        let size = body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));

        if visibility == Visibility::PublicRead {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        let output = request.send().await.map_err(|e| GateError::Storage {
            key: key.to_string(),
            reason: format!("bucket {}: {}", self.bucket, DisplayErrorContext(&e)),
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            key,
            size,
            etag = ?output.e_tag(),
            "Object stored"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "s3"
    }
}
