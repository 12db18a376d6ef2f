//! S3-compatible [`BlobStore`].

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::{BlobStore, PresignedUpload, StorageError};
use crate::config::StorageConfig;

/// Object keys keep `/` as a separator; everything else outside RFC 3986
/// unreserved characters is encoded.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    /// Prefix that object keys are appended to
    base_url: String,
}

impl S3BlobStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS provider chain applies.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "beam-analytics",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        let bucket = config.bucket.clone().unwrap_or_default();
        let base_url = object_base_url(config, &bucket);

        Self {
            client: Client::from_conf(s3_config),
            bucket,
            base_url,
        }
    }

    /// Create the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let exists = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .is_ok();
        if !exists {
            self.client
                .create_bucket()
                .bucket(self.bucket.as_str())
                .send()
                .await
                .map_err(|err| StorageError::Backend(format!("create bucket failed: {err}")))?;
            tracing::info!(bucket = %self.bucket, "Created storage bucket");
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(path)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| StorageError::Backend(format!("put object failed: {err}")))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(self.bucket.as_str())
            .key(path)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key())
                {
                    StorageError::NotFound(path.to_string())
                } else {
                    StorageError::Backend(format!("get object failed: {err}"))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| StorageError::Backend(format!("read object failed: {err}")))?;
        Ok(body.into_bytes())
    }

    async fn presign_upload(
        &self,
        path: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|err| StorageError::Presign(format!("presign config failed: {err}")))?;

        let presigned = self
            .client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|err| StorageError::Backend(format!("presign failed: {err}")))?;

        let upload_url = presigned.uri().to_string();
        let blob_url = upload_url
            .split_once('?')
            .map(|(base, _)| base.to_string())
            .unwrap_or_else(|| upload_url.clone());

        Ok(PresignedUpload {
            upload_url,
            blob_url,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            utf8_percent_encode(path, KEY_ENCODE_SET)
        )
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

fn object_base_url(config: &StorageConfig, bucket: &str) -> String {
    match &config.endpoint {
        Some(endpoint) if config.force_path_style => {
            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
        }
        Some(endpoint) => match endpoint.split_once("://") {
            Some((scheme, host)) => {
                format!("{scheme}://{bucket}.{}", host.trim_end_matches('/'))
            }
            None => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        },
        None => format!("https://{bucket}.s3.{}.amazonaws.com", config.region),
    }
}
