//! S3-compatible object storage target.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::{validate_key, StorageTarget};

pub struct S3Storage {
    client: Client,
    bucket: String,
    /// Key prefix every artifact is stored under.
    root: String,
}

fn remote<E: std::error::Error>(err: E) -> StorageError {
    StorageError::Remote(DisplayErrorContext(err).to_string())
}

impl S3Storage {
    /// Build a client from validated parameters.
    ///
    /// Static credentials are used when `access_key`/`secret_key` are given,
    /// the default provider chain otherwise. A custom `endpoint` switches to
    /// path-style addressing for S3-compatible servers.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let bucket = config.require("bucket")?.to_string();
        let region = config.require("region")?.to_string();
        let endpoint = config.param("endpoint").map(str::to_string);

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if let (Some(access), Some(secret)) = (config.param("access_key"), config.param("secret_key")) {
            loader = loader.credentials_provider(Credentials::new(
                access, secret, None, None, "tenvault",
            ));
        }
        if let Some(url) = &endpoint {
            loader = loader.endpoint_url(url);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(endpoint.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket,
            root: config
                .param("prefix")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
        })
    }

    fn object_key(&self, path: &str) -> Result<String, StorageError> {
        validate_key(path)?;
        if self.root.is_empty() {
            Ok(path.to_string())
        } else {
            Ok(format!("{}/{path}", self.root))
        }
    }

    fn strip_root<'k>(&self, key: &'k str) -> &'k str {
        if self.root.is_empty() {
            key
        } else {
            key.strip_prefix(&self.root)
                .map(|k| k.trim_start_matches('/'))
                .unwrap_or(key)
        }
    }
}

#[async_trait]
impl StorageTarget for S3Storage {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.object_key(path)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    StorageError::NotFound(path.to_string())
                } else {
                    remote(e)
                }
            })?;

        let bytes = output.body.collect().await.map_err(remote)?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn write(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let key = self.object_key(path)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(remote)?;
        tracing::debug!(bucket = %self.bucket, key = %key, "Artifact uploaded");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full_prefix = if self.root.is_empty() {
            prefix.to_string()
        } else {
            format!("{}/{prefix}", self.root)
        };

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(remote)?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .map(|k| self.strip_root(k).to_string()),
            );

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => token = Some(next.to_string()),
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let key = self.object_key(path)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(remote)?;
        Ok(())
    }
}
