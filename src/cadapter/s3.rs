//! Bucket backend: fragments mirrored into an S3-compatible bucket under
//! `{prefix}/{container}/{object}/{sequence}`. Downloads are retried with backoff.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::time::{Duration, sleep};

use crate::cadapter::client::{BackendError, FragmentBackend, fragment_key};
use crate::domain::entry::FragmentRef;
use crate::fragment::{FragmentStream, ReaderFragment};

/// S3 backend options
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Key prefix in front of `{container}/{object}/{sequence}`
    pub prefix: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, GCS interop, ...)
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: "attachments".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            force_path_style: false,
            max_retries: 3,
            initial_retry_delay_ms: 100,
        }
    }
}

pub struct S3Backend {
    client: Client,
    config: S3Config,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Result<Self, BackendError> {
        if config.bucket.is_empty() {
            return Err("bucket backend requires a bucket name".into());
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(
                aws_config::environment::EnvironmentVariableCredentialsProvider::new(),
            )
            .region(aws_sdk_s3::config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let conf = loader.load().await;
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_conf),
            config,
        })
    }

    pub fn object_key(&self, fragment: &FragmentRef) -> String {
        object_key(&self.config.prefix, fragment)
    }
}

fn object_key(prefix: &str, fragment: &FragmentRef) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        fragment_key(fragment)
    } else {
        format!("{prefix}/{}", fragment_key(fragment))
    }
}

#[async_trait]
impl FragmentBackend for S3Backend {
    fn name(&self) -> &'static str {
        "bucket"
    }

    fn locate(&self, fragment: &FragmentRef) -> String {
        format!("s3://{}/{}", self.config.bucket, self.object_key(fragment))
    }

    async fn open_fragment(
        &self,
        fragment: &FragmentRef,
    ) -> Result<Box<dyn FragmentStream>, BackendError> {
        let key = self.object_key(fragment);
        let mut attempt = 0;
        let resp = loop {
            attempt += 1;
            match self
                .client
                .get_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(resp) => break resp,
                Err(e) if attempt <= self.config.max_retries => {
                    tracing::debug!("get_object {key} failed (attempt {attempt}): {e}");
                    let delay_ms = self.config.initial_retry_delay_ms * 2u64.pow(attempt - 1);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(Box::new(e)),
            }
        };

        Ok(Box::new(ReaderFragment::new(
            key,
            resp.body.into_async_read(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        let fragment = FragmentRef::new(4, "111", "222", 0);
        assert_eq!(object_key("attachments", &fragment), "attachments/111/222/4");
        assert_eq!(object_key("/attachments/", &fragment), "attachments/111/222/4");
        assert_eq!(object_key("", &fragment), "111/222/4");
    }

    #[tokio::test]
    async fn test_new_requires_bucket() {
        assert!(S3Backend::new(S3Config::default()).await.is_err());
    }
}
