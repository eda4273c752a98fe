use std::path::PathBuf;
use std::time::Duration;

use crate::broker::AmqpConfig;
use crate::cadapter::cdn::DEFAULT_CDN_BASE;
use crate::cadapter::s3::S3Config;
use crate::ingest::{DEFAULT_MAX_UPLOAD_SIZE, IngestConfig};
use crate::utils::cli::{Args, BrokerKind, StorageKind};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BODY_LIMIT: u64 = DEFAULT_MAX_UPLOAD_SIZE;

#[derive(Clone, Debug)]
pub enum StorageConfig {
    Cdn { base_url: String },
    Bucket(S3Config),
    Local { root: PathBuf },
}

#[derive(Clone, Debug)]
pub enum BrokerConfig {
    Amqp {
        amqp: AmqpConfig,
        consumer_urls: Vec<String>,
    },
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_url: String,
    pub storage: StorageConfig,
    pub broker: BrokerConfig,
    pub ingest: IngestConfig,
    pub fetch_timeout: Duration,
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_url: "sqlite::memory:".to_string(),
            storage: StorageConfig::Cdn {
                base_url: DEFAULT_CDN_BASE.to_string(),
            },
            broker: BrokerConfig::Memory,
            ingest: IngestConfig::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT as usize,
        }
    }
}

impl Config {
    /// Checks the command line and collects every problem instead of stopping at the first.
    pub fn from_args(args: &Args) -> Result<Config, Vec<String>> {
        let mut validation_errors = Vec::new();

        if args.fragment_size == 0 {
            validation_errors.push("FRAGMENT_SIZE must be greater than zero".to_string());
        }
        if args.publish_timeout == 0 {
            validation_errors.push("PUBLISH_TIMEOUT must be at least one second".to_string());
        }
        if args.fetch_timeout == 0 {
            validation_errors.push("FETCH_TIMEOUT must be at least one second".to_string());
        }
        // sizes are stored as signed 64-bit integers
        if args.body_limit > i64::MAX as u64 {
            validation_errors.push(format!(
                "BODY_LIMIT `{}` is larger than {}",
                args.body_limit,
                i64::MAX
            ));
        }
        let body_limit = usize::try_from(args.body_limit).unwrap_or_else(|_| {
            validation_errors.push(format!(
                "BODY_LIMIT `{}` does not fit this platform",
                args.body_limit
            ));
            0
        });

        let storage = match args.storage {
            StorageKind::Cdn => {
                if !args.cdn_base_url.starts_with("http") {
                    validation_errors.push(format!(
                        "CDN_BASE_URL `{}` is not an http(s) URL",
                        args.cdn_base_url
                    ));
                }
                StorageConfig::Cdn {
                    base_url: args.cdn_base_url.clone(),
                }
            }
            StorageKind::Bucket => {
                let bucket = args.bucket.clone().unwrap_or_default();
                if bucket.is_empty() {
                    validation_errors
                        .push("BUCKET_NAME is required for bucket storage".to_string());
                }
                StorageConfig::Bucket(S3Config {
                    bucket,
                    prefix: args.bucket_prefix.clone(),
                    region: args.bucket_region.clone(),
                    endpoint: args.bucket_endpoint.clone(),
                    force_path_style: args.bucket_path_style,
                    ..S3Config::default()
                })
            }
            StorageKind::Local => StorageConfig::Local {
                root: PathBuf::from(&args.local_root),
            },
        };

        let broker = match args.broker {
            BrokerKind::Amqp => {
                if args.amqp_url.is_empty() {
                    validation_errors.push("RABBIT_URL cannot be empty".to_string());
                }
                if args.routing_key.is_empty() {
                    validation_errors.push("ROUTING_KEY cannot be empty".to_string());
                }
                for url in &args.consumer_url {
                    if !url.starts_with("http") {
                        validation_errors
                            .push(format!("CONSUMER_URL `{url}` is not an http(s) URL"));
                    }
                }
                BrokerConfig::Amqp {
                    amqp: AmqpConfig {
                        url: args.amqp_url.clone(),
                        queue: args.routing_key.clone(),
                    },
                    consumer_urls: args.consumer_url.clone(),
                }
            }
            BrokerKind::Memory => BrokerConfig::Memory,
        };

        if !validation_errors.is_empty() {
            return Err(validation_errors);
        }

        Ok(Config {
            host: args.host.clone(),
            port: args.port,
            db_url: args.database_url.clone(),
            storage,
            broker,
            ingest: IngestConfig {
                fragment_size: args.fragment_size,
                publish_timeout: Duration::from_secs(args.publish_timeout),
                max_upload_size: args.body_limit,
            },
            fetch_timeout: Duration::from_secs(args.fetch_timeout),
            body_limit,
        })
    }
}
