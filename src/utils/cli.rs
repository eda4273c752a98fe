use clap::{Parser, ValueEnum};

use crate::cadapter::cdn::DEFAULT_CDN_BASE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Public CDN attachments
    Cdn,
    /// S3-compatible bucket mirror
    Bucket,
    /// Local directory
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BrokerKind {
    Amqp,
    /// Keep fragments in process memory (development only)
    Memory,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listening host
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Metadata database
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://fragfs.db?mode=rwc")]
    pub database_url: String,

    /// Where fragments are read from
    #[arg(short, long, env = "STORAGE", value_enum, default_value_t = StorageKind::Cdn)]
    pub storage: StorageKind,

    /// Base URL of the attachment CDN
    #[arg(long, env = "CDN_BASE_URL", default_value = DEFAULT_CDN_BASE)]
    pub cdn_base_url: String,

    /// Bucket holding mirrored fragments (bucket storage)
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket: Option<String>,

    /// Key prefix of mirrored fragments
    #[arg(long, env = "BUCKET_PREFIX", default_value = "attachments")]
    pub bucket_prefix: String,

    #[arg(long, env = "BUCKET_REGION", default_value = "us-east-1")]
    pub bucket_region: String,

    /// Custom endpoint for S3-compatible stores
    #[arg(long, env = "BUCKET_ENDPOINT")]
    pub bucket_endpoint: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "BUCKET_PATH_STYLE", default_value_t = false)]
    pub bucket_path_style: bool,

    /// Fragment directory (local storage)
    #[arg(long, env = "LOCAL_STORAGE_ROOT", default_value = "./fragments")]
    pub local_root: String,

    /// Where fragments are published to
    #[arg(long, env = "BROKER", value_enum, default_value_t = BrokerKind::Amqp)]
    pub broker: BrokerKind,

    #[arg(long, env = "RABBIT_URL", default_value = "amqp://127.0.0.1:5672/%2f")]
    pub amqp_url: String,

    /// Queue the fragments are routed to
    #[arg(long, env = "ROUTING_KEY", default_value = "fragments")]
    pub routing_key: String,

    /// Consumer wake-up URLs, comma separated
    #[arg(long, env = "CONSUMER_URL", value_delimiter = ',')]
    pub consumer_url: Vec<String>,

    /// Fragment size in bytes
    #[arg(long, env = "FRAGMENT_SIZE", default_value_t = 25 * 1024 * 1024)]
    pub fragment_size: u64,

    /// Publish timeout in seconds
    #[arg(long, env = "PUBLISH_TIMEOUT", default_value_t = 5)]
    pub publish_timeout: u64,

    /// Fragment fetch timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = 30)]
    pub fetch_timeout: u64,

    /// Maximum request body in bytes
    #[arg(long, env = "BODY_LIMIT", default_value_t = 5 * 1024 * 1024 * 1024)]
    pub body_limit: u64,
}
