use std::sync::Arc;
use std::time::Duration;

use sqlx::{Pool, Sqlite};
use tokio_util::sync::CancellationToken;

use crate::broker::{AmqpBroker, Broker, ConsumerNotifier, MemoryBroker};
use crate::cadapter::cdn::CdnBackend;
use crate::cadapter::localfs::LocalFsBackend;
use crate::cadapter::s3::S3Backend;
use crate::cadapter::{FragmentBackend, FragmentClient};
use crate::config::{BrokerConfig, Config, StorageConfig};
use crate::domain::entry::{EntryRepository, SqliteEntryRepository};
use crate::ingest::Ingestor;
use crate::vfs::Vfs;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntryRepository>,
    pub broker: Arc<dyn Broker>,
    pub ingestor: Ingestor,
    pub vfs: Vfs,
    pub config: Arc<Config>,
    /// Cancelled on shutdown; uploads in flight stop before their next fragment.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn EntryRepository>,
        broker: Arc<dyn Broker>,
        backend: Arc<dyn FragmentBackend>,
    ) -> Self {
        let ingestor = Ingestor::new(store.clone(), broker.clone(), config.ingest.clone());
        let vfs = Vfs::new(store.clone(), FragmentClient::new(backend, config.fetch_timeout));
        AppState {
            store,
            broker,
            ingestor,
            vfs,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Wires the collaborators named in `config` around the SQLite metadata store.
    pub async fn from_config(config: Config, pool: Arc<Pool<Sqlite>>) -> anyhow::Result<Self> {
        let repository = SqliteEntryRepository::new(pool);
        repository.migrate().await?;
        let store: Arc<dyn EntryRepository> = Arc::new(repository);

        let backend: Arc<dyn FragmentBackend> = match &config.storage {
            StorageConfig::Cdn { base_url } => Arc::new(
                CdnBackend::new(base_url.clone(), config.fetch_timeout)
                    .map_err(|e| anyhow::anyhow!("failed to build CDN client: {e}"))?,
            ),
            StorageConfig::Bucket(s3) => Arc::new(
                S3Backend::new(s3.clone())
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to build bucket client: {e}"))?,
            ),
            StorageConfig::Local { root } => {
                tokio::fs::create_dir_all(root).await?;
                Arc::new(LocalFsBackend::new(root))
            }
        };

        let broker: Arc<dyn Broker> = match &config.broker {
            BrokerConfig::Amqp {
                amqp,
                consumer_urls,
            } => {
                let notifier = ConsumerNotifier::new(consumer_urls.clone(), NOTIFY_TIMEOUT)
                    .map_err(|e| anyhow::anyhow!("failed to build consumer notifier: {e}"))?;
                Arc::new(
                    AmqpBroker::connect(amqp.clone(), notifier)
                        .await
                        .map_err(|e| anyhow::anyhow!("failed to connect to AMQP broker: {e}"))?,
                )
            }
            BrokerConfig::Memory => {
                tracing::warn!("using the in-memory broker, fragments will not leave this process");
                Arc::new(MemoryBroker::new())
            }
        };

        tracing::info!("reading fragments from the {} backend", backend.name());
        Ok(Self::new(config, store, broker, backend))
    }

    /// Stops uploads still in flight and closes the broker connection.
    pub async fn close(&self) {
        self.shutdown.cancel();
        if let Err(e) = self.broker.close().await {
            tracing::error!("failed to close the broker: {e}");
        }
    }
}
