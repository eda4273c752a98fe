//! Ingest pipeline: splits an upload into fixed-size chunks and hands them to
//! the broker in order. The pipeline's job ends once every chunk is queued; the
//! external consumer stores the fragments and fills in the metadata afterwards.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, FragmentMessage};
use crate::domain::entry::{EntryRepository, FileEntry};
use crate::error::AppError;
use crate::namespace::require_directory;
use crate::utils::naming::resolve_unique_name;
use crate::utils::paths::normalize_path;
use crate::utils::size::{GIB, MIB};
use crate::utils::validation::is_valid_path;

pub const DEFAULT_FRAGMENT_SIZE: u64 = 25 * MIB;
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * GIB;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub fragment_size: u64,
    pub publish_timeout: Duration,
    /// Largest declared size accepted; one chunk is published per `fragment_size`
    /// of it whether or not the content is actually there.
    pub max_upload_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub target_path: String,
    pub declared_name: String,
    pub declared_size: u64,
}

/// Number of chunks for a file of `size` bytes. Never zero: an empty file is
/// still sent as one empty chunk.
pub fn total_fragments(size: u64, fragment_size: u64) -> u64 {
    size.div_ceil(fragment_size.max(1)).max(1)
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn EntryRepository>,
    broker: Arc<dyn Broker>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(store: Arc<dyn EntryRepository>, broker: Arc<dyn Broker>, config: IngestConfig) -> Self {
        Self {
            store,
            broker,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Registers the file and queues its chunks. Returns the new file id.
    ///
    /// Nothing is rolled back on failure: the metadata row and every chunk queued
    /// before the failure stay in place.
    #[tracing::instrument(
        skip(self, content, cancel),
        fields(path = %request.target_path, name = %request.declared_name, size = request.declared_size)
    )]
    pub async fn upload<R>(
        &self,
        request: UploadRequest,
        mut content: R,
        cancel: &CancellationToken,
    ) -> Result<String, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if !is_valid_path(&request.target_path) {
            return Err(AppError::InvalidPath(request.target_path));
        }
        if request.declared_size > self.config.max_upload_size {
            return Err(AppError::BadRequest(format!(
                "declared size {} exceeds the upload limit of {} bytes",
                request.declared_size, self.config.max_upload_size
            )));
        }
        let path = normalize_path(&request.target_path);
        require_directory(self.store.as_ref(), &path).await?;
        let name = resolve_unique_name(self.store.as_ref(), &path, &request.declared_name).await?;

        let fragment_size = self.config.fragment_size.max(1);
        let total = total_fragments(request.declared_size, fragment_size);
        let entry = FileEntry::new_file(name, path, request.declared_size, total);
        let file_id = self
            .store
            .create_entry(entry)
            .await
            .map_err(|e| AppError::MetadataWriteFailed(e.to_string()))?;
        tracing::info!("registered file {file_id} with {total} fragments");

        let broker = self.broker.clone();
        tokio::spawn(async move {
            broker.notify_consumers().await;
        });

        let mut remaining = request.declared_size;
        for sequence in 1..=total {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled(format!(
                    "upload of {file_id} stopped before fragment {sequence}"
                )));
            }

            let want = remaining.min(fragment_size);
            let mut buf = Vec::with_capacity(want as usize);
            (&mut content).take(want).read_to_end(&mut buf).await?;
            if (buf.len() as u64) < want {
                tracing::warn!(
                    "content of {file_id} ended early: fragment {sequence} has {} of {want} bytes",
                    buf.len()
                );
            }
            remaining = remaining.saturating_sub(want);

            let message = FragmentMessage::new(file_id.clone(), sequence, Bytes::from(buf));
            self.publish(message, cancel).await?;
        }

        let mut trailing = [0u8; 1];
        match content.read(&mut trailing).await {
            Ok(0) => {}
            Ok(_) => tracing::warn!(
                "content of {file_id} is longer than the declared size, trailing bytes ignored"
            ),
            Err(e) => tracing::warn!("failed to check {file_id} for trailing content: {e}"),
        }

        tracing::info!("queued all {total} fragments of {file_id}");
        Ok(file_id)
    }

    async fn publish(&self, message: FragmentMessage, cancel: &CancellationToken) -> Result<(), AppError> {
        let file_id = message.file_id.clone();
        let sequence = message.sequence;

        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AppError::Cancelled(format!(
                    "upload of {file_id} stopped while publishing fragment {sequence}"
                )));
            }
            res = tokio::time::timeout(self.config.publish_timeout, self.broker.publish(message)) => res,
        };

        match published {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::EnqueueFailed {
                file_id,
                sequence,
                reason: e.to_string(),
            }),
            Err(_) => Err(AppError::Timeout(format!(
                "publishing fragment {sequence} of {file_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerError, MemoryBroker};
    use crate::domain::entry::InMemoryEntryRepository;
    use async_trait::async_trait;

    async fn store_with_root() -> Arc<InMemoryEntryRepository> {
        let store = Arc::new(InMemoryEntryRepository::new());
        store.create_entry(FileEntry::new_root()).await.unwrap();
        store
    }

    fn config(fragment_size: u64, publish_timeout: Duration) -> IngestConfig {
        IngestConfig {
            fragment_size,
            publish_timeout,
            ..IngestConfig::default()
        }
    }

    async fn setup(broker: Arc<dyn Broker>, fragment_size: u64) -> (Arc<InMemoryEntryRepository>, Ingestor) {
        let store = store_with_root().await;
        let config = config(fragment_size, Duration::from_secs(5));
        (store.clone(), Ingestor::new(store, broker, config))
    }

    fn request(path: &str, name: &str, size: u64) -> UploadRequest {
        UploadRequest {
            target_path: path.to_string(),
            declared_name: name.to_string(),
            declared_size: size,
        }
    }

    struct StalledBroker;

    #[async_trait]
    impl Broker for StalledBroker {
        async fn publish(&self, _message: FragmentMessage) -> Result<(), BrokerError> {
            futures::future::pending().await
        }

        async fn notify_consumers(&self) {}
    }

    #[test]
    fn test_total_fragments() {
        assert_eq!(total_fragments(0, 8), 1);
        assert_eq!(total_fragments(1, 8), 1);
        assert_eq!(total_fragments(8, 8), 1);
        assert_eq!(total_fragments(17, 8), 3);
        assert_eq!(total_fragments(20, 8), 3);
    }

    #[tokio::test]
    async fn test_splits_into_ordered_fragments() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker.clone(), 8).await;
        let data = b"0123456789abcdefg";

        let id = ingestor
            .upload(request("/", "notes.txt", 17), &data[..], &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.messages().await;
        let seqs: Vec<u64> = messages.iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, [1, 2, 3]);
        assert_eq!(&messages[0].payload[..], b"01234567");
        assert_eq!(&messages[1].payload[..], b"89abcdef");
        assert_eq!(&messages[2].payload[..], b"g");
        assert!(messages.iter().all(|m| m.file_id == id && m.durable));

        let entry = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(entry.name, "notes.txt");
        assert_eq!(entry.path, "/");
        assert_eq!(entry.size, 17);
        assert_eq!(entry.total_fragments, 3);
        assert!(entry.processing);
        assert!(entry.fragments.is_empty());
    }

    #[tokio::test]
    async fn test_zero_length_upload_sends_one_empty_fragment() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker.clone(), 8).await;

        let id = ingestor
            .upload(request("/", "empty", 0), &b""[..], &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].payload.is_empty());
        assert_eq!(store.get_by_id(&id).await.unwrap().unwrap().total_fragments, 1);
    }

    #[tokio::test]
    async fn test_short_content_still_sends_every_fragment() {
        let broker = Arc::new(MemoryBroker::new());
        let (_store, ingestor) = setup(broker.clone(), 4).await;

        ingestor
            .upload(request("/", "short", 12), &b"abcde"[..], &CancellationToken::new())
            .await
            .unwrap();

        let sizes: Vec<usize> = broker.messages().await.iter().map(|m| m.payload.len()).collect();
        assert_eq!(sizes, [4, 1, 0]);
    }

    #[tokio::test]
    async fn test_trailing_content_is_ignored() {
        let broker = Arc::new(MemoryBroker::new());
        let (_store, ingestor) = setup(broker.clone(), 4).await;

        ingestor
            .upload(request("/", "long", 4), &b"abcdefgh"[..], &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0].payload[..], b"abcd");
    }

    #[tokio::test]
    async fn test_name_collision_gets_suffix() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker, 8).await;
        let cancel = CancellationToken::new();

        let first = ingestor.upload(request("/", "a.txt", 1), &b"x"[..], &cancel).await.unwrap();
        let second = ingestor.upload(request("/", "a.txt", 1), &b"y"[..], &cancel).await.unwrap();

        assert_eq!(store.get_by_id(&first).await.unwrap().unwrap().name, "a.txt");
        assert_eq!(store.get_by_id(&second).await.unwrap().unwrap().name, "a(1).txt");
    }

    #[tokio::test]
    async fn test_invalid_path_mutates_nothing() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker.clone(), 8).await;

        let err = ingestor
            .upload(request("/bad path!", "a", 1), &b"x"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidPath(_)));
        assert_eq!(store.len().await, 1);
        assert!(broker.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_name_is_rejected() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker, 8).await;

        let err = ingestor
            .upload(request("/", "!!!", 1), &b"x"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidName(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_metadata() {
        let broker = Arc::new(MemoryBroker::failing_at(2));
        let (store, ingestor) = setup(broker.clone(), 4).await;

        let err = ingestor
            .upload(request("/", "f", 10), &b"0123456789"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EnqueueFailed { sequence: 2, .. }));
        assert_eq!(broker.messages().await.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_publish_is_bounded_by_timeout() {
        let store = store_with_root().await;
        let ingestor = Ingestor::new(
            store.clone(),
            Arc::new(StalledBroker),
            config(8, Duration::from_millis(20)),
        );

        let err = ingestor
            .upload(request("/", "slow", 3), &b"abc"[..], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_cancelled_upload_stops_early() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker.clone(), 8).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ingestor
            .upload(request("/", "c", 16), &[0u8; 16][..], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled(_)));
        assert!(broker.messages().await.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_cancel_while_publishing() {
        let ingestor = Ingestor::new(
            store_with_root().await,
            Arc::new(StalledBroker),
            config(8, Duration::from_secs(30)),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = ingestor
            .upload(request("/", "c", 3), &b"abc"[..], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_consumers_are_woken() {
        let broker = Arc::new(MemoryBroker::new());
        let (_store, ingestor) = setup(broker.clone(), 8).await;
        ingestor
            .upload(request("/", "w", 1), &b"x"[..], &CancellationToken::new())
            .await
            .unwrap();

        for _ in 0..50 {
            if broker.notifications() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(broker.notifications(), 1);
    }

    #[tokio::test]
    async fn test_declared_size_above_limit_is_rejected() {
        let broker = Arc::new(MemoryBroker::new());
        let store = store_with_root().await;
        let ingestor = Ingestor::new(
            store.clone(),
            broker.clone(),
            IngestConfig {
                fragment_size: 1,
                publish_timeout: Duration::from_secs(5),
                max_upload_size: 16,
            },
        );

        let err = ingestor
            .upload(request("/", "huge", 200_000), &b"a"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(broker.messages().await.is_empty());
        assert_eq!(store.len().await, 1);

        ingestor
            .upload(request("/", "fits", 16), &[7u8; 16][..], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(broker.messages().await.len(), 16);
    }

    #[tokio::test]
    async fn test_target_directory_must_exist() {
        let broker = Arc::new(MemoryBroker::new());
        let (store, ingestor) = setup(broker.clone(), 8).await;
        let cancel = CancellationToken::new();

        let err = ingestor
            .upload(request("/missing", "a", 1), &b"x"[..], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        ingestor.upload(request("/", "plain", 1), &b"x"[..], &cancel).await.unwrap();
        let err = ingestor
            .upload(request("/plain", "a", 1), &b"x"[..], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotADirectory(_)));

        assert_eq!(store.len().await, 2);
        assert_eq!(broker.messages().await.len(), 1);
    }

    /// Fails every read; chained after real content it breaks only the tail.
    struct BrokenTail;

    impl AsyncRead for BrokenTail {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    #[tokio::test]
    async fn test_failed_trailing_check_keeps_the_upload() {
        let broker = Arc::new(MemoryBroker::new());
        let (_store, ingestor) = setup(broker.clone(), 4).await;

        let content = (&b"abcd"[..]).chain(BrokenTail);
        ingestor
            .upload(request("/", "tail", 4), content, &CancellationToken::new())
            .await
            .unwrap();

        let messages = broker.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0].payload[..], b"abcd");
    }
}
