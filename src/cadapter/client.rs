//! High-level client API for fragment backends
//!
//! `FragmentBackend` turns one fragment locator into an opened byte stream.
//! `FragmentClient` sits on top of any backend and implements the read path
//! used by the VFS: order the fragments, open each with a bounded wait, and wrap
//! the result in a `FragmentReader`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entry::FragmentRef;
use crate::error::AppError;
use crate::fragment::{FragmentReader, FragmentStream, IdleDeadline, order};

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait FragmentBackend: Send + Sync {
    /// Short name used in logs (`cdn`, `bucket`, `local`).
    fn name(&self) -> &'static str;

    /// Backend-specific address of a fragment (URL, object key, file path).
    fn locate(&self, fragment: &FragmentRef) -> String;

    async fn open_fragment(
        &self,
        fragment: &FragmentRef,
    ) -> Result<Box<dyn FragmentStream>, BackendError>;
}

/// Key of a fragment below a backend's root: `{container}/{object}/{sequence}`.
pub fn fragment_key(fragment: &FragmentRef) -> String {
    format!(
        "{}/{}/{}",
        fragment.container_id, fragment.object_id, fragment.sequence_name
    )
}

#[derive(Clone)]
pub struct FragmentClient {
    backend: Arc<dyn FragmentBackend>,
    fetch_timeout: Duration,
}

impl FragmentClient {
    pub fn new(backend: Arc<dyn FragmentBackend>, fetch_timeout: Duration) -> Self {
        Self {
            backend,
            fetch_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Opens every fragment up front, in sequence order. If any of them cannot be
    /// opened the streams opened so far are closed and the whole read fails.
    ///
    /// The fetch timeout bounds both the open and every later read that waits on a
    /// fragment; a stalled body fails with `ErrorKind::TimedOut`.
    #[tracing::instrument(skip_all, fields(backend = self.backend.name(), fragments = fragments.len()))]
    pub async fn read_fragments(
        &self,
        fragments: &[FragmentRef],
    ) -> Result<FragmentReader, AppError> {
        let ordered = order(fragments.to_vec());
        let mut opened: Vec<Box<dyn FragmentStream>> = Vec::with_capacity(ordered.len());

        for fragment in &ordered {
            match self.open(fragment).await {
                Ok(stream) => opened.push(stream),
                Err(e) => {
                    let mut partial = FragmentReader::new(opened);
                    if let Err(close_err) = partial.close().await {
                        tracing::warn!("failed to release opened fragments: {close_err}");
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!("opened {} fragment streams", opened.len());
        Ok(FragmentReader::new(opened))
    }

    async fn open(&self, fragment: &FragmentRef) -> Result<Box<dyn FragmentStream>, AppError> {
        let locator = self.backend.locate(fragment);
        match tokio::time::timeout(self.fetch_timeout, self.backend.open_fragment(fragment)).await
        {
            Ok(Ok(stream)) => Ok(Box::new(IdleDeadline::new(stream, locator, self.fetch_timeout))),
            Ok(Err(e)) => Err(AppError::FragmentUnavailable {
                locator,
                reason: e.to_string(),
            }),
            Err(_) => Err(AppError::Timeout(format!("fetching fragment {locator}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::localfs::LocalFsBackend;
    use crate::fragment::ReaderFragment;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct StalledBackend;

    #[async_trait]
    impl FragmentBackend for StalledBackend {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn locate(&self, fragment: &FragmentRef) -> String {
            fragment_key(fragment)
        }

        async fn open_fragment(
            &self,
            _fragment: &FragmentRef,
        ) -> Result<Box<dyn FragmentStream>, BackendError> {
            futures::future::pending().await
        }
    }

    /// Opens fine, sends two bytes of the body and then goes quiet.
    #[derive(Default)]
    struct StallingBodyBackend {
        writers: tokio::sync::Mutex<Vec<DuplexStream>>,
    }

    #[async_trait]
    impl FragmentBackend for StallingBodyBackend {
        fn name(&self) -> &'static str {
            "stalling"
        }

        fn locate(&self, fragment: &FragmentRef) -> String {
            fragment_key(fragment)
        }

        async fn open_fragment(
            &self,
            fragment: &FragmentRef,
        ) -> Result<Box<dyn FragmentStream>, BackendError> {
            let (mut tx, rx) = tokio::io::duplex(64);
            tx.write_all(b"ab").await?;
            self.writers.lock().await.push(tx);
            Ok(Box::new(ReaderFragment::new(fragment_key(fragment), rx)))
        }
    }

    #[tokio::test]
    async fn test_reads_fragments_in_sequence_order() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        let first = FragmentRef::new(1, "chan", "m1", 2);
        let second = FragmentRef::new(2, "chan", "m2", 2);
        backend.put_fragment(&first, b"AB").await.unwrap();
        backend.put_fragment(&second, b"CD").await.unwrap();

        let client = FragmentClient::new(Arc::new(backend), Duration::from_secs(5));
        let mut reader = client
            .read_fragments(&[second.clone(), first.clone()])
            .await
            .unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "ABCD");
        reader.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_fragment_aborts_the_read() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        let present = FragmentRef::new(1, "chan", "m1", 2);
        backend.put_fragment(&present, b"AB").await.unwrap();
        let missing = FragmentRef::new(2, "chan", "m2", 2);

        let client = FragmentClient::new(Arc::new(backend), Duration::from_secs(5));
        let err = client.read_fragments(&[present, missing]).await.err().unwrap();
        assert!(
            matches!(err, AppError::FragmentUnavailable { ref locator, .. } if locator.ends_with("chan/m2/2"))
        );
    }

    #[tokio::test]
    async fn test_fetch_is_bounded_by_timeout() {
        let client = FragmentClient::new(Arc::new(StalledBackend), Duration::from_millis(20));
        let err = client
            .read_fragments(&[FragmentRef::new(1, "c", "o", 0)])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_no_fragments_gives_empty_reader() {
        let client = FragmentClient::new(Arc::new(StalledBackend), Duration::from_millis(20));
        let reader = client.read_fragments(&[]).await.unwrap();
        assert!(reader.is_empty());
        assert_eq!(client.backend_name(), "stalled");
    }

    #[tokio::test]
    async fn test_stalled_body_is_bounded_by_timeout() {
        let client = FragmentClient::new(
            Arc::new(StallingBodyBackend::default()),
            Duration::from_millis(50),
        );
        let mut reader = client
            .read_fragments(&[FragmentRef::new(1, "c", "o", 10)])
            .await
            .unwrap();

        let mut out = Vec::new();
        let res = tokio::time::timeout(Duration::from_secs(3), reader.read_to_end(&mut out))
            .await
            .expect("the fetch timeout must end a stalled read");
        assert_eq!(res.unwrap_err().kind(), std::io::ErrorKind::TimedOut);
        reader.close().await.unwrap();
    }
}
