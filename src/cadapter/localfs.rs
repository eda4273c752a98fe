//! Local directory backend: fragments live under `{root}/{container}/{object}/{sequence}`.
//! Used for development and tests in place of a hosting service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};

use crate::cadapter::client::{BackendError, FragmentBackend, fragment_key};
use crate::domain::entry::FragmentRef;
use crate::fragment::{FragmentStream, ReaderFragment};

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, fragment: &FragmentRef) -> PathBuf {
        self.root.join(fragment_key(fragment))
    }

    /// Stores a fragment the way an external consumer would after hosting it.
    pub async fn put_fragment(&self, fragment: &FragmentRef, data: &[u8]) -> Result<(), BackendError> {
        let path = self.path_for(fragment);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut f = fs::File::create(path).await?;
        f.write_all(data).await?;
        f.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl FragmentBackend for LocalFsBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn locate(&self, fragment: &FragmentRef) -> String {
        self.path_for(fragment).display().to_string()
    }

    async fn open_fragment(
        &self,
        fragment: &FragmentRef,
    ) -> Result<Box<dyn FragmentStream>, BackendError> {
        let path = self.path_for(fragment);
        let file = fs::File::open(&path).await?;
        Ok(Box::new(ReaderFragment::new(
            path.display().to_string(),
            file,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_put_then_open() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        let fragment = FragmentRef::new(3, "123", "456", 5);
        backend.put_fragment(&fragment, b"hello").await.unwrap();

        assert!(tmp.path().join("123/456/3").is_file());
        let mut stream = backend.open_fragment(&fragment).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
        stream.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        let fragment = FragmentRef::new(1, "nope", "nope", 0);
        assert!(backend.open_fragment(&fragment).await.is_err());
        assert!(backend.locate(&fragment).ends_with("nope/nope/1"));
    }
}
