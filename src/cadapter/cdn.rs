//! CDN backend: fragments are public attachments fetched over plain HTTP GET.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::cadapter::client::{BackendError, FragmentBackend, fragment_key};
use crate::domain::entry::FragmentRef;
use crate::fragment::{FragmentStream, ReaderFragment};

pub const DEFAULT_CDN_BASE: &str = "https://cdn.discordapp.com/attachments";

pub struct CdnBackend {
    http: reqwest::Client,
    base_url: String,
}

impl CdnBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

fn body_error(err: reqwest::Error) -> io::Error {
    if err.is_timeout() {
        io::Error::new(io::ErrorKind::TimedOut, err)
    } else {
        io::Error::other(err)
    }
}

#[async_trait]
impl FragmentBackend for CdnBackend {
    fn name(&self) -> &'static str {
        "cdn"
    }

    fn locate(&self, fragment: &FragmentRef) -> String {
        format!("{}/{}", self.base_url, fragment_key(fragment))
    }

    async fn open_fragment(
        &self,
        fragment: &FragmentRef,
    ) -> Result<Box<dyn FragmentStream>, BackendError> {
        let url = self.locate(fragment);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let body = resp.bytes_stream().map_err(body_error);
        Ok(Box::new(ReaderFragment::new(url, StreamReader::new(body))))
    }
}
