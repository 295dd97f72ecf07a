use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::{Client, ClientBuilder};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::config::SyncConfig;
use crate::core::error::{SyncError, SyncResult};

const APP_USER_AGENT: &str = concat!("assetsync/", env!("CARGO_PKG_VERSION"));

/// HTTP client whose `timeout` bounds connecting and each stall between
/// reads. There is no limit on a whole transfer, so a slow but live body
/// (the client jar) is never cut off.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    client_builder(timeout).build()
}

fn client_builder(timeout: Duration) -> ClientBuilder {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(timeout)
        .read_timeout(timeout)
}

/// The two network primitives the pipeline needs.
///
/// Implementations must be cheap to share between download workers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the whole body.
    async fn fetch(&self, url: &str) -> SyncResult<Vec<u8>>;

    /// GET `url` and stream the body into `dest`, returning the bytes written.
    async fn download_to_file(&self, url: &str, dest: &Path) -> SyncResult<u64>;
}

/// `reqwest`-backed transport used outside of tests.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        let client = build_http_client(config.timeout())?;
        Ok(Self::new(client))
    }

    async fn get(&self, url: &str) -> SyncResult<reqwest::Response> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> SyncResult<Vec<u8>> {
        let bytes = self.get(url).await?.bytes().await?;
        debug!("GET {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn download_to_file(&self, url: &str, dest: &Path) -> SyncResult<u64> {
        let response = self.get(url).await?;

        let write_err = |source| SyncError::DownloadWrite {
            path: dest.to_path_buf(),
            source,
        };

        let mut written = 0u64;
        // Scoped so the handle is closed before the caller touches the file.
        {
            let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(write_err)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(write_err)?;
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }
}
