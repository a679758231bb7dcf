use crate::app::ports::{AssetDownloader, FeedFetcher};
use crate::constants::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// reqwest-backed client for remote feeds and asset downloads.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get_ok(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl AssetDownloader for ReqwestHttpClient {
    async fn download(&self, url: &str, target: &Path) -> Result<(), FetchError> {
        let mut resp = self.get_ok(url).await?;

        let mut file = tokio::fs::File::create(target).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} ({} bytes) to {}", url, written, target.display());
        Ok(())
    }
}

#[async_trait]
impl FeedFetcher for ReqwestHttpClient {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("🌐 Getting feed from {}", url);
        let body = self.get_ok(url).await?.bytes().await?;
        debug!("Feed {} returned {} bytes", url, body.len());
        Ok(body.to_vec())
    }
}
