use crate::error::{Result, SpeedError};
use crate::settings::Settings;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use std::future::Future;

/// Lengths of the body chunks of a streamed download, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<usize>>;

/// Network operations the probes are built on.
pub trait Transport: Send + Sync {
    /// One round trip to `url`. Any HTTP response is a success.
    fn probe(&self, url: &str) -> impl Future<Output = Result<()>> + Send;

    /// Starts a download of `bytes` bytes. Fails on a non-success status.
    fn download(&self, bytes: u64) -> impl Future<Output = Result<ChunkStream>> + Send;

    /// Posts `payload` and waits for a success response.
    fn upload(&self, payload: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

pub struct HttpTransport {
    ping_client: reqwest::Client,
    transfer_client: reqwest::Client,
    download_url: String,
    upload_url: String,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let ping_client = reqwest::Client::builder()
            .timeout(settings.ping_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()?;

        let transfer_client = reqwest::Client::builder()
            .timeout(settings.transfer_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()?;

        Ok(Self {
            ping_client,
            transfer_client,
            download_url: settings.download_url.clone(),
            upload_url: settings.upload_url.clone(),
        })
    }
}

impl Transport for HttpTransport {
    async fn probe(&self, url: &str) -> Result<()> {
        self.ping_client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        Ok(())
    }

    async fn download(&self, bytes: u64) -> Result<ChunkStream> {
        let url = format!("{}?bytes={}", self.download_url, bytes);
        let response = self
            .transfer_client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeedError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len()).map_err(SpeedError::from))
            .boxed())
    }

    async fn upload(&self, payload: Vec<u8>) -> Result<()> {
        let response = self
            .transfer_client
            .post(&self.upload_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CACHE_CONTROL, "no-cache")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeedError::Status(status.as_u16()));
        }
        Ok(())
    }
}
