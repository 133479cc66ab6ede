use std::fs::File;
use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::DysonError;

/// Streams the body behind a download url into a file.
pub trait ArchiveFetcher: Send + Sync {
    /// Returns the number of bytes written.
    fn fetch(&self, url: &str, destination: &mut File) -> Result<u64, DysonError>;
}

#[derive(Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new() -> Result<Self, DysonError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dyson/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DysonError::DownloadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| DysonError::DownloadHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, url: &str, destination: &mut File) -> Result<u64, DysonError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| DysonError::DownloadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "archive download failed".to_string());
            return Err(DysonError::DownloadStatus { status, message });
        }
        let written = std::io::copy(&mut response, destination)
            .map_err(|err| DysonError::DownloadHttp(err.to_string()))?;
        destination
            .flush()
            .map_err(|err| DysonError::Filesystem(err.to_string()))?;
        Ok(written)
    }
}
