use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::downloader::errors::{DownloadError, DOWNLOAD_FALLBACK, INFO_FALLBACK};
use crate::downloader::models::{DownloadedMedia, NetworkConfig, VideoInfo};
use crate::downloader::traits::MediaBackend;
use crate::downloader::utils;

#[derive(Serialize)]
struct InfoRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
    url: &'a str,
    format_id: &'a str,
}

/// Backend reached over HTTP (`POST /api/info`, `POST /api/download`)
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    info_timeout: Option<Duration>,
    download_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(base_url: &str, network: &NetworkConfig) -> Result<Self, DownloadError> {
        let base_url = utils::non_empty(base_url)
            .ok_or_else(|| DownloadError::Config("Backend URL is empty".to_string()))?;

        Ok(Self {
            client: utils::build_http_client(network)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            info_timeout: network.timeout.map(|s| Duration::from_secs(u64::from(s))),
            download_timeout: network
                .download_timeout
                .map(|s| Duration::from_secs(u64::from(s))),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(
        request: RequestBuilder,
        timeout: Option<Duration>,
        fallback: &'static str,
    ) -> Result<Response, DownloadError> {
        let request = match timeout {
            Some(t) => request.timeout(t),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::transport(fallback, e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        let error = error_from_body(&body, fallback);
        warn!(%status, error = %error, "Backend returned an error");
        Err(error)
    }
}

/// Message from a `{"error": "..."}` body, or the fallback when there is none
fn error_from_body(body: &[u8], fallback: &'static str) -> DownloadError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| json.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty());

    DownloadError::Backend(message.unwrap_or_else(|| fallback.to_string()))
}

#[async_trait]
impl MediaBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let endpoint = self.endpoint("api/info");
        debug!(%endpoint, url, "Requesting media info");

        let request = self.client.post(&endpoint).json(&InfoRequest { url });
        let response = Self::send(request, self.info_timeout, INFO_FALLBACK).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| DownloadError::transport(INFO_FALLBACK, e))?;
        let info: VideoInfo = serde_json::from_slice(&body)
            .map_err(|e| DownloadError::transport(INFO_FALLBACK, format!("invalid info response: {}", e)))?;

        debug!(title = %info.title, formats = info.formats.len(), "Media info received");
        Ok(info)
    }

    async fn download(&self, url: &str, format_id: &str) -> Result<DownloadedMedia, DownloadError> {
        let endpoint = self.endpoint("api/download");
        debug!(%endpoint, url, format_id, "Requesting download");

        let request = self
            .client
            .post(&endpoint)
            .json(&DownloadRequest { url, format_id });
        let response = Self::send(request, self.download_timeout, DOWNLOAD_FALLBACK).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::transport(DOWNLOAD_FALLBACK, e))?;

        debug!(size = bytes.len(), content_type = ?content_type, "Download payload received");
        Ok(DownloadedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
