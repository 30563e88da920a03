// Backend and view trait definitions

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{DownloadedMedia, VideoInfo};
use super::ui_state::UiState;

/// Service that extracts metadata and serves downloads
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Get media metadata for a (trimmed, non-empty) URL
    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, DownloadError>;

    /// Download one rendition of the media at `url`
    async fn download(&self, url: &str, format_id: &str) -> Result<DownloadedMedia, DownloadError>;
}

/// Receives every UI state transition.
///
/// Called with the state lock held: implementations must not call back
/// into the session.
pub trait UiRenderer: Send + Sync {
    fn render(&self, state: &UiState);
}

/// Renderer that discards every update
pub struct NoopRenderer;

impl UiRenderer for NoopRenderer {
    fn render(&self, _state: &UiState) {}
}
