// Common data models for the backend client

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// One rendition reported by the backend's info endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Opaque backend identifier (e.g., "137")
    pub format_id: String,

    /// "WIDTHxHEIGHT", or "audio only"
    #[serde(default)]
    pub resolution: Option<String>,

    /// Container tag (mp4, webm, m4a)
    #[serde(default, deserialize_with = "null_as_default")]
    pub ext: String,

    /// Backend-specific fields (filesize, vcodec, note...) passed through unmodified
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Metadata returned by the info endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Duration in seconds
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<VideoFormat>,
}

/// Deduplicated, user-facing choice produced by the format selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOption {
    /// Display label (e.g., "720p")
    pub label: String,
    pub format_id: String,
    pub ext: String,
    /// Parsed height, used for ordering
    pub height: u32,
}

/// Binary payload returned by the download endpoint
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    /// Declared Content-Type, if any
    pub content_type: Option<String>,
}

/// Payload written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Download options
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Network configuration for the HTTP backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout for the info request, in seconds
    pub timeout: Option<u32>,

    /// Timeout for the download request, in seconds (backend may transcode for a while)
    pub download_timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
            download_timeout: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Some extractors report fractional durations.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| {
        n.as_u64()
            .or_else(|| n.as_f64().filter(|secs| *secs >= 0.0).map(|secs| secs as u64))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_info_response() {
        let body = r#"{
            "title": "Clip",
            "thumbnail": "https://i.example/t.jpg",
            "duration": 212,
            "formats": [
                {"format_id": "137", "resolution": "1920x1080", "ext": "mp4", "filesize": 1024, "vcodec": "avc1"},
                {"format_id": "140", "resolution": "audio only", "ext": "m4a"}
            ]
        }"#;

        let info: VideoInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.title, "Clip");
        assert_eq!(info.duration, Some(212));
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].extra["vcodec"], "avc1");
        assert_eq!(info.formats[0].extra["filesize"], 1024);
        assert_eq!(info.formats[1].resolution.as_deref(), Some("audio only"));
    }

    #[test]
    fn test_tolerates_nulls_and_fractional_duration() {
        let body = r#"{
            "title": null,
            "thumbnail": null,
            "duration": 61.7,
            "formats": [{"format_id": "18", "resolution": null, "ext": null}]
        }"#;

        let info: VideoInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.title, "");
        assert_eq!(info.thumbnail, None);
        assert_eq!(info.duration, Some(61));
        assert_eq!(info.formats[0].resolution, None);
        assert_eq!(info.formats[0].ext, "");
    }

    #[test]
    fn test_network_config_defaults_apply_to_missing_keys() {
        let config: NetworkConfig = toml::from_str(r#"proxy = "socks5://127.0.0.1:1080""#).unwrap();
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(config.timeout, Some(30));
        assert_eq!(config.download_timeout, None);
    }
}
