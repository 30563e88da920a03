// Helper functions shared by the backend client and the session

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{NetworkConfig, SavedFile};

/// Extension used when the payload's content type tells us nothing
pub const DEFAULT_EXT: &str = "mp4";

/// Trimmed input, or None when it is blank
pub fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Build an HTTP client honoring the configured proxy
pub fn build_http_client(config: &NetworkConfig) -> Result<reqwest::Client, DownloadError> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = config.proxy.as_deref().and_then(non_empty) {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| DownloadError::Config(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
        debug!(proxy = proxy_url, "Using proxy");
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| DownloadError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Human-readable duration: "m:ss", "h:mm:ss", or "Unknown"
pub fn format_duration(seconds: Option<u64>) -> String {
    let seconds = match seconds {
        Some(s) if s > 0 => s,
        _ => return "Unknown".to_string(),
    };

    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;

    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// File extension for a declared Content-Type
pub fn extension_for_content_type(content_type: Option<&str>) -> String {
    let essence = match content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
    {
        Some(essence) if !essence.is_empty() => essence,
        _ => return DEFAULT_EXT.to_string(),
    };

    let known = match essence.as_str() {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/x-matroska" => Some("mkv"),
        "video/quicktime" => Some("mov"),
        "video/x-flv" => Some("flv"),
        "video/3gpp" => Some("3gp"),
        "video/x-msvideo" => Some("avi"),
        "video/x-ms-wmv" => Some("wmv"),
        "video/x-ms-asf" => Some("asf"),
        "video/x-m4v" => Some("m4v"),
        "video/mp2t" => Some("ts"),
        "video/ogg" => Some("ogv"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "audio/flac" => Some("flac"),
        "audio/webm" => Some("weba"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    // Unlisted media types: a plain subtype is usable as-is ("video/avi" -> "avi")
    match essence.split_once('/') {
        Some((_, subtype))
            if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            subtype.to_string()
        }
        _ => DEFAULT_EXT.to_string(),
    }
}

/// Replace characters that are not allowed in file names
pub fn sanitize_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let compact = sanitized.trim().trim_matches('.');
    if compact.is_empty() {
        "download".to_string()
    } else {
        compact.to_string()
    }
}

/// "{title}_{label}.{ext}"
pub fn build_filename(title: &str, label: &str, content_type: Option<&str>) -> String {
    format!(
        "{}_{}.{}",
        sanitize_filename(title),
        label,
        extension_for_content_type(content_type)
    )
}

/// Write the payload into `dir`, never overwriting: "name (1).ext", "name (2).ext"...
pub async fn save_payload(dir: &Path, filename: &str, bytes: &[u8]) -> Result<SavedFile, DownloadError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DownloadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut attempt = 0u32;
    loop {
        let candidate = match (attempt, ext) {
            (0, _) => filename.to_string(),
            (n, Some(ext)) => format!("{} ({}).{}", stem, n, ext),
            (n, None) => format!("{} ({})", stem, n),
        };
        let path = dir.join(&candidate);

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                attempt += 1;
                continue;
            }
            Err(source) => return Err(DownloadError::Io { path, source }),
        };

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        if let Err(source) = written {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(DownloadError::Io { path, source });
        }

        return Ok(SavedFile {
            path,
            size: bytes.len() as u64,
        });
    }
}
