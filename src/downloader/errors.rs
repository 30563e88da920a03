// Error types for the media backend client

use std::path::PathBuf;

use thiserror::Error;

/// Generic message shown when the info request fails without a backend message
pub const INFO_FALLBACK: &str = "Failed to fetch video info";

/// Generic message shown when the download request fails without a backend message
pub const DOWNLOAD_FALLBACK: &str = "Download failed";

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Backend answered with a non-success status
    #[error("{0}")]
    Backend(String),

    /// Request failed before a usable response arrived, or the body could not be decoded
    #[error("{fallback}: {detail}")]
    Transport {
        fallback: &'static str,
        detail: String,
    },

    /// Every descriptor was filtered out by the format selector
    #[error("No suitable video formats found.")]
    NoSuitableFormats,

    /// Download requested for a format that is not in the displayed result
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// Payload could not be written to disk
    #[error("Failed to save {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration file or value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DownloadError {
    pub fn transport(fallback: &'static str, detail: impl ToString) -> Self {
        Self::Transport {
            fallback,
            detail: detail.to_string(),
        }
    }

    /// Text shown in the error area.
    ///
    /// Backend messages are passed through verbatim; transport failures only
    /// ever show the generic message of the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(message) => message.clone(),
            Self::Transport { fallback, .. } => (*fallback).to_string(),
            other => other.to_string(),
        }
    }
}
