// Downloader module - backend client, format selection and session state

pub mod backends;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod traits;
pub mod ui_state;
pub mod utils;

pub use backends::HttpBackend;
pub use errors::DownloadError;
pub use format_selector::FormatSelector;
pub use models::{DownloadOptions, FormatOption, NetworkConfig, SavedFile, VideoFormat, VideoInfo};
pub use orchestrator::Downloader;
pub use traits::{MediaBackend, NoopRenderer, UiRenderer};
pub use ui_state::{MediaResult, UiState};
