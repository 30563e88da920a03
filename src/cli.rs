// Command-line surface: argument parsing and terminal rendering of the UI state

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use clap::{ArgAction, Parser};

use crate::config::AppConfig;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{FormatOption, SavedFile};
use crate::downloader::traits::UiRenderer;
use crate::downloader::ui_state::{MediaResult, UiState};

#[derive(Debug, Parser)]
#[command(
    name = "vidgrab",
    version,
    about = "Fetch media info from a download backend and save the resolution you pick"
)]
pub struct Cli {
    /// Media URL (prompted for when omitted)
    pub url: Option<String>,

    /// Resolution label ("720p") or backend format id to download without asking
    #[arg(short, long)]
    pub format: Option<String>,

    /// Only show the media info and the available formats
    #[arg(long, conflicts_with = "format")]
    pub info: bool,

    /// Backend base URL
    #[arg(short, long, value_name = "URL")]
    pub backend: Option<String>,

    /// Directory to save downloads into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// HTTP or SOCKS5 proxy for backend requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Timeout for the info request, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u32>,

    /// Config file (default: <config dir>/vidgrab/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Flags override whatever the file and environment set
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(backend) = &self.backend {
            config.backend_url = backend.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.network.proxy = Some(proxy.clone());
        }
        if let Some(timeout) = self.timeout {
            config.network.timeout = Some(timeout);
        }
    }
}

/// Numbered list of formats, as shown to the user
pub fn format_list(formats: &[FormatOption]) -> Vec<String> {
    formats
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{:>3}. {:<6} {}", i + 1, f.label, f.ext.to_uppercase()))
        .collect()
}

/// Resolve a user choice: list number, label, or format id
pub fn parse_choice<'a>(input: &str, formats: &'a [FormatOption]) -> Option<&'a FormatOption> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| formats.get(i)) {
            return Some(option);
        }
    }
    FormatSelector::find(formats, input)
}

pub fn saved_message(saved: &SavedFile) -> String {
    format!(
        "Saved {} ({})",
        saved.path.display(),
        humansize::format_size(saved.size, humansize::DECIMAL)
    )
}

fn describe_result(result: &MediaResult) -> Vec<String> {
    let mut lines = vec![
        format!("Title:     {}", result.info.title),
        format!("Duration:  {}", result.duration_label()),
    ];
    if let Some(thumbnail) = result.info.thumbnail.as_deref() {
        lines.push(format!("Thumbnail: {}", thumbnail));
    }
    lines.push("Available formats:".to_string());
    lines.extend(format_list(&result.formats));
    lines
}

/// Lines to print when the state moves from `previous` to `current`
pub fn describe_transition(previous: &UiState, current: &UiState) -> Vec<String> {
    let mut lines = Vec::new();

    if current.loading && !previous.loading {
        lines.push("Fetching media info...".to_string());
    }

    if current.result != previous.result {
        if let Some(result) = &current.result {
            lines.extend(describe_result(result));
        }
    }

    for format_id in current.busy.difference(&previous.busy) {
        let label = current
            .result
            .as_ref()
            .and_then(|r| r.formats.iter().find(|f| &f.format_id == format_id))
            .map_or(format_id.as_str(), |f| f.label.as_str());
        lines.push(format!("Downloading {}...", label));
    }

    if current.error != previous.error {
        if let Some(error) = &current.error {
            lines.push(format!("Error: {}", error));
        }
    }

    lines
}

/// Prints state transitions as they happen
pub struct TerminalRenderer<W> {
    inner: Mutex<RendererInner<W>>,
}

struct RendererInner<W> {
    out: W,
    last: UiState,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: Mutex::new(RendererInner {
                out,
                last: UiState::default(),
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

impl<W: Write + Send> UiRenderer for TerminalRenderer<W> {
    fn render(&self, state: &UiState) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut inner.last, state.clone());

        for line in describe_transition(&previous, state) {
            let _ = writeln!(inner.out, "{}", line);
        }
        let _ = inner.out.flush();
    }
}
