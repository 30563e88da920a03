// UI state owned by a session: loading indicator, error area, result panel

use std::collections::BTreeSet;

use super::errors::DownloadError;
use super::models::{FormatOption, VideoInfo};
use super::utils;

/// Fetched media as displayed in the result panel
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResult {
    /// URL the metadata was fetched for (also used for downloads)
    pub url: String,
    pub info: VideoInfo,
    pub formats: Vec<FormatOption>,
}

impl MediaResult {
    pub fn duration_label(&self) -> String {
        utils::format_duration(self.info.duration)
    }
}

/// Everything a download needs, captured when it starts
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTarget {
    pub url: String,
    pub title: String,
    pub option: FormatOption,
    /// Fetch that produced the result this download was started from
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    pub loading: bool,
    pub error: Option<String>,
    pub result: Option<MediaResult>,
    /// Format ids of the displayed result with a download in flight
    pub busy: BTreeSet<String>,
    /// Bumped by every fetch; completions of older fetches leave the panels alone
    generation: u64,
    /// Every download in flight, keyed by the fetch it was started from
    in_flight: BTreeSet<(u64, String)>,
}

impl UiState {
    pub fn is_busy(&self, format_id: &str) -> bool {
        self.busy.contains(format_id)
    }

    pub(crate) fn begin_fetch(&mut self) -> u64 {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        self.result = None;
        self.busy.clear();
        self.generation
    }

    pub(crate) fn show_result(&mut self, generation: u64, result: MediaResult) {
        if generation == self.generation {
            self.result = Some(result);
        }
    }

    pub(crate) fn show_fetch_error(&mut self, generation: u64, message: String) {
        if generation == self.generation {
            self.error = Some(message);
        }
    }

    pub(crate) fn finish_fetch(&mut self, generation: u64) {
        if generation == self.generation {
            self.loading = false;
        }
    }

    /// Mark `format_id` busy. `Ok(None)` when it already is (the button is disabled).
    pub(crate) fn begin_download(
        &mut self,
        format_id: &str,
    ) -> Result<Option<DownloadTarget>, DownloadError> {
        let result = self
            .result
            .as_ref()
            .ok_or_else(|| DownloadError::UnknownFormat(format_id.to_string()))?;
        let option = result
            .formats
            .iter()
            .find(|o| o.format_id == format_id)
            .ok_or_else(|| DownloadError::UnknownFormat(format_id.to_string()))?;

        let target = DownloadTarget {
            url: result.url.clone(),
            title: result.info.title.clone(),
            option: option.clone(),
            generation: self.generation,
        };

        if !self.in_flight.insert((self.generation, format_id.to_string())) {
            return Ok(None);
        }
        self.busy.insert(format_id.to_string());
        Ok(Some(target))
    }

    pub(crate) fn finish_download(&mut self, generation: u64, format_id: &str) {
        self.in_flight.remove(&(generation, format_id.to_string()));
        if generation == self.generation {
            self.busy.remove(format_id);
        }
    }

    pub(crate) fn show_error(&mut self, message: String) {
        self.error = Some(message);
    }
}
