// FormatSelector - turns backend renditions into user-facing choices
//
// Rules:
// - Audio-only and resolution-less renditions are dropped
// - Anything below 360p is dropped
// - One choice per height; an mp4 rendition displaces a non-mp4 one
// - Highest resolution first

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::errors::DownloadError;
use super::models::{FormatOption, VideoFormat};

/// Container favored when several renditions share a height
pub const PREFERRED_EXT: &str = "mp4";

/// Renditions below this height are never offered
pub const MIN_HEIGHT: u32 = 360;

/// Resolution sentinel the backend uses for audio streams
pub const AUDIO_ONLY: &str = "audio only";

lazy_static! {
    static ref LEADING_DIGITS: Regex = Regex::new(r"^\s*\+?(\d+)").unwrap();
}

pub struct FormatSelector;

impl FormatSelector {
    /// Build the ordered list of selectable formats.
    ///
    /// Input order matters: within a height bucket the first rendition wins
    /// unless a later one is the preferred container and the current one
    /// is not. Returns [`DownloadError::NoSuitableFormats`] instead of an
    /// empty list.
    pub fn build_format_options(
        formats: &[VideoFormat],
    ) -> Result<Vec<FormatOption>, DownloadError> {
        let mut options: Vec<FormatOption> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for format in formats {
            let resolution = match format.resolution.as_deref() {
                Some(r) if !r.is_empty() && r != AUDIO_ONLY => r,
                _ => continue,
            };

            let height = parse_height(resolution);
            if height < MIN_HEIGHT {
                continue;
            }

            let label = format!("{}p", height);
            match slots.get(&label) {
                Some(&slot) => {
                    let current = &options[slot];
                    if format.ext == PREFERRED_EXT && current.ext != PREFERRED_EXT {
                        options[slot] = Self::option(label, height, format);
                    }
                }
                None => {
                    slots.insert(label.clone(), options.len());
                    options.push(Self::option(label, height, format));
                }
            }
        }

        if options.is_empty() {
            return Err(DownloadError::NoSuitableFormats);
        }

        // stable: equal heights keep first-seen order
        options.sort_by(|a, b| b.height.cmp(&a.height));
        Ok(options)
    }

    /// Look up an option by label ("720p", case-insensitive) or by format id
    pub fn find<'a>(options: &'a [FormatOption], wanted: &str) -> Option<&'a FormatOption> {
        let wanted = wanted.trim();
        options
            .iter()
            .find(|o| o.label.eq_ignore_ascii_case(wanted))
            .or_else(|| options.iter().find(|o| o.format_id == wanted))
    }

    fn option(label: String, height: u32, format: &VideoFormat) -> FormatOption {
        FormatOption {
            label,
            format_id: format.format_id.clone(),
            ext: format.ext.clone(),
            height,
        }
    }
}

/// Height component of a "WIDTHxHEIGHT" string, 0 when it cannot be read.
///
/// Only the leading digits after the first `x` count, so "1280x720 (hd)"
/// is 720 and "720p" is 0. Heights too large for `u32` saturate.
pub fn parse_height(resolution: &str) -> u32 {
    resolution
        .split('x')
        .nth(1)
        .and_then(|segment| LEADING_DIGITS.captures(segment))
        .and_then(|caps| caps.get(1))
        // all digits: parsing can only fail on overflow
        .map(|digits| digits.as_str().parse().unwrap_or(u32::MAX))
        .unwrap_or(0)
}
