// Session controller: runs user actions against the backend and keeps the UI state

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::format_selector::FormatSelector;
use super::models::{DownloadOptions, SavedFile};
use super::traits::{MediaBackend, UiRenderer};
use super::ui_state::{MediaResult, UiState};
use super::utils;

pub struct Downloader {
    backend: Box<dyn MediaBackend>,
    renderer: Box<dyn UiRenderer>,
    options: DownloadOptions,
    state: Mutex<UiState>,
}

impl Downloader {
    pub fn new(
        backend: Box<dyn MediaBackend>,
        renderer: Box<dyn UiRenderer>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            backend,
            renderer,
            options,
            state: Mutex::new(UiState::default()),
        }
    }

    /// Snapshot of the current UI state
    pub fn state(&self) -> UiState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, UiState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The guard is released before returning; never hold it across an await.
    fn update<R>(&self, change: impl FnOnce(&mut UiState) -> R) -> R {
        let mut state = self.lock();
        let out = change(&mut state);
        self.renderer.render(&state);
        out
    }

    /// Fetch metadata for `raw_url` and show the selectable formats.
    ///
    /// Blank input is ignored (`Ok(None)`) without touching the state.
    pub async fn fetch_info(&self, raw_url: &str) -> Result<Option<MediaResult>, DownloadError> {
        let url = match utils::non_empty(raw_url) {
            Some(url) => url,
            None => {
                debug!("Ignoring blank URL");
                return Ok(None);
            }
        };

        let generation = self.update(UiState::begin_fetch);
        let _loading = FetchGuard {
            session: self,
            generation,
        };

        debug!(backend = self.backend.name(), url, "Fetching media info");
        let outcome = match self.backend.fetch_info(url).await {
            Ok(info) => FormatSelector::build_format_options(&info.formats).map(|formats| MediaResult {
                url: url.to_string(),
                info,
                formats,
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                info!(title = %result.info.title, formats = result.formats.len(), "Media info ready");
                self.update(|state| state.show_result(generation, result.clone()));
                Ok(Some(result))
            }
            Err(e) => {
                warn!(error = %e, "Fetching media info failed");
                self.update(|state| state.show_fetch_error(generation, e.user_message()));
                Err(e)
            }
        }
    }

    /// Download the displayed format `format_id` and save it to the output directory.
    ///
    /// `Ok(None)` when a download of that format is already in flight.
    pub async fn download(&self, format_id: &str) -> Result<Option<SavedFile>, DownloadError> {
        let target = match self.update(|state| state.begin_download(format_id)) {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!(format_id, "Download already in progress");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Download rejected");
                self.update(|state| state.show_error(e.user_message()));
                return Err(e);
            }
        };
        let _busy = BusyGuard {
            session: self,
            generation: target.generation,
            format_id,
        };

        info!(label = %target.option.label, format_id, "Starting download");
        let outcome = match self.backend.download(&target.url, format_id).await {
            Ok(media) => {
                let filename = utils::build_filename(
                    &target.title,
                    &target.option.label,
                    media.content_type.as_deref(),
                );
                utils::save_payload(&self.options.output_dir, &filename, &media.bytes).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(saved) => {
                info!(path = %saved.path.display(), size = saved.size, "Download saved");
                Ok(Some(saved))
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.update(|state| state.show_error(e.user_message()));
                Err(e)
            }
        }
    }
}

// Turns the loading indicator off on every exit path, including cancellation.
struct FetchGuard<'a> {
    session: &'a Downloader,
    generation: u64,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.session.update(|state| state.finish_fetch(generation));
    }
}

struct BusyGuard<'a> {
    session: &'a Downloader,
    generation: u64,
    format_id: &'a str,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let (generation, format_id) = (self.generation, self.format_id);
        self.session
            .update(|state| state.finish_download(generation, format_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{DownloadedMedia, FormatOption, VideoFormat, VideoInfo};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn make_format(id: &str, resolution: &str, ext: &str) -> VideoFormat {
        VideoFormat {
            format_id: id.to_string(),
            resolution: Some(resolution.to_string()),
            ext: ext.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    fn sample_info() -> VideoInfo {
        VideoInfo {
            title: "Clip: part 1".to_string(),
            thumbnail: Some("https://i.example/t.jpg".to_string()),
            duration: Some(3723),
            formats: vec![
                make_format("43", "1280x720", "webm"),
                make_format("22", "1280x720", "mp4"),
                make_format("18", "640x360", "mp4"),
                make_format("140", "audio only", "m4a"),
            ],
        }
    }

    /// Scripted backend; optionally parks each call until released
    struct FakeBackend {
        info: Result<VideoInfo, String>,
        download: Result<(Vec<u8>, Option<String>), String>,
        info_gate: Option<Arc<Notify>>,
        download_gate: Option<Arc<Notify>>,
        info_calls: AtomicUsize,
        download_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(info: Result<VideoInfo, String>) -> Self {
            Self {
                info,
                download: Ok((b"media".to_vec(), Some("video/mp4".to_string()))),
                info_gate: None,
                download_gate: None,
                info_calls: AtomicUsize::new(0),
                download_calls: AtomicUsize::new(0),
            }
        }

        async fn wait(gate: &Option<Arc<Notify>>) {
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl MediaBackend for Arc<FakeBackend> {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_info(&self, _url: &str) -> Result<VideoInfo, DownloadError> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            FakeBackend::wait(&self.info_gate).await;
            self.info.clone().map_err(DownloadError::Backend)
        }

        async fn download(&self, _url: &str, _format_id: &str) -> Result<DownloadedMedia, DownloadError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            FakeBackend::wait(&self.download_gate).await;
            match &self.download {
                Ok((bytes, content_type)) => Ok(DownloadedMedia {
                    bytes: bytes.clone(),
                    content_type: content_type.clone(),
                }),
                Err(message) => Err(DownloadError::Backend(message.clone())),
            }
        }
    }

    /// Records (loading, error, has_result, busy count) for every render
    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<(bool, Option<String>, bool, usize)>>,
    }

    impl UiRenderer for Arc<Recorder> {
        fn render(&self, state: &UiState) {
            self.frames.lock().unwrap().push((
                state.loading,
                state.error.clone(),
                state.result.is_some(),
                state.busy.len(),
            ));
        }
    }

    fn session(backend: &Arc<FakeBackend>, dir: &std::path::Path) -> (Downloader, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let downloader = Downloader::new(
            Box::new(Arc::clone(backend)),
            Box::new(Arc::clone(&recorder)),
            DownloadOptions {
                output_dir: dir.to_path_buf(),
            },
        );
        (downloader, recorder)
    }

    #[tokio::test]
    async fn test_blank_url_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let (downloader, recorder) = session(&backend, dir.path());

        assert!(downloader.fetch_info("   \t ").await.unwrap().is_none());
        assert_eq!(backend.info_calls.load(Ordering::SeqCst), 0);
        assert!(recorder.frames.lock().unwrap().is_empty());
        assert_eq!(downloader.state(), UiState::default());
    }

    #[tokio::test]
    async fn test_fetch_info_shows_selectable_formats() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let (downloader, recorder) = session(&backend, dir.path());

        let result = downloader
            .fetch_info("  https://example.com/v  ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.url, "https://example.com/v");
        assert_eq!(result.duration_label(), "1:02:03");
        assert_eq!(
            result.formats,
            vec![
                FormatOption {
                    label: "720p".to_string(),
                    format_id: "22".to_string(),
                    ext: "mp4".to_string(),
                    height: 720,
                },
                FormatOption {
                    label: "360p".to_string(),
                    format_id: "18".to_string(),
                    ext: "mp4".to_string(),
                    height: 360,
                },
            ]
        );

        let state = downloader.state();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.result, Some(result));

        assert_eq!(
            *recorder.frames.lock().unwrap(),
            vec![
                (true, None, false, 0),
                (true, None, true, 0),
                (false, None, true, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_backend_error_is_shown_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Err("invalid url".to_string())));
        let (downloader, _recorder) = session(&backend, dir.path());

        let err = downloader.fetch_info("nope").await.unwrap_err();
        assert_eq!(err.user_message(), "invalid url");

        let state = downloader.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("invalid url"));
        assert_eq!(state.result, None);
    }

    #[tokio::test]
    async fn test_no_suitable_formats_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut info = sample_info();
        info.formats = vec![make_format("160", "256x144", "mp4")];
        let backend = Arc::new(FakeBackend::new(Ok(info)));
        let (downloader, _recorder) = session(&backend, dir.path());

        let err = downloader.fetch_info("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, DownloadError::NoSuitableFormats));

        let state = downloader.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("No suitable video formats found."));
        assert_eq!(state.result, None);
    }

    #[tokio::test]
    async fn test_new_fetch_resets_previous_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let (downloader, _recorder) = session(&backend, dir.path());

        downloader.download("22").await.unwrap_err();
        assert!(downloader.state().error.is_some());

        downloader.fetch_info("https://example.com/v").await.unwrap();
        assert_eq!(downloader.state().error, None);
    }

    #[tokio::test]
    async fn test_download_saves_payload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let (downloader, _recorder) = session(&backend, dir.path());

        downloader.fetch_info("https://example.com/v").await.unwrap();
        let saved = downloader.download("22").await.unwrap().unwrap();

        assert_eq!(saved.path, dir.path().join("Clip_ part 1_720p.mp4"));
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"media");
        assert!(downloader.state().busy.is_empty());
    }

    #[tokio::test]
    async fn test_download_error_clears_busy_marker() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBackend::new(Ok(sample_info()));
        fake.download = Err("format not available".to_string());
        let backend = Arc::new(fake);
        let (downloader, _recorder) = session(&backend, dir.path());

        downloader.fetch_info("https://example.com/v").await.unwrap();
        let err = downloader.download("18").await.unwrap_err();

        assert_eq!(err.user_message(), "format not available");
        let state = downloader.state();
        assert_eq!(state.error.as_deref(), Some("format not available"));
        assert!(state.busy.is_empty());
        assert!(state.result.is_some());
    }

    #[tokio::test]
    async fn test_download_of_unlisted_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let (downloader, _recorder) = session(&backend, dir.path());

        downloader.fetch_info("https://example.com/v").await.unwrap();
        let err = downloader.download("43").await.unwrap_err();

        assert!(matches!(err, DownloadError::UnknownFormat(_)));
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_click_on_busy_format_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let mut fake = FakeBackend::new(Ok(sample_info()));
        fake.info_gate = Some(Arc::clone(&gate));
        fake.download_gate = Some(Arc::clone(&gate));
        let backend = Arc::new(fake);
        let (downloader, _recorder) = session(&backend, dir.path());

        let fetch = downloader.fetch_info("https://example.com/v");
        tokio::pin!(fetch);
        tokio::select! {
            _ = &mut fetch => panic!("fetch finished before release"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(downloader.state().loading);
        gate.notify_one();
        fetch.await.unwrap();

        let first = downloader.download("22");
        tokio::pin!(first);
        tokio::select! {
            _ = &mut first => panic!("download finished before release"),
            _ = tokio::task::yield_now() => {}
        }
        assert!(downloader.state().is_busy("22"));

        assert!(downloader.download("22").await.unwrap().is_none());
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert!(first.await.unwrap().is_some());
        assert!(!downloader.state().is_busy("22"));
    }

    #[tokio::test]
    async fn test_same_format_of_a_new_result_can_be_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let mut fake = FakeBackend::new(Ok(sample_info()));
        fake.download_gate = Some(Arc::clone(&gate));
        let backend = Arc::new(fake);
        let (downloader, _recorder) = session(&backend, dir.path());

        downloader.fetch_info("https://example.com/a").await.unwrap();
        let first = downloader.download("22");
        tokio::pin!(first);
        tokio::select! {
            _ = &mut first => panic!("download finished before release"),
            _ = tokio::task::yield_now() => {}
        }

        downloader.fetch_info("https://example.com/b").await.unwrap();
        assert!(!downloader.state().is_busy("22"));

        let second = downloader.download("22");
        tokio::pin!(second);
        tokio::select! {
            _ = &mut second => panic!("download finished before release"),
            _ = tokio::task::yield_now() => {}
        }
        assert_eq!(backend.download_calls.load(Ordering::SeqCst), 2);
        assert!(downloader.state().is_busy("22"));

        gate.notify_waiters();
        assert!(first.await.unwrap().is_some());
        assert!(second.await.unwrap().is_some());
        assert!(!downloader.state().is_busy("22"));
    }

    #[tokio::test]
    async fn test_state_is_kept_without_a_view() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new(Ok(sample_info())));
        let downloader = Downloader::new(
            Box::new(Arc::clone(&backend)),
            Box::new(crate::downloader::traits::NoopRenderer),
            DownloadOptions {
                output_dir: dir.path().to_path_buf(),
            },
        );

        downloader.fetch_info("https://example.com/v").await.unwrap();
        assert_eq!(downloader.state().result.unwrap().formats.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_still_clears_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeBackend::new(Ok(sample_info()));
        fake.info_gate = Some(Arc::new(Notify::new()));
        let backend = Arc::new(fake);
        let (downloader, _recorder) = session(&backend, dir.path());

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            downloader.fetch_info("https://example.com/v"),
        )
        .await;

        assert!(timed_out.is_err());
        assert!(!downloader.state().loading);
    }
}
