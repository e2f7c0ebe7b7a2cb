use crate::media::MediaHandle;
use crate::models::{Chapter, ChapterId, LessonId, Orientation, PlaybackId};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;

/// Canonical state of the currently active video
///
/// One live instance per mounted lesson view; fields go back to defaults on
/// teardown. Values come straight from the media element — the store does not
/// clamp `current_time_seconds` against `duration_seconds`.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub is_loading: bool,
    pub is_playing: bool,
    pub error: Option<String>,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub active_lesson_id: Option<LessonId>,
    pub active_playback_id: Option<PlaybackId>,
    pub chapters: Vec<Chapter>,
    pub active_chapter_id: Option<ChapterId>,
    pub aspect_ratio: Option<f64>,
    pub orientation: Option<Orientation>,
}

struct StoreInner {
    state: Mutex<PlaybackState>,
    time_tx: watch::Sender<f64>,
    media: Mutex<Option<Arc<dyn MediaHandle>>>,
}

/// Shared, observable playback state for one lesson-viewing session
///
/// Cloneable handle; the controller writes time/duration/playing/error while
/// chapter navigation only reads the time stream and writes
/// chapters/active_chapter_id, so the two never contend on the same fields.
///
/// Setting the active lesson or playback id does NOT reset time and duration:
/// the same store survives a seek without a lesson change, so callers switching
/// lessons must call [`VideoStateStore::reset_video_state`] themselves.
#[derive(Clone)]
pub struct VideoStateStore {
    inner: Arc<StoreInner>,
}

impl Default for VideoStateStore {
    fn default() -> Self {
        let (time_tx, _) = watch::channel(0.0);
        VideoStateStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(PlaybackState::default()),
                time_tx,
                media: Mutex::new(None),
            }),
        }
    }
}

impl VideoStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only projection of the full state for rendering
    pub fn snapshot(&self) -> PlaybackState {
        self.inner.state.lock().unwrap().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().unwrap().is_loading
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().unwrap().is_playing
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().unwrap().error.clone()
    }

    pub fn current_time_seconds(&self) -> f64 {
        self.inner.state.lock().unwrap().current_time_seconds
    }

    pub fn duration_seconds(&self) -> f64 {
        self.inner.state.lock().unwrap().duration_seconds
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.inner.state.lock().unwrap().chapters.clone()
    }

    pub fn active_chapter_id(&self) -> Option<ChapterId> {
        self.inner.state.lock().unwrap().active_chapter_id.clone()
    }

    pub fn set_loading(&self, loading: bool) {
        self.inner.state.lock().unwrap().is_loading = loading;
    }

    pub fn set_playing(&self, playing: bool) {
        self.inner.state.lock().unwrap().is_playing = playing;
    }

    /// Record a playback error. Loading is cleared alongside the error;
    /// time, duration and chapters are left untouched.
    pub fn set_error(&self, message: impl Into<String>) {
        let mut state = self.inner.state.lock().unwrap();
        state.error = Some(message.into());
        state.is_loading = false;
    }

    pub fn clear_error(&self) {
        self.inner.state.lock().unwrap().error = None;
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.inner.state.lock().unwrap().current_time_seconds = seconds;
        let _ = self.inner.time_tx.send(seconds);
    }

    pub fn set_duration(&self, seconds: f64) {
        self.inner.state.lock().unwrap().duration_seconds = seconds;
    }

    pub fn set_active_lesson(&self, lesson_id: LessonId) {
        self.inner.state.lock().unwrap().active_lesson_id = Some(lesson_id);
    }

    pub fn set_active_playback(&self, playback_id: PlaybackId) {
        self.inner.state.lock().unwrap().active_playback_id = Some(playback_id);
    }

    pub fn set_chapters(&self, chapters: Vec<Chapter>) {
        self.inner.state.lock().unwrap().chapters = chapters;
    }

    pub fn set_active_chapter(&self, chapter_id: Option<ChapterId>) {
        self.inner.state.lock().unwrap().active_chapter_id = chapter_id;
    }

    pub fn set_video_shape(&self, aspect_ratio: f64, orientation: Orientation) {
        let mut state = self.inner.state.lock().unwrap();
        state.aspect_ratio = Some(aspect_ratio);
        state.orientation = Some(orientation);
    }

    /// Stream of `current_time_seconds` updates, consumed by chapter navigation
    pub fn watch_time(&self) -> watch::Receiver<f64> {
        self.inner.time_tx.subscribe()
    }

    /// Hold the resolved media element so [`VideoStateStore::seek_to`] can
    /// drive it
    pub fn register_media(&self, media: Arc<dyn MediaHandle>) {
        *self.inner.media.lock().unwrap() = Some(media);
    }

    pub fn clear_media(&self) {
        *self.inner.media.lock().unwrap() = None;
    }

    /// Imperatively move the registered element's position
    ///
    /// A no-op when no element is registered — the seek is not queued.
    pub fn seek_to(&self, seconds: f64) {
        let media = self.inner.media.lock().unwrap().clone();
        match media {
            Some(media) => media.set_current_time(seconds),
            None => debug!("seek_to({seconds}) ignored, no media element registered"),
        }
    }

    /// Restore every field to its default
    pub fn reset_video_state(&self) {
        *self.inner.state.lock().unwrap() = PlaybackState::default();
        let _ = self.inner.time_tx.send(0.0);
    }
}
