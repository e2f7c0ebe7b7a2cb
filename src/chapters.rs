use crate::events::{EventBus, PlayerEvent};
use crate::models::{Chapter, ChapterId, LessonId, PlaybackId};
use crate::state::VideoStateStore;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Errors from the chapter/transcript service
#[derive(Error, Debug)]
pub enum ChapterError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chapter service error: {0}")]
    Service(String),
}

/// Chapter-fetch lifecycle, retryable on failure
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterLoadState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Deserialize)]
struct ChaptersResponse {
    #[serde(default)]
    chapters: Option<Vec<Chapter>>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the chapter/transcript service
#[derive(Clone)]
pub struct ChapterApiClient {
    client: Client,
    url: String,
}

impl ChapterApiClient {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    pub async fn fetch(
        &self,
        playback_id: &str,
        lesson_id: &str,
    ) -> Result<Vec<Chapter>, ChapterError> {
        let response: ChaptersResponse = self
            .client
            .get(&self.url)
            .query(&[("playbackId", playback_id), ("lessonId", lesson_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(message) = response.error {
            return Err(ChapterError::Service(message));
        }
        Ok(response.chapters.unwrap_or_default())
    }
}

/// The chapter whose timestamp is the latest one not exceeding the current
/// time (reverse scan, first hit wins)
fn active_chapter_for(chapters: &[Chapter], time_seconds: f64) -> Option<ChapterId> {
    chapters
        .iter()
        .rev()
        .find(|chapter| chapter.timestamp_seconds as f64 <= time_seconds)
        .map(|chapter| chapter.id.clone())
}

/// Fetches a lesson's chapters, keeps the active chapter in sync with the
/// playback position, and exposes jump-to-chapter
///
/// Only reads the store's time stream and writes `chapters` /
/// `active_chapter_id`; duration, playing and error belong to the controller.
pub struct ChapterNavigator {
    lesson_id: LessonId,
    playback_id: PlaybackId,
    store: VideoStateStore,
    bus: EventBus,
    api: ChapterApiClient,
    load_state: Arc<Mutex<ChapterLoadState>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ChapterNavigator {
    /// Create a navigator and start tracking the active chapter against the
    /// store's time stream
    pub fn new(
        lesson_id: LessonId,
        playback_id: PlaybackId,
        store: VideoStateStore,
        bus: EventBus,
        api: ChapterApiClient,
    ) -> Self {
        let navigator = ChapterNavigator {
            lesson_id,
            playback_id,
            store: store.clone(),
            bus,
            api,
            load_state: Arc::new(Mutex::new(ChapterLoadState::Loading)),
            watcher: Mutex::new(None),
        };

        let mut time_rx = store.watch_time();
        let watcher_store = store;
        let watcher = tokio::spawn(async move {
            while time_rx.changed().await.is_ok() {
                let time = *time_rx.borrow();
                let chapters = watcher_store.chapters();
                let active = active_chapter_for(&chapters, time);
                if active != watcher_store.active_chapter_id() {
                    watcher_store.set_active_chapter(active);
                }
            }
        });
        *navigator.watcher.lock().unwrap() = Some(watcher);

        navigator
    }

    pub fn load_state(&self) -> ChapterLoadState {
        self.load_state.lock().unwrap().clone()
    }

    /// Fetch the chapter list and publish it into the store
    pub async fn load(&self) {
        *self.load_state.lock().unwrap() = ChapterLoadState::Loading;

        match self.api.fetch(&self.playback_id, &self.lesson_id).await {
            Ok(mut chapters) => {
                chapters.sort_by_key(|chapter| chapter.timestamp_seconds);
                debug!(
                    "Loaded {} chapters for lesson {}",
                    chapters.len(),
                    self.lesson_id
                );
                let active = active_chapter_for(&chapters, self.store.current_time_seconds());
                self.store.set_chapters(chapters);
                self.store.set_active_chapter(active);
                *self.load_state.lock().unwrap() = ChapterLoadState::Ready;
            }
            Err(e) => {
                warn!("Chapter fetch failed for lesson {}: {}", self.lesson_id, e);
                *self.load_state.lock().unwrap() = ChapterLoadState::Error(e.to_string());
            }
        }
    }

    /// Re-enter loading after a failed fetch
    pub async fn retry(&self) {
        self.load().await;
    }

    /// Jump playback to a chapter
    ///
    /// Highlights the chapter immediately, then seeks through both paths:
    /// the store's registered element (if this session holds one) and a bus
    /// dispatch that reaches the controller, which can resolve the element
    /// on its own. Redundant seeks to the same time are harmless.
    pub fn jump_to(&self, chapter_id: &str, timestamp_seconds: u32) {
        self.store
            .set_active_chapter(Some(chapter_id.to_string()));

        let time_seconds = timestamp_seconds as f64;
        self.store.seek_to(time_seconds);
        self.bus.dispatch(PlayerEvent::SeekTo {
            lesson_id: self.lesson_id.clone(),
            time_seconds,
        });
    }

    /// Stop tracking the time stream
    pub fn detach(&self) {
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            watcher.abort();
        }
    }
}

impl Drop for ChapterNavigator {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, timestamp: u32) -> Chapter {
        Chapter {
            id: id.to_string(),
            title: format!("Chapter {}", id),
            timestamp_seconds: timestamp,
            description: None,
        }
    }

    fn test_chapters() -> Vec<Chapter> {
        vec![chapter("c0", 0), chapter("c30", 30), chapter("c90", 90)]
    }

    #[test]
    fn test_active_chapter_between_timestamps() {
        let chapters = test_chapters();
        assert_eq!(active_chapter_for(&chapters, 45.0).as_deref(), Some("c30"));
    }

    #[test]
    fn test_active_chapter_just_before_boundary() {
        let chapters = test_chapters();
        assert_eq!(active_chapter_for(&chapters, 89.9).as_deref(), Some("c30"));
    }

    #[test]
    fn test_active_chapter_at_boundary() {
        let chapters = test_chapters();
        assert_eq!(active_chapter_for(&chapters, 90.0).as_deref(), Some("c90"));
    }

    #[test]
    fn test_active_chapter_at_zero() {
        let chapters = test_chapters();
        assert_eq!(active_chapter_for(&chapters, 0.0).as_deref(), Some("c0"));
    }

    #[test]
    fn test_no_active_chapter_before_first() {
        let chapters = vec![chapter("c10", 10)];
        assert_eq!(active_chapter_for(&chapters, 5.0), None);
    }

    #[test]
    fn test_no_chapters_no_active() {
        assert_eq!(active_chapter_for(&[], 45.0), None);
    }
}
