use crate::models::{CourseId, LessonId, ProgressRecord, ProgressStatus};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the remote progress sync
#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The only door to durable watch-progress storage
///
/// `read_cached` is a synchronous local read used for initial-seek resolution;
/// `report` is fire-and-forget — the controller neither awaits nor retries it,
/// and failures stay inside the gateway.
pub trait ProgressGateway: Send + Sync {
    fn read_cached(&self, lesson_id: &str) -> Option<ProgressRecord>;
    fn report(&self, lesson_id: &str, position_seconds: u64, duration_seconds: u64);
}

#[derive(Serialize)]
struct ProgressUpdateRequest<'a> {
    lesson_id: &'a str,
    position_seconds: u64,
    duration_seconds: u64,
}

#[derive(Serialize)]
struct MarkCompleteRequest<'a> {
    lesson_id: &'a str,
    status: ProgressStatus,
}

/// HTTP client for the progress API
#[derive(Clone)]
pub struct ProgressApiClient {
    client: Client,
    url: String,
}

impl ProgressApiClient {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    async fn update(
        &self,
        lesson_id: &str,
        position_seconds: u64,
        duration_seconds: u64,
    ) -> Result<(), ProgressError> {
        self.client
            .post(&self.url)
            .json(&ProgressUpdateRequest {
                lesson_id,
                position_seconds,
                duration_seconds,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn complete(&self, lesson_id: &str) -> Result<(), ProgressError> {
        self.client
            .post(&self.url)
            .json(&MarkCompleteRequest {
                lesson_id,
                status: ProgressStatus::Completed,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

type ProgressKey = (CourseId, LessonId);

/// Progress gateway backed by an in-memory cache and the remote progress API
///
/// The cache gives remounting lesson views an instant resume position; the
/// remote sync runs on a spawned task and is never awaited by callers.
/// Records are keyed by `(course_id, lesson_id)`; one gateway serves one
/// course.
#[derive(Clone)]
pub struct LessonProgressGateway {
    course_id: CourseId,
    cache: Arc<RwLock<HashMap<ProgressKey, ProgressRecord>>>,
    api: ProgressApiClient,
}

impl LessonProgressGateway {
    pub fn new(course_id: CourseId, api: ProgressApiClient) -> Self {
        Self {
            course_id,
            cache: Arc::new(RwLock::new(HashMap::new())),
            api,
        }
    }

    /// Seed the cache with records fetched elsewhere (e.g. the course hub's
    /// initial page load)
    pub fn prime_cache(&self, records: Vec<ProgressRecord>) {
        let mut cache = self.cache.write().unwrap();
        for record in records {
            cache.insert((self.course_id.clone(), record.lesson_id.clone()), record);
        }
    }

    /// Mark a lesson finished. This is the external "mark complete" action;
    /// the controller never drives it.
    pub fn mark_complete(&self, lesson_id: &str) {
        {
            let mut cache = self.cache.write().unwrap();
            let record = cache
                .entry((self.course_id.clone(), lesson_id.to_string()))
                .or_insert_with(|| ProgressRecord {
                    lesson_id: lesson_id.to_string(),
                    last_position_seconds: 0.0,
                    duration_seconds: 0.0,
                    status: ProgressStatus::InProgress,
                    completed_at: None,
                });
            record.status = ProgressStatus::Completed;
            record.completed_at = Some(Utc::now());
        }

        let api = self.api.clone();
        let lesson_id = lesson_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.complete(&lesson_id).await {
                warn!("Failed to sync completion for lesson {}: {}", lesson_id, e);
            }
        });
    }
}

impl ProgressGateway for LessonProgressGateway {
    fn read_cached(&self, lesson_id: &str) -> Option<ProgressRecord> {
        self.cache
            .read()
            .unwrap()
            .get(&(self.course_id.clone(), lesson_id.to_string()))
            .cloned()
    }

    fn report(&self, lesson_id: &str, position_seconds: u64, duration_seconds: u64) {
        {
            let mut cache = self.cache.write().unwrap();
            let record = cache
                .entry((self.course_id.clone(), lesson_id.to_string()))
                .or_insert_with(|| ProgressRecord {
                    lesson_id: lesson_id.to_string(),
                    last_position_seconds: 0.0,
                    duration_seconds: 0.0,
                    status: ProgressStatus::InProgress,
                    completed_at: None,
                });
            // Completion is sticky; position keeps tracking regardless
            record.last_position_seconds = position_seconds as f64;
            record.duration_seconds = duration_seconds as f64;
        }

        debug!(
            "Reporting progress for lesson {}: {}s / {}s",
            lesson_id, position_seconds, duration_seconds
        );

        let api = self.api.clone();
        let lesson_id = lesson_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api.update(&lesson_id, position_seconds, duration_seconds).await {
                warn!("Failed to sync progress for lesson {}: {}", lesson_id, e);
            }
        });
    }
}
