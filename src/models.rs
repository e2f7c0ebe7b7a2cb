use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a lesson within a course
pub type LessonId = String;
/// Identifier of a course
pub type CourseId = String;
/// Opaque identifier the streaming platform uses to address a lesson's video
pub type PlaybackId = String;
/// Identifier of a chapter within a lesson
pub type ChapterId = String;

/// A chapter marker inside a lesson's video
///
/// Fetched from the transcript service and immutable afterwards. Chapters are
/// ordered ascending by `timestamp_seconds`; timestamps are expected distinct.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    #[serde(rename = "timestamp")]
    pub timestamp_seconds: u32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Completion status of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

/// How far into a lesson the user has watched
///
/// Keyed by `(course_id, lesson_id)` in the gateway cache. Created lazily on
/// the first progress report and never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub lesson_id: LessonId,
    pub last_position_seconds: f64,
    pub duration_seconds: f64,
    pub status: ProgressStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Natural orientation of the video, derived once from reported width/height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn from_size(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}
