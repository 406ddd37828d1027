//! Learning progress models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-course progress snapshot pushed by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub course_id: Uuid,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub updated_at: DateTime<Utc>,
}

/// Notice that a lesson changed while the user is enrolled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonUpdate {
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}
