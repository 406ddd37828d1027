//! Course and lesson models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Course summary as returned by the course listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Display name of the instructor
    pub instructor: String,
    pub lesson_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Single lesson within a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    /// Position within the course, 1-based
    pub position: u32,
}

/// Full course payload including its lessons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<Lesson>,
}
