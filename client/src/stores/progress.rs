//! Learning progress store

use crate::models::{LessonUpdate, ProgressUpdate};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct ProgressState {
    /// Latest progress snapshot per course
    courses: HashMap<Uuid, ProgressUpdate>,
    /// Latest change notice per lesson
    lessons: HashMap<Uuid, LessonUpdate>,
}

/// Per-course progress and lesson change notices
#[derive(Clone, Default)]
pub struct ProgressStore {
    inner: Arc<RwLock<ProgressState>>,
}

impl ProgressStore {
    /// Record a course progress snapshot, replacing the previous one
    pub fn apply_progress(&self, update: ProgressUpdate) {
        self.inner.write().courses.insert(update.course_id, update);
    }

    /// Record a lesson change notice, replacing the previous one
    pub fn apply_lesson(&self, update: LessonUpdate) {
        self.inner.write().lessons.insert(update.lesson_id, update);
    }

    /// Latest progress for a course, if any update arrived
    pub fn course_progress(&self, course_id: Uuid) -> Option<ProgressUpdate> {
        self.inner.read().courses.get(&course_id).cloned()
    }

    /// Latest change notice for a lesson
    pub fn lesson_update(&self, lesson_id: Uuid) -> Option<LessonUpdate> {
        self.inner.read().lessons.get(&lesson_id).cloned()
    }

    /// Drop everything
    pub fn clear(&self) {
        *self.inner.write() = ProgressState::default();
    }
}
