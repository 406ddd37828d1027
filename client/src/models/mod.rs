//! Client-side data models

pub mod chat;
pub mod course;
pub mod notification;
pub mod preferences;
pub mod progress;
pub mod user;

// Re-export for convenience
pub use chat::{ChatMessage, TypingEvent};
pub use course::{Course, CourseDetail, Lesson};
pub use notification::Notification;
pub use preferences::UiPreferences;
pub use progress::{LessonUpdate, ProgressUpdate};
pub use user::{Role, User};
