// error.rs — Error types for the course lifecycle subsystem.

use thiserror::Error;

use crate::course::{CourseId, TextAnswerId};

/// Errors that can occur during course lifecycle and notification operations.
#[derive(Debug, Error)]
pub enum CourseError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize course data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The config file exists but could not be parsed.
    #[error("invalid config at {path}: {reason}")]
    ConfigError { path: String, reason: String },

    /// The requested course was not found.
    #[error("course not found: {0}")]
    NotFound(CourseId),

    /// The transition is not legal from the course's current state, or its
    /// guard condition does not hold. The course state is left untouched.
    #[error("invalid transition '{transition}' from state {from} for course {course_id}: {reason}")]
    InvalidTransition {
        course_id: CourseId,
        transition: String,
        from: String,
        reason: String,
    },

    /// A course handed to the aggregator is missing data it must have
    /// (general or responsible contribution). This is a caller bug.
    #[error("precondition violated for course {course_id}: {reason}")]
    PreconditionViolation { course_id: CourseId, reason: String },

    /// A bulk operation name outside the supported set.
    #[error("unsupported operation: {0}")]
    UnknownOperation(String),

    /// A review action name outside the supported set.
    #[error("unsupported review action: {0}")]
    UnknownReviewAction(String),

    /// A bulk operation was requested with no courses.
    #[error("no courses selected")]
    NoCoursesSelected,

    /// The selected courses do not all share the same current state.
    #[error("selected courses are in different states: {states}")]
    MixedStates { states: String },

    /// The text answer does not belong to the given course.
    #[error("text answer {answer_id} not found in course {course_id}")]
    UnknownTextAnswer {
        course_id: CourseId,
        answer_id: TextAnswerId,
    },

    /// A notification delivery failed (non-fatal to the caller).
    #[error("notification error: {0}")]
    NotificationError(String),
}
