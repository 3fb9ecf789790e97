//! # evap-course
//!
//! Course evaluation lifecycle and publish notification fan-out.
//!
//! A [`Course`] moves through a fixed lifecycle (new → prepared →
//! editorApproved → approved → inEvaluation → evaluated → reviewed →
//! published). Every legal move is a row in the [`TRANSITIONS`] table, some
//! of them guarded by business rules. When results or grade documents
//! become available, the [`PublishNotificationAggregator`] decides which
//! users must be told about which courses, one notification per user.
//!
//! ## Key components
//!
//! - [`CourseState`], [`Transition`] — the lifecycle state machine
//! - [`PublishNotificationAggregator`] — per-user notification fan-out
//! - [`PublishNotifier`] — trait for delivering notifications (outbox, log)
//! - [`CourseStore`] — JSON file-based persistence for course records
//! - [`CourseOperations`] — staff bulk operations tying the above together
//! - [`EvapConfig`] — result visibility and user capability settings

pub mod aggregator;
pub mod config;
pub mod course;
pub mod error;
pub mod notify;
pub mod operations;
pub mod state_machine;
pub mod store;

pub use aggregator::{
    editor_review_requests, send_review_requests, CourseLists, DeliveryFailure, DeliveryReport,
    GradePublishing, NotificationPlan, PublishNotificationAggregator, VoterThreshold,
};
pub use config::{EvapConfig, ProjectLayout};
pub use course::{
    Contribution, ContributionId, Course, CourseId, Questionnaire, TextAnswer, TextAnswerId,
    TextAnswerState, User, UserId,
};
pub use error::CourseError;
pub use notify::{
    OutboxEntry, OutboxNotifier, PublishNotification, PublishNotifier, ReviewRequest,
    TracingNotifier,
};
pub use operations::{BulkOperation, BulkOutcome, CourseOperations, OperationPreview, ReviewAction};
pub use state_machine::{CourseState, Guard, Transition, TransitionRule, TRANSITIONS};
pub use store::CourseStore;
