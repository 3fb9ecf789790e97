// notify.rs — Notification payloads and delivery sinks.
//
// The aggregator decides who hears about what; a PublishNotifier carries it
// out. Two sinks ship with the crate:
//   - OutboxNotifier appends one JSON line per notification to an outbox
//     file, from which a mail transport can pick them up.
//   - TracingNotifier only logs.
// Sink errors are reported back to the caller, which logs them and moves on
// to the next user.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::course::{Course, CourseId, User, UserId};
use crate::error::CourseError;

/// Everything one user is told after a publish: grade documents and
/// evaluation results, in no particular order.
#[derive(Debug, Clone)]
pub struct PublishNotification<'a> {
    pub user: &'a User,
    pub grade_document_courses: Vec<&'a Course>,
    pub evaluation_results_courses: Vec<&'a Course>,
}

/// Asks an editor to review the courses that were just prepared.
#[derive(Debug, Clone)]
pub struct ReviewRequest<'a> {
    pub user: &'a User,
    pub courses: Vec<&'a Course>,
}

/// Receives notifications for delivery.
pub trait PublishNotifier: Send {
    fn send_publish_notification(&self, notification: &PublishNotification<'_>) -> Result<(), CourseError>;

    fn send_review_request(&self, request: &ReviewRequest<'_>) -> Result<(), CourseError>;
}

/// Identity of a recipient as written to the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// A course as referenced in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub course_id: CourseId,
    pub name: String,
}

impl From<&Course> for CourseRef {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id,
            name: course.name.clone(),
        }
    }
}

fn course_refs(courses: &[&Course]) -> Vec<CourseRef> {
    courses.iter().map(|c| CourseRef::from(*c)).collect()
}

/// One line of the outbox file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboxEntry {
    PublishNotification {
        recipient: Recipient,
        grade_document_courses: Vec<CourseRef>,
        evaluation_results_courses: Vec<CourseRef>,
        timestamp: DateTime<Utc>,
    },
    ReviewRequest {
        recipient: Recipient,
        courses: Vec<CourseRef>,
        timestamp: DateTime<Utc>,
    },
}

impl OutboxEntry {
    pub fn recipient(&self) -> &Recipient {
        match self {
            OutboxEntry::PublishNotification { recipient, .. } => recipient,
            OutboxEntry::ReviewRequest { recipient, .. } => recipient,
        }
    }
}

/// Appends notifications as JSONL to an outbox file.
///
/// Users without an email address cannot be reached; those sends fail.
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn recipient(user: &User) -> Result<Recipient, CourseError> {
        let email = user.email.clone().ok_or_else(|| {
            CourseError::NotificationError(format!(
                "user '{}' has no email address",
                user.username
            ))
        })?;
        Ok(Recipient {
            user_id: user.id,
            username: user.username.clone(),
            email,
        })
    }

    fn append(&self, entry: &OutboxEntry) -> Result<(), CourseError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CourseError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| CourseError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json).map_err(|source| CourseError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }

    /// Read every entry written so far. A missing file is an empty outbox.
    pub fn read_all(&self) -> Result<Vec<OutboxEntry>, CourseError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|source| CourseError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| CourseError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}

impl PublishNotifier for OutboxNotifier {
    fn send_publish_notification(&self, notification: &PublishNotification<'_>) -> Result<(), CourseError> {
        let entry = OutboxEntry::PublishNotification {
            recipient: Self::recipient(notification.user)?,
            grade_document_courses: course_refs(&notification.grade_document_courses),
            evaluation_results_courses: course_refs(&notification.evaluation_results_courses),
            timestamp: Utc::now(),
        };
        self.append(&entry)
    }

    fn send_review_request(&self, request: &ReviewRequest<'_>) -> Result<(), CourseError> {
        let entry = OutboxEntry::ReviewRequest {
            recipient: Self::recipient(request.user)?,
            courses: course_refs(&request.courses),
            timestamp: Utc::now(),
        };
        self.append(&entry)
    }
}

/// Logs notifications without delivering them (dry runs).
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl PublishNotifier for TracingNotifier {
    fn send_publish_notification(&self, notification: &PublishNotification<'_>) -> Result<(), CourseError> {
        tracing::info!(
            user = %notification.user.username,
            grade_documents = notification.grade_document_courses.len(),
            evaluation_results = notification.evaluation_results_courses.len(),
            "publish notification"
        );
        Ok(())
    }

    fn send_review_request(&self, request: &ReviewRequest<'_>) -> Result<(), CourseError> {
        tracing::info!(
            user = %request.user.username,
            courses = request.courses.len(),
            "review request"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// What a recording sink saw for one publish call.
    #[derive(Debug, Clone)]
    pub struct RecordedPublish {
        pub user_id: UserId,
        pub grade_document_courses: Vec<CourseId>,
        pub evaluation_results_courses: Vec<CourseId>,
    }

    /// Records every call; optionally fails for one user.
    #[derive(Default)]
    pub struct RecordingNotifier {
        publish: RefCell<Vec<RecordedPublish>>,
        reviews: RefCell<Vec<(UserId, Vec<CourseId>)>>,
        fail_for: Option<UserId>,
    }

    impl RecordingNotifier {
        pub fn failing_for(user_id: UserId) -> Self {
            Self {
                fail_for: Some(user_id),
                ..Self::default()
            }
        }

        pub fn publish_calls(&self) -> Vec<RecordedPublish> {
            self.publish.borrow().clone()
        }

        pub fn review_calls(&self) -> Vec<(UserId, Vec<CourseId>)> {
            self.reviews.borrow().clone()
        }

        fn check(&self, user: &User) -> Result<(), CourseError> {
            if self.fail_for == Some(user.id) {
                return Err(CourseError::NotificationError("mailbox unavailable".into()));
            }
            Ok(())
        }
    }

    impl PublishNotifier for RecordingNotifier {
        fn send_publish_notification(&self, notification: &PublishNotification<'_>) -> Result<(), CourseError> {
            self.check(notification.user)?;
            self.publish.borrow_mut().push(RecordedPublish {
                user_id: notification.user.id,
                grade_document_courses: notification.grade_document_courses.iter().map(|c| c.id).collect(),
                evaluation_results_courses: notification
                    .evaluation_results_courses
                    .iter()
                    .map(|c| c.id)
                    .collect(),
            });
            Ok(())
        }

        fn send_review_request(&self, request: &ReviewRequest<'_>) -> Result<(), CourseError> {
            self.check(request.user)?;
            self.reviews
                .borrow_mut()
                .push((request.user.id, request.courses.iter().map(|c| c.id).collect()));
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) use testing::RecordingNotifier;
