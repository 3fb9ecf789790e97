// operations.rs — Staff operations over stored courses.
//
// CourseOperations is what a staff-facing surface calls. It loads courses
// from the store, drives them through the state machine, saves every course
// whose transition succeeded, and only then hands the result to the
// notification layer. A notification problem is reported alongside the
// outcome; it never undoes a saved transition.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::aggregator::{send_review_requests, DeliveryReport, GradePublishing, PublishNotificationAggregator};
use crate::course::{Course, CourseId, TextAnswerId, TextAnswerState};
use crate::error::CourseError;
use crate::notify::PublishNotifier;
use crate::state_machine::{CourseState, Transition};
use crate::store::CourseStore;

/// Operations offered on a selection of courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    RevertToNew,
    Prepare,
    /// Same transition as `Prepare`, offered for courses editors already approved.
    ReenableLecturerReview,
    Approve,
    Publish,
}

impl BulkOperation {
    pub const ALL: [BulkOperation; 5] = [
        BulkOperation::RevertToNew,
        BulkOperation::Prepare,
        BulkOperation::ReenableLecturerReview,
        BulkOperation::Approve,
        BulkOperation::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperation::RevertToNew => "revertToNew",
            BulkOperation::Prepare => "prepare",
            BulkOperation::ReenableLecturerReview => "reenableLecturerReview",
            BulkOperation::Approve => "approve",
            BulkOperation::Publish => "publish",
        }
    }

    /// The lifecycle transition this operation applies to each course.
    pub fn transition(&self) -> Transition {
        match self {
            BulkOperation::RevertToNew => Transition::RevertToNew,
            BulkOperation::Prepare | BulkOperation::ReenableLecturerReview => Transition::Prepare,
            BulkOperation::Approve => Transition::StaffApprove,
            BulkOperation::Publish => Transition::Publish,
        }
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkOperation {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BulkOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CourseError::UnknownOperation(s.to_string()))
    }
}

/// A staff decision on one text answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Publish,
    MakePrivate,
    Hide,
    Unreview,
}

impl ReviewAction {
    pub fn resulting_state(&self) -> TextAnswerState {
        match self {
            ReviewAction::Publish => TextAnswerState::Published,
            ReviewAction::MakePrivate => TextAnswerState::Private,
            ReviewAction::Hide => TextAnswerState::Hidden,
            ReviewAction::Unreview => TextAnswerState::Unreviewed,
        }
    }
}

impl FromStr for ReviewAction {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(ReviewAction::Publish),
            "make_private" => Ok(ReviewAction::MakePrivate),
            "hide" => Ok(ReviewAction::Hide),
            "unreview" => Ok(ReviewAction::Unreview),
            other => Err(CourseError::UnknownReviewAction(other.to_string())),
        }
    }
}

/// What a bulk operation would do, shown before confirming it.
#[derive(Debug, Clone, Serialize)]
pub struct OperationPreview {
    pub operation: BulkOperation,
    pub course_names: Vec<String>,
    pub current_state: CourseState,
    pub target_state: CourseState,
}

impl OperationPreview {
    pub fn current_state_name(&self) -> &'static str {
        self.current_state.display_name()
    }

    pub fn target_state_name(&self) -> &'static str {
        self.target_state.display_name()
    }
}

/// A course the operation could not move.
#[derive(Debug, Clone, Serialize)]
pub struct FailedCourse {
    pub course_id: CourseId,
    pub error: String,
}

/// Result of a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub operation: BulkOperation,
    pub succeeded: Vec<CourseId>,
    pub failed: Vec<FailedCourse>,
    pub notifications: DeliveryReport,
    /// Set when the notification pass could not run at all.
    pub notification_error: Option<String>,
}

/// Outcome of a text answer review.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub course: Course,
    /// Lifecycle transition applied as a consequence, if any.
    pub applied: Option<Transition>,
}

/// Staff operations backed by a course store and a notifier.
pub struct CourseOperations<'n, P> {
    store: CourseStore,
    aggregator: PublishNotificationAggregator<P>,
    notifier: &'n dyn PublishNotifier,
    today: Option<NaiveDate>,
}

impl<'n, P: GradePublishing> CourseOperations<'n, P> {
    pub fn new(store: CourseStore, policy: P, notifier: &'n dyn PublishNotifier) -> Self {
        Self {
            store,
            aggregator: PublishNotificationAggregator::new(policy),
            notifier,
            today: None,
        }
    }

    /// Evaluate date guards against a fixed day instead of the current date.
    pub fn at_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &CourseStore {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn load_all(&self, ids: &[CourseId]) -> Result<Vec<Course>, CourseError> {
        ids.iter().map(|id| self.store.require(*id)).collect()
    }

    /// Check that the selection can be offered the operation: at least one
    /// course, all in the same state.
    pub fn preview(&self, ids: &[CourseId], operation: BulkOperation) -> Result<OperationPreview, CourseError> {
        let courses = self.load_all(ids)?;
        let first = courses.first().ok_or(CourseError::NoCoursesSelected)?;

        let states: BTreeSet<CourseState> = courses.iter().map(|c| c.state).collect();
        if states.len() > 1 {
            let names: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
            return Err(CourseError::MixedStates {
                states: names.join(", "),
            });
        }

        Ok(OperationPreview {
            operation,
            course_names: courses.iter().map(|c| c.name.clone()).collect(),
            current_state: first.state,
            target_state: operation.transition().rule().target,
        })
    }

    /// Apply the operation to every selected course and notify.
    ///
    /// Courses that reject the transition, or whose save fails, are listed in
    /// `failed` and keep their stored state. Notifications cover exactly the
    /// courses that were saved.
    pub fn run(&self, ids: &[CourseId], operation: BulkOperation) -> Result<BulkOutcome, CourseError> {
        let today = self.today();
        let courses = self.load_all(ids)?;
        if courses.is_empty() {
            return Err(CourseError::NoCoursesSelected);
        }

        let mut moved = Vec::new();
        let mut failed = Vec::new();
        for mut course in courses {
            let applied = course
                .transition(operation.transition(), today)
                .and_then(|_| self.store.save(&course));
            match applied {
                Ok(()) => moved.push(course),
                Err(e) => {
                    tracing::warn!(course_id = %course.id, %operation, "course skipped: {}", e);
                    failed.push(FailedCourse {
                        course_id: course.id,
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            %operation,
            succeeded = moved.len(),
            failed = failed.len(),
            "bulk operation applied"
        );

        let mut outcome = BulkOutcome {
            operation,
            succeeded: moved.iter().map(|c| c.id).collect(),
            failed,
            notifications: DeliveryReport::default(),
            notification_error: None,
        };

        match operation {
            BulkOperation::Publish => {
                match self.aggregator.send(std::iter::empty(), &moved, self.notifier) {
                    Ok(report) => outcome.notifications = report,
                    Err(e) => {
                        tracing::error!(%operation, "publish notifications not sent: {}", e);
                        outcome.notification_error = Some(e.to_string());
                    }
                }
            }
            BulkOperation::Prepare | BulkOperation::ReenableLecturerReview => {
                outcome.notifications = send_review_requests(&moved, self.notifier);
            }
            BulkOperation::RevertToNew | BulkOperation::Approve => {}
        }

        Ok(outcome)
    }

    /// Tell participants that grade documents for these courses are available.
    pub fn publish_grade_documents(&self, ids: &[CourseId]) -> Result<DeliveryReport, CourseError> {
        let courses = self.load_all(ids)?;
        self.aggregator.send(&courses, std::iter::empty(), self.notifier)
    }

    /// Take a published course back to `reviewed`.
    pub fn unpublish(&self, id: CourseId) -> Result<Course, CourseError> {
        self.store.transition(id, Transition::Revoke, self.today())
    }

    /// Record a review decision on one text answer, then move the course
    /// between `evaluated` and `reviewed` if its review status changed.
    pub fn review_text_answer(
        &self,
        course_id: CourseId,
        answer_id: TextAnswerId,
        action: ReviewAction,
    ) -> Result<ReviewOutcome, CourseError> {
        let today = self.today();
        let mut course = self.store.require(course_id)?;
        let answer = course
            .text_answer_mut(answer_id)
            .ok_or(CourseError::UnknownTextAnswer {
                course_id,
                answer_id,
            })?;
        answer.state = action.resulting_state();

        let follow_up = match course.state {
            CourseState::Evaluated if course.is_fully_reviewed() => Some(Transition::ReviewFinished),
            CourseState::Reviewed if !course.is_fully_reviewed() => Some(Transition::ReopenReview),
            _ => None,
        };
        if let Some(transition) = follow_up {
            course.transition(transition, today)?;
        }

        self.store.save(&course)?;
        Ok(ReviewOutcome {
            course,
            applied: follow_up,
        })
    }

    /// After a staff edit: reopen an `evaluated`/`reviewed` course whose
    /// evaluation window is still open. Returns whether it was reopened.
    pub fn reopen_evaluation_if_running(&self, id: CourseId) -> Result<bool, CourseError> {
        let today = self.today();
        let mut course = self.store.require(id)?;
        let reopenable = matches!(course.state, CourseState::Evaluated | CourseState::Reviewed)
            && course.is_in_evaluation_period(today);
        if !reopenable {
            return Ok(false);
        }
        course.transition(Transition::ReopenEvaluation, today)?;
        self.store.save(&course)?;
        Ok(true)
    }
}
