// state_machine.rs — Course lifecycle states and the transition table.
//
// The lifecycle runs forward:
//   new → prepared → editorApproved → approved → inEvaluation
//     → evaluated → reviewed → published
// with explicit backward edges (revertToNew, reopenReview,
// reopenEvaluation, revoke). Every legal move is one row of TRANSITIONS:
// a transition name, the states it may start from, the state it lands in,
// and an optional guard evaluated against the course. `Course::transition`
// is the single dispatch routine; it either applies the whole row or leaves
// the course untouched.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::course::Course;
use crate::error::CourseError;

/// The lifecycle state of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CourseState {
    New,
    Prepared,
    EditorApproved,
    Approved,
    InEvaluation,
    Evaluated,
    Reviewed,
    Published,
}

impl CourseState {
    /// All states in lifecycle order, used for progress display.
    pub const ORDERED: [CourseState; 8] = [
        CourseState::New,
        CourseState::Prepared,
        CourseState::EditorApproved,
        CourseState::Approved,
        CourseState::InEvaluation,
        CourseState::Evaluated,
        CourseState::Reviewed,
        CourseState::Published,
    ];

    /// Wire name, as stored in course files.
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseState::New => "new",
            CourseState::Prepared => "prepared",
            CourseState::EditorApproved => "editorApproved",
            CourseState::Approved => "approved",
            CourseState::InEvaluation => "inEvaluation",
            CourseState::Evaluated => "evaluated",
            CourseState::Reviewed => "reviewed",
            CourseState::Published => "published",
        }
    }

    /// Human-readable name for listings and operation previews.
    pub fn display_name(&self) -> &'static str {
        match self {
            CourseState::New => "new",
            CourseState::Prepared => "prepared",
            CourseState::EditorApproved => "editor approved",
            CourseState::Approved => "approved",
            CourseState::InEvaluation => "in evaluation",
            CourseState::Evaluated => "evaluated",
            CourseState::Reviewed => "reviewed",
            CourseState::Published => "published",
        }
    }

    /// Position in `ORDERED`.
    pub fn progress(&self) -> usize {
        *self as usize
    }

    /// Transitions whose source list contains this state (guards not checked).
    pub fn transitions_from(&self) -> Vec<Transition> {
        TRANSITIONS
            .iter()
            .filter(|rule| rule.sources.contains(self))
            .map(|rule| rule.transition)
            .collect()
    }
}

impl fmt::Display for CourseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CourseState::ORDERED
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown course state '{}'", s))
    }
}

/// A named lifecycle move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    RevertToNew,
    /// Hand the course to its editors (a.k.a. readyForEditors).
    Prepare,
    EditorApprove,
    StaffApprove,
    StartEvaluation,
    EndEvaluation,
    ReviewFinished,
    ReopenReview,
    ReopenEvaluation,
    Publish,
    Revoke,
}

impl Transition {
    pub const ALL: [Transition; 11] = [
        Transition::RevertToNew,
        Transition::Prepare,
        Transition::EditorApprove,
        Transition::StaffApprove,
        Transition::StartEvaluation,
        Transition::EndEvaluation,
        Transition::ReviewFinished,
        Transition::ReopenReview,
        Transition::ReopenEvaluation,
        Transition::Publish,
        Transition::Revoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::RevertToNew => "revertToNew",
            Transition::Prepare => "prepare",
            Transition::EditorApprove => "editorApprove",
            Transition::StaffApprove => "staffApprove",
            Transition::StartEvaluation => "startEvaluation",
            Transition::EndEvaluation => "endEvaluation",
            Transition::ReviewFinished => "reviewFinished",
            Transition::ReopenReview => "reopenReview",
            Transition::ReopenEvaluation => "reopenEvaluation",
            Transition::Publish => "publish",
            Transition::Revoke => "revoke",
        }
    }

    /// The table row for this transition.
    pub fn rule(&self) -> &'static TransitionRule {
        // TRANSITIONS is laid out in declaration order.
        &TRANSITIONS[*self as usize]
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "readyForEditors" {
            return Ok(Transition::Prepare);
        }
        Transition::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transition '{}'", s))
    }
}

/// A business-rule condition attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Every contribution, the general one included, has a non-obsolete questionnaire.
    HasEnoughQuestionnaires,
    /// No text answer is still unreviewed.
    FullyReviewed,
    /// At least one text answer is unreviewed again.
    NotFullyReviewed,
    /// Today lies within the course's evaluation window.
    InEvaluationPeriod,
}

impl Guard {
    pub fn holds(&self, course: &Course, today: NaiveDate) -> bool {
        match self {
            Guard::HasEnoughQuestionnaires => course.has_enough_questionnaires(),
            Guard::FullyReviewed => course.is_fully_reviewed(),
            Guard::NotFullyReviewed => !course.is_fully_reviewed(),
            Guard::InEvaluationPeriod => course.is_in_evaluation_period(today),
        }
    }

    /// Why the guard blocked a transition.
    fn failure_reason(&self) -> &'static str {
        match self {
            Guard::HasEnoughQuestionnaires => "not every contribution has a questionnaire assigned",
            Guard::FullyReviewed => "course still has unreviewed text answers",
            Guard::NotFullyReviewed => "course has no unreviewed text answers",
            Guard::InEvaluationPeriod => "course is outside its evaluation period",
        }
    }
}

/// One row of the transition table.
#[derive(Debug)]
pub struct TransitionRule {
    pub transition: Transition,
    pub sources: &'static [CourseState],
    pub target: CourseState,
    pub guard: Option<Guard>,
}

use CourseState as S;

/// The complete transition table, one row per `Transition`, in declaration order.
pub static TRANSITIONS: [TransitionRule; 11] = [
    TransitionRule {
        transition: Transition::RevertToNew,
        sources: &[
            S::Prepared,
            S::EditorApproved,
            S::Approved,
            S::InEvaluation,
            S::Evaluated,
            S::Reviewed,
        ],
        target: S::New,
        guard: None,
    },
    TransitionRule {
        transition: Transition::Prepare,
        sources: &[S::New, S::EditorApproved],
        target: S::Prepared,
        guard: None,
    },
    TransitionRule {
        transition: Transition::EditorApprove,
        sources: &[S::Prepared],
        target: S::EditorApproved,
        guard: None,
    },
    TransitionRule {
        transition: Transition::StaffApprove,
        sources: &[S::New, S::Prepared, S::EditorApproved],
        target: S::Approved,
        guard: Some(Guard::HasEnoughQuestionnaires),
    },
    TransitionRule {
        transition: Transition::StartEvaluation,
        sources: &[S::Approved],
        target: S::InEvaluation,
        guard: Some(Guard::InEvaluationPeriod),
    },
    TransitionRule {
        transition: Transition::EndEvaluation,
        sources: &[S::InEvaluation],
        target: S::Evaluated,
        guard: None,
    },
    TransitionRule {
        transition: Transition::ReviewFinished,
        sources: &[S::Evaluated],
        target: S::Reviewed,
        guard: Some(Guard::FullyReviewed),
    },
    TransitionRule {
        transition: Transition::ReopenReview,
        sources: &[S::Reviewed],
        target: S::Evaluated,
        guard: Some(Guard::NotFullyReviewed),
    },
    TransitionRule {
        transition: Transition::ReopenEvaluation,
        sources: &[S::Evaluated, S::Reviewed],
        target: S::InEvaluation,
        guard: Some(Guard::InEvaluationPeriod),
    },
    TransitionRule {
        transition: Transition::Publish,
        sources: &[S::Reviewed],
        target: S::Published,
        guard: None,
    },
    TransitionRule {
        transition: Transition::Revoke,
        sources: &[S::Published],
        target: S::Reviewed,
        guard: None,
    },
];

impl Course {
    /// Check a transition without applying it.
    pub fn check_transition(&self, transition: Transition, today: NaiveDate) -> Result<CourseState, CourseError> {
        let rule = transition.rule();
        let reject = |reason: String| CourseError::InvalidTransition {
            course_id: self.id,
            transition: transition.to_string(),
            from: self.state.to_string(),
            reason,
        };

        if self.state == rule.target {
            return Err(reject(format!("course is already {}", rule.target)));
        }
        if !rule.sources.contains(&self.state) {
            return Err(reject(format!("not allowed from state {}", self.state)));
        }
        if let Some(guard) = rule.guard {
            if !guard.holds(self, today) {
                return Err(reject(guard.failure_reason().to_string()));
            }
        }
        Ok(rule.target)
    }

    /// Apply a transition, evaluating date guards against `today`.
    ///
    /// Returns the state the course left. On error the state is unchanged.
    pub fn transition(&mut self, transition: Transition, today: NaiveDate) -> Result<CourseState, CourseError> {
        let target = self.check_transition(transition, today)?;
        let previous = self.state;
        self.state = target;
        self.updated_at = Utc::now();
        tracing::info!(
            course_id = %self.id,
            %transition,
            from = %previous,
            to = %target,
            "course transitioned"
        );
        Ok(previous)
    }

    /// Apply a transition using the current UTC date for date guards.
    pub fn transition_now(&mut self, transition: Transition) -> Result<CourseState, CourseError> {
        self.transition(transition, Utc::now().date_naive())
    }
}
