// course.rs — Course, Contribution, TextAnswer and User records.
//
// A Course exclusively owns its contributions and text answers. A
// Contribution keeps the owning course's id as a plain back-reference, and a
// TextAnswer points at its contribution by id; nothing here holds a pointer
// into another record, so a course serializes as one self-contained JSON
// document.
//
// Invariant kept by `Course::new`: exactly one contribution has no
// contributor (the general contribution). Records loaded from disk or built
// by hand may break it; `general_contribution()` and
// `responsible_contributor()` report that as a PreconditionViolation.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CourseError;
use crate::state_machine::CourseState;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_newtype!(
    /// Identifies a course.
    CourseId
);
id_newtype!(
    /// Identifies a contribution within a course.
    ContributionId
);
id_newtype!(
    /// Identifies a user.
    UserId
);
id_newtype!(
    /// Identifies a free-text answer.
    TextAnswerId
);

/// A person who can take part in or contribute to courses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Whether this user's role lets them receive grade documents.
    #[serde(default)]
    pub can_download_grades: bool,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            email: None,
            can_download_grades: false,
        }
    }

    /// Create a user whose grade download capability is derived from the
    /// email domain: only members of `internal_domains` may download.
    pub fn with_email(
        username: impl Into<String>,
        email: impl Into<String>,
        internal_domains: &[String],
    ) -> Self {
        let email = email.into();
        let can_download_grades = email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| {
                internal_domains
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(domain))
            });
        Self {
            id: UserId::new(),
            username: username.into(),
            email: Some(email),
            can_download_grades,
        }
    }
}

/// A questionnaire assigned to a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub name: String,
    /// Obsolete questionnaires no longer count towards approval.
    #[serde(default)]
    pub obsolete: bool,
}

/// One contributor's (or the course's general) share of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,

    /// Back-reference to the owning course.
    pub course_id: CourseId,

    /// `None` marks the general contribution.
    pub contributor: Option<User>,

    /// The organizationally responsible party (e.g. lecturer of record).
    #[serde(default)]
    pub responsible: bool,

    /// Whether the contributor may edit the course during preparation.
    #[serde(default)]
    pub can_edit: bool,

    #[serde(default)]
    pub questionnaires: Vec<Questionnaire>,
}

impl Contribution {
    pub fn new(course_id: CourseId, contributor: Option<User>) -> Self {
        Self {
            id: ContributionId::new(),
            course_id,
            contributor,
            responsible: false,
            can_edit: false,
            questionnaires: Vec::new(),
        }
    }

    pub fn is_general(&self) -> bool {
        self.contributor.is_none()
    }

    pub fn mark_responsible(&mut self) -> &mut Self {
        self.responsible = true;
        self
    }

    pub fn mark_editor(&mut self) -> &mut Self {
        self.can_edit = true;
        self
    }

    pub fn with_questionnaire(&mut self, name: impl Into<String>) -> &mut Self {
        self.questionnaires.push(Questionnaire {
            name: name.into(),
            obsolete: false,
        });
        self
    }

    /// True if at least one assigned questionnaire is still in use.
    pub fn has_active_questionnaire(&self) -> bool {
        self.questionnaires.iter().any(|q| !q.obsolete)
    }
}

/// Review state of a free-text answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAnswerState {
    Unreviewed,
    Published,
    Private,
    Hidden,
}

/// A free-text response attached to one contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnswer {
    pub id: TextAnswerId,
    pub contribution_id: ContributionId,
    pub answer: String,
    pub state: TextAnswerState,
}

/// A course being evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,

    /// Current lifecycle state. Mutated only through `Course::transition`.
    pub state: CourseState,

    /// First day of the evaluation window.
    pub vote_start_date: NaiveDate,

    /// Last day of the evaluation window (inclusive).
    pub vote_end_date: NaiveDate,

    #[serde(default)]
    pub participants: Vec<User>,

    /// How many participants have submitted the evaluation.
    #[serde(default)]
    pub num_voters: u32,

    pub contributions: Vec<Contribution>,

    #[serde(default)]
    pub text_answers: Vec<TextAnswer>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Create a new course in the `new` state with its general contribution.
    pub fn new(name: impl Into<String>, vote_start_date: NaiveDate, vote_end_date: NaiveDate) -> Self {
        let id = CourseId::new();
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            state: CourseState::New,
            vote_start_date,
            vote_end_date,
            participants: Vec::new(),
            num_voters: 0,
            contributions: vec![Contribution::new(id, None)],
            text_answers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_participant(&mut self, user: User) {
        if !self.participants.iter().any(|p| p.id == user.id) {
            self.participants.push(user);
        }
    }

    /// Add a named contribution and return it for further setup.
    pub fn add_contributor(&mut self, user: User) -> &mut Contribution {
        let idx = self.contributions.len();
        self.contributions.push(Contribution::new(self.id, Some(user)));
        &mut self.contributions[idx]
    }

    /// Attach an unreviewed text answer to one of this course's contributions.
    pub fn add_text_answer(
        &mut self,
        contribution_id: ContributionId,
        answer: impl Into<String>,
    ) -> TextAnswerId {
        let id = TextAnswerId::new();
        self.text_answers.push(TextAnswer {
            id,
            contribution_id,
            answer: answer.into(),
            state: TextAnswerState::Unreviewed,
        });
        id
    }

    pub fn contribution(&self, id: ContributionId) -> Option<&Contribution> {
        self.contributions.iter().find(|c| c.id == id)
    }

    /// The contribution without a contributor.
    pub fn general_contribution(&self) -> Result<&Contribution, CourseError> {
        let mut general = self.contributions.iter().filter(|c| c.is_general());
        match (general.next(), general.next()) {
            (Some(c), None) => Ok(c),
            (None, _) => Err(self.precondition("course has no general contribution")),
            (Some(_), Some(_)) => {
                Err(self.precondition("course has more than one general contribution"))
            }
        }
    }

    pub fn general_contribution_mut(&mut self) -> Option<&mut Contribution> {
        self.contributions.iter_mut().find(|c| c.is_general())
    }

    /// The user behind the single contribution marked responsible.
    pub fn responsible_contributor(&self) -> Result<&User, CourseError> {
        let mut responsible = self
            .contributions
            .iter()
            .filter(|c| c.responsible)
            .filter_map(|c| c.contributor.as_ref());
        match (responsible.next(), responsible.next()) {
            (Some(user), None) => Ok(user),
            (None, _) => Err(self.precondition("course has no responsible contributor")),
            (Some(_), Some(_)) => {
                Err(self.precondition("course has more than one responsible contributor"))
            }
        }
    }

    /// Contributors allowed to edit the course: editors and the responsible party.
    pub fn editors(&self) -> Vec<&User> {
        self.contributions
            .iter()
            .filter(|c| c.can_edit || c.responsible)
            .filter_map(|c| c.contributor.as_ref())
            .collect()
    }

    pub fn text_answer_mut(&mut self, id: TextAnswerId) -> Option<&mut TextAnswer> {
        self.text_answers.iter_mut().find(|a| a.id == id)
    }

    /// Every contribution, the general one included, has a questionnaire in use.
    pub fn has_enough_questionnaires(&self) -> bool {
        self.general_contribution().is_ok()
            && self
                .contributions
                .iter()
                .all(Contribution::has_active_questionnaire)
    }

    /// No text answer is waiting for review.
    pub fn is_fully_reviewed(&self) -> bool {
        self.text_answers
            .iter()
            .all(|a| a.state != TextAnswerState::Unreviewed)
    }

    pub fn is_in_evaluation_period(&self, today: NaiveDate) -> bool {
        self.vote_start_date <= today && today <= self.vote_end_date
    }

    pub fn can_staff_edit(&self) -> bool {
        self.state != CourseState::Published
    }

    pub fn can_staff_delete(&self) -> bool {
        self.can_staff_edit() && self.num_voters == 0
    }

    pub(crate) fn precondition(&self, reason: &str) -> CourseError {
        CourseError::PreconditionViolation {
            course_id: self.id,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_course() -> Course {
        Course::new("Compilers", date(2026, 1, 10), date(2026, 1, 20))
    }

    #[test]
    fn new_course_has_exactly_one_general_contribution() {
        let course = test_course();
        assert_eq!(course.state, CourseState::New);
        assert_eq!(course.contributions.len(), 1);
        let general = course.general_contribution().unwrap();
        assert!(general.is_general());
        assert_eq!(general.course_id, course.id);
    }

    #[test]
    fn responsible_contributor_resolves_single_flagged_contribution() {
        let mut course = test_course();
        let lecturer = User::new("lecturer");
        course.add_contributor(User::new("tutor"));
        course.add_contributor(lecturer.clone()).mark_responsible();
        assert_eq!(course.responsible_contributor().unwrap(), &lecturer);
    }

    #[test]
    fn missing_responsible_contributor_is_precondition_violation() {
        let mut course = test_course();
        course.add_contributor(User::new("tutor"));
        let err = course.responsible_contributor().unwrap_err();
        assert!(matches!(err, CourseError::PreconditionViolation { .. }));
    }

    #[test]
    fn two_responsible_contributors_is_precondition_violation() {
        let mut course = test_course();
        course.add_contributor(User::new("a")).mark_responsible();
        course.add_contributor(User::new("b")).mark_responsible();
        assert!(course.responsible_contributor().is_err());
    }

    #[test]
    fn questionnaires_required_on_every_contribution() {
        let mut course = test_course();
        assert!(!course.has_enough_questionnaires());

        course
            .general_contribution_mut()
            .unwrap()
            .with_questionnaire("general");
        assert!(course.has_enough_questionnaires());

        course.add_contributor(User::new("lecturer")).mark_responsible();
        assert!(!course.has_enough_questionnaires());

        course.contributions[1].questionnaires.push(Questionnaire {
            name: "old".into(),
            obsolete: true,
        });
        assert!(!course.has_enough_questionnaires());

        course.contributions[1].with_questionnaire("lecturer");
        assert!(course.has_enough_questionnaires());
    }

    #[test]
    fn fully_reviewed_tracks_unreviewed_answers() {
        let mut course = test_course();
        assert!(course.is_fully_reviewed());

        let general = course.general_contribution().unwrap().id;
        let answer = course.add_text_answer(general, "great course");
        assert!(!course.is_fully_reviewed());

        course.text_answer_mut(answer).unwrap().state = TextAnswerState::Hidden;
        assert!(course.is_fully_reviewed());
    }

    #[test]
    fn evaluation_period_is_inclusive() {
        let course = test_course();
        assert!(!course.is_in_evaluation_period(date(2026, 1, 9)));
        assert!(course.is_in_evaluation_period(date(2026, 1, 10)));
        assert!(course.is_in_evaluation_period(date(2026, 1, 20)));
        assert!(!course.is_in_evaluation_period(date(2026, 1, 21)));
    }

    #[test]
    fn download_capability_follows_email_domain() {
        let domains = vec!["hpi.de".to_string(), "student.hpi.de".to_string()];
        let internal = User::with_email("student", "student@student.hpi.de", &domains);
        let external = User::with_email("guest", "student@student.nothpi.de", &domains);
        assert!(internal.can_download_grades);
        assert!(!external.can_download_grades);
        assert!(!User::new("no-mail").can_download_grades);
    }

    #[test]
    fn editors_include_responsible_and_flagged_contributors() {
        let mut course = test_course();
        course.add_contributor(User::new("lecturer")).mark_responsible();
        course.add_contributor(User::new("assistant")).mark_editor();
        course.add_contributor(User::new("tutor"));
        let names: Vec<&str> = course.editors().into_iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["lecturer", "assistant"]);
    }

    #[test]
    fn staff_delete_blocked_once_votes_exist() {
        let mut course = test_course();
        assert!(course.can_staff_delete());
        course.num_voters = 3;
        assert!(course.can_staff_edit());
        assert!(!course.can_staff_delete());
    }

    #[test]
    fn participants_are_deduplicated() {
        let mut course = test_course();
        let student = User::new("student");
        course.add_participant(student.clone());
        course.add_participant(student);
        assert_eq!(course.participants.len(), 1);
    }

    #[test]
    fn state_serializes_camel_case() {
        let mut course = test_course();
        course.state = CourseState::EditorApproved;
        let json = serde_json::to_string(&course).unwrap();
        assert!(json.contains("\"editorApproved\""));
        let restored: Course = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state, CourseState::EditorApproved);
        assert_eq!(restored.contributions[0].course_id, course.id);
    }
}
