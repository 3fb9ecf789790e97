// aggregator.rs — Publish notification fan-out.
//
// Given the courses whose grade documents just became available and the
// courses whose evaluation results just finished, work out which users must
// hear about which courses. Every user gets at most one notification
// covering both batches; course sets are deduplicated per user.
//
// Rules for evaluation results:
//   1. Results publishable → every participant and every named contributor.
//   2. Not publishable but the course has text answers → the contributor of
//      each answered contribution, plus the responsible contributor (who
//      sees all comments, including the general ones).
//   3. Neither → nobody.
// Rule for grade documents: every participant allowed to download grades.
//
// Every course in either batch must resolve its general contribution and its
// responsible contributor. The aggregation is a pure pass that fails as a
// whole on a precondition violation before anything is sent. Delivery
// happens afterwards, one call per user, and tolerates individual failures.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::config::ResultsConfig;
use crate::course::{Course, CourseId, User, UserId};
use crate::error::CourseError;
use crate::notify::{PublishNotification, PublishNotifier, ReviewRequest};

/// Decides whether a course's results may be shown to its participants.
///
/// The aggregator treats the answer as an opaque per-course boolean.
pub trait GradePublishing {
    fn can_publish_grades(&self, course: &Course) -> bool;
}

impl<F> GradePublishing for F
where
    F: Fn(&Course) -> bool,
{
    fn can_publish_grades(&self, course: &Course) -> bool {
        self(course)
    }
}

/// Results are visible once enough participants have voted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoterThreshold {
    pub min_voters: u32,
    pub min_voter_percentage: f64,
}

impl From<&ResultsConfig> for VoterThreshold {
    fn from(config: &ResultsConfig) -> Self {
        Self {
            min_voters: config.min_voters,
            min_voter_percentage: config.min_voter_percentage,
        }
    }
}

impl GradePublishing for VoterThreshold {
    fn can_publish_grades(&self, course: &Course) -> bool {
        let participants = course.participants.len();
        if participants == 0 {
            return false;
        }
        course.num_voters >= self.min_voters
            && f64::from(course.num_voters) / participants as f64 >= self.min_voter_percentage
    }
}

/// Per-user accumulator built during one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseLists {
    pub grade_document_courses: BTreeSet<CourseId>,
    pub evaluation_results_courses: BTreeSet<CourseId>,
}

impl CourseLists {
    pub fn new() -> Self {
        Self {
            grade_document_courses: BTreeSet::new(),
            evaluation_results_courses: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grade_document_courses.is_empty() && self.evaluation_results_courses.is_empty()
    }
}

/// The outcome of an aggregation pass: who is told about which courses.
#[derive(Debug)]
pub struct NotificationPlan<'a> {
    users: BTreeMap<UserId, &'a User>,
    lists: BTreeMap<UserId, CourseLists>,
    courses: HashMap<CourseId, &'a Course>,
}

impl<'a> NotificationPlan<'a> {
    fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            lists: BTreeMap::new(),
            courses: HashMap::new(),
        }
    }

    /// Look up the user's accumulator, constructing and inserting a fresh one
    /// on first sight.
    fn lists_for(&mut self, user: &'a User) -> &mut CourseLists {
        if !self.users.contains_key(&user.id) {
            self.users.insert(user.id, user);
        }
        self.lists.entry(user.id).or_insert_with(CourseLists::new)
    }

    fn remember(&mut self, course: &'a Course) {
        self.courses.entry(course.id).or_insert(course);
    }

    /// The accumulator for one user, if that user qualified for anything.
    pub fn lists(&self, user_id: UserId) -> Option<&CourseLists> {
        self.lists.get(&user_id).filter(|lists| !lists.is_empty())
    }

    /// Number of users who will receive a notification.
    pub fn len(&self) -> usize {
        self.lists.values().filter(|lists| !lists.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One notification per user with at least one non-empty course set,
    /// ordered by user id.
    pub fn notifications(&self) -> Vec<PublishNotification<'a>> {
        self.lists
            .iter()
            .filter(|(_, lists)| !lists.is_empty())
            .filter_map(|(user_id, lists)| {
                let user = *self.users.get(user_id)?;
                Some(PublishNotification {
                    user,
                    grade_document_courses: self.resolve(&lists.grade_document_courses),
                    evaluation_results_courses: self.resolve(&lists.evaluation_results_courses),
                })
            })
            .collect()
    }

    fn resolve(&self, ids: &BTreeSet<CourseId>) -> Vec<&'a Course> {
        ids.iter()
            .filter_map(|id| self.courses.get(id).copied())
            .collect()
    }
}

/// A notification that could not be delivered.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub user_id: UserId,
    pub username: String,
    pub error: String,
}

/// Summary of one delivery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    fn record(&mut self, user: &User, result: Result<(), CourseError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                tracing::warn!(user = %user.username, "notification delivery failed: {}", e);
                self.failures.push(DeliveryFailure {
                    user_id: user.id,
                    username: user.username.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }
}

/// Computes and delivers publish notifications.
pub struct PublishNotificationAggregator<P> {
    policy: P,
}

impl<P: GradePublishing> PublishNotificationAggregator<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// Build the notification plan for the two course batches.
    ///
    /// Every course in either batch must have exactly one general
    /// contribution, exactly one responsible contributor, and text answers
    /// that only point at its own contributions. The first course that does
    /// not fails the whole pass with `PreconditionViolation`.
    pub fn aggregate<'a, G, E>(
        &self,
        grade_document_courses: G,
        evaluation_results_courses: E,
    ) -> Result<NotificationPlan<'a>, CourseError>
    where
        G: IntoIterator<Item = &'a Course>,
        E: IntoIterator<Item = &'a Course>,
    {
        let grade_document_courses: Vec<&'a Course> = grade_document_courses.into_iter().collect();
        let evaluation_results_courses: Vec<&'a Course> =
            evaluation_results_courses.into_iter().collect();
        for course in grade_document_courses.iter().chain(&evaluation_results_courses) {
            check_preconditions(course)?;
        }

        let mut plan = NotificationPlan::new();

        for course in evaluation_results_courses {
            plan.remember(course);
            if self.policy.can_publish_grades(course) {
                tracing::debug!(course_id = %course.id, "results publishable, notifying participants and contributors");
                for participant in &course.participants {
                    plan.lists_for(participant)
                        .evaluation_results_courses
                        .insert(course.id);
                }
                for contributor in course.contributions.iter().filter_map(|c| c.contributor.as_ref()) {
                    plan.lists_for(contributor)
                        .evaluation_results_courses
                        .insert(course.id);
                }
            } else if !course.text_answers.is_empty() {
                tracing::debug!(course_id = %course.id, "results not publishable, notifying comment readers");
                for answer in &course.text_answers {
                    let contributor = course
                        .contribution(answer.contribution_id)
                        .and_then(|c| c.contributor.as_ref());
                    if let Some(contributor) = contributor {
                        plan.lists_for(contributor)
                            .evaluation_results_courses
                            .insert(course.id);
                    }
                }
                plan.lists_for(course.responsible_contributor()?)
                    .evaluation_results_courses
                    .insert(course.id);
            } else {
                tracing::debug!(course_id = %course.id, "results not publishable and no comments, skipping");
            }
        }

        for course in grade_document_courses {
            plan.remember(course);
            for participant in course.participants.iter().filter(|p| p.can_download_grades) {
                plan.lists_for(participant)
                    .grade_document_courses
                    .insert(course.id);
            }
        }

        Ok(plan)
    }

    /// Aggregate, then call the notifier exactly once per qualifying user.
    ///
    /// A precondition violation aborts before any notification is sent.
    /// Individual delivery failures are logged and reported, not returned.
    pub fn send<'a, G, E>(
        &self,
        grade_document_courses: G,
        evaluation_results_courses: E,
        notifier: &dyn PublishNotifier,
    ) -> Result<DeliveryReport, CourseError>
    where
        G: IntoIterator<Item = &'a Course>,
        E: IntoIterator<Item = &'a Course>,
    {
        let plan = self.aggregate(grade_document_courses, evaluation_results_courses)?;
        let mut report = DeliveryReport::default();
        for notification in plan.notifications() {
            let result = notifier.send_publish_notification(&notification);
            report.record(notification.user, result);
        }
        tracing::info!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "publish notifications dispatched"
        );
        Ok(report)
    }
}

fn check_preconditions(course: &Course) -> Result<(), CourseError> {
    course.general_contribution()?;
    course.responsible_contributor()?;
    if course
        .text_answers
        .iter()
        .any(|answer| course.contribution(answer.contribution_id).is_none())
    {
        return Err(course.precondition("text answer references a foreign contribution"));
    }
    Ok(())
}

/// Group courses by editor: each editor gets one request listing every
/// course they have to look at.
pub fn editor_review_requests<'a, I>(courses: I) -> Vec<ReviewRequest<'a>>
where
    I: IntoIterator<Item = &'a Course>,
{
    let mut editors: BTreeMap<UserId, ReviewRequest<'a>> = BTreeMap::new();
    for course in courses {
        for editor in course.editors() {
            let request = editors.entry(editor.id).or_insert_with(|| ReviewRequest {
                user: editor,
                courses: Vec::new(),
            });
            if !request.courses.iter().any(|c| c.id == course.id) {
                request.courses.push(course);
            }
        }
    }
    editors.into_values().collect()
}

/// Deliver review requests, one call per editor.
pub fn send_review_requests<'a, I>(courses: I, notifier: &dyn PublishNotifier) -> DeliveryReport
where
    I: IntoIterator<Item = &'a Course>,
{
    let mut report = DeliveryReport::default();
    for request in editor_review_requests(courses) {
        let result = notifier.send_review_request(&request);
        report.record(request.user, result);
    }
    report
}
