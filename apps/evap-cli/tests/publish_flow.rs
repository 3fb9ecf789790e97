// publish_flow.rs — End-to-end test of a course from import to published results.
//
// Flow:
//   1. Staff creates two courses with shared participants
//   2. prepare → editors get one review request each
//   3. editorApprove, approve, startEvaluation, endEvaluation
//   4. Text answers are reviewed → course moves to reviewed on its own
//   5. publish → one outbox notification per user listing both courses
//   6. Grade documents → only users with download rights are told
//   7. unpublish → course back to reviewed

use chrono::NaiveDate;
use evap_course::{
    BulkOperation, Course, CourseOperations, CourseState, CourseStore, OutboxEntry, OutboxNotifier,
    ProjectLayout, ReviewAction, Transition, User, VoterThreshold,
};
use tempfile::TempDir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

fn domains() -> Vec<String> {
    vec!["hpi.de".to_string()]
}

#[test]
fn publish_flow_from_new_to_published() {
    // =========================================================
    // 1. Courses with shared people
    // =========================================================

    let project = TempDir::new().unwrap();
    let layout = ProjectLayout::for_project(project.path());
    let config = layout.load_config().unwrap();
    let store = CourseStore::new(&layout.courses_dir).unwrap();

    let student = User::with_email("student", "student@hpi.de", &domains());
    let guest = User::with_email("guest", "guest@example.com", &domains());
    let lecturer = User::with_email("lecturer", "lecturer@hpi.de", &domains());
    let tutor = User::with_email("tutor", "tutor@hpi.de", &domains());

    let mut ids = Vec::new();
    for name in ["Algorithms", "Networks"] {
        let mut course = Course::new(name, day(5), day(15));
        course.add_participant(student.clone());
        course.add_participant(guest.clone());
        course
            .general_contribution_mut()
            .unwrap()
            .with_questionnaire("General");
        course
            .add_contributor(lecturer.clone())
            .mark_responsible()
            .with_questionnaire("Lecturer");
        store.save(&course).unwrap();
        ids.push(course.id);
    }

    let notifier = OutboxNotifier::new(&layout.outbox);
    let ops = CourseOperations::new(store, VoterThreshold::from(&config.results), &notifier)
        .at_date(day(1));

    // =========================================================
    // 2. Prepare: review requests go to the responsible lecturer
    // =========================================================

    let outcome = ops.run(&ids, BulkOperation::Prepare).unwrap();
    assert_eq!(outcome.succeeded.len(), 2);
    let entries = notifier.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        OutboxEntry::ReviewRequest { recipient, courses, .. } => {
            assert_eq!(recipient.username, "lecturer");
            assert_eq!(courses.len(), 2);
        }
        other => panic!("expected review request, got {:?}", other),
    }

    // =========================================================
    // 3. Through approval and the evaluation window
    // =========================================================

    let store = ops.store();
    for id in &ids {
        store.transition(*id, Transition::EditorApprove, day(2)).unwrap();
    }
    ops.run(&ids, BulkOperation::Approve).unwrap();

    // Too early for the evaluation window.
    assert!(store.transition(ids[0], Transition::StartEvaluation, day(1)).is_err());

    for id in &ids {
        store.transition(*id, Transition::StartEvaluation, day(5)).unwrap();
    }

    // Votes arrive; one course gets a comment about the tutor.
    let mut algorithms = store.require(ids[0]).unwrap();
    algorithms.num_voters = 2;
    let tutor_contribution = algorithms.add_contributor(tutor.clone()).id;
    let comment = algorithms.add_text_answer(tutor_contribution, "Tutorials were excellent.");
    store.save(&algorithms).unwrap();

    let mut networks = store.require(ids[1]).unwrap();
    networks.num_voters = 2;
    store.save(&networks).unwrap();

    for id in &ids {
        store.transition(*id, Transition::EndEvaluation, day(16)).unwrap();
    }

    // =========================================================
    // 4. Review: the comment-free course is finished directly,
    //    the other one once its only answer is reviewed
    // =========================================================

    store.transition(ids[1], Transition::ReviewFinished, day(16)).unwrap();
    assert!(store.transition(ids[0], Transition::ReviewFinished, day(16)).is_err());

    let review = ops
        .review_text_answer(ids[0], comment, ReviewAction::Publish)
        .unwrap();
    assert_eq!(review.applied, Some(Transition::ReviewFinished));
    assert_eq!(store.require(ids[0]).unwrap().state, CourseState::Reviewed);

    // =========================================================
    // 5. Publish: one notification per user, both courses listed
    // =========================================================

    let outcome = ops.run(&ids, BulkOperation::Publish).unwrap();
    assert_eq!(outcome.succeeded.len(), 2);
    assert!(outcome.notification_error.is_none());
    assert_eq!(outcome.notifications.delivered, 4);

    let published: Vec<OutboxEntry> = notifier.read_all().unwrap().into_iter().skip(1).collect();
    assert_eq!(published.len(), 4);
    let lists_for = |username: &str| {
        published
            .iter()
            .find_map(|e| match e {
                OutboxEntry::PublishNotification {
                    recipient,
                    evaluation_results_courses,
                    ..
                } if recipient.username == username => Some(evaluation_results_courses.len()),
                _ => None,
            })
            .unwrap()
    };
    assert_eq!(lists_for("student"), 2);
    assert_eq!(lists_for("guest"), 2);
    assert_eq!(lists_for("lecturer"), 2);
    assert_eq!(lists_for("tutor"), 1);

    // =========================================================
    // 6. Grade documents: guests cannot download grades
    // =========================================================

    let report = ops.publish_grade_documents(&ids[..1]).unwrap();
    assert_eq!(report.delivered, 1);
    let last = notifier.read_all().unwrap().pop().unwrap();
    assert_eq!(last.recipient().username, "student");

    // =========================================================
    // 7. Unpublish
    // =========================================================

    let course = ops.unpublish(ids[1]).unwrap();
    assert_eq!(course.state, CourseState::Reviewed);
    assert_eq!(store.require(ids[0]).unwrap().state, CourseState::Published);
}
