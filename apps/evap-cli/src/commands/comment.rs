// comment.rs — Comment subcommands: review.

use clap::Subcommand;
use evap_course::{CourseId, ReviewAction, TextAnswerId};

use super::Context;

#[derive(Subcommand)]
pub enum CommentCommands {
    /// Decide what happens to a text answer.
    Review {
        /// Course ID.
        course: String,
        /// Text answer ID.
        answer: String,
        /// One of: publish, make_private, hide, unreview.
        action: String,
    },
}

pub fn execute(cmd: &CommentCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        CommentCommands::Review {
            course,
            answer,
            action,
        } => review(ctx, course, answer, action),
    }
}

fn review(ctx: &Context, course: &str, answer: &str, action: &str) -> anyhow::Result<()> {
    let course_id: CourseId = course.parse()?;
    let answer_id: TextAnswerId = answer.parse()?;
    let action: ReviewAction = action.parse()?;
    let notifier = ctx.notifier();
    let ops = ctx.operations(notifier.as_ref())?;

    let outcome = ops.review_text_answer(course_id, answer_id, action)?;
    let open = outcome
        .course
        .text_answers
        .iter()
        .filter(|a| a.state == evap_course::TextAnswerState::Unreviewed)
        .count();
    println!("Answer {} reviewed ({} still unreviewed).", answer_id, open);
    if let Some(transition) = outcome.applied {
        println!(
            "Course {} is now {} ({}).",
            outcome.course.name,
            outcome.course.state.display_name(),
            transition
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use evap_course::{Course, CourseState, ProjectLayout, TextAnswerState, User};
    use tempfile::TempDir;

    #[test]
    fn reviewing_last_answer_marks_course_reviewed() {
        let project = TempDir::new().unwrap();
        let ctx = Context::load(ProjectLayout::for_project(project.path()), true).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut course = Course::new("Databases", date, date);
        course.add_contributor(User::new("lecturer")).mark_responsible();
        let general = course.general_contribution().unwrap().id;
        let answer = course.add_text_answer(general, "More exercises please.");
        course.state = CourseState::Evaluated;
        let store = ctx.store().unwrap();
        store.save(&course).unwrap();

        review(&ctx, &course.id.to_string(), &answer.to_string(), "make_private").unwrap();

        let stored = store.require(course.id).unwrap();
        assert_eq!(stored.state, CourseState::Reviewed);
        assert_eq!(stored.text_answers[0].state, TextAnswerState::Private);
        assert!(review(&ctx, &course.id.to_string(), &answer.to_string(), "delete").is_err());
    }
}
