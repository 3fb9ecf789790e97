// semester.rs — Semester subcommands: preview, run, grade-documents.

use chrono::NaiveDate;
use clap::Subcommand;
use evap_course::{BulkOperation, BulkOutcome, DeliveryReport};

use super::{parse_ids, Context};

#[derive(Subcommand)]
pub enum SemesterCommands {
    /// Show what an operation would do to the selected courses.
    Preview {
        /// Operation: revertToNew, prepare, reenableLecturerReview, approve, publish.
        #[arg(long)]
        operation: String,
        /// Course IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Apply an operation to the selected courses and send notifications.
    Run {
        /// Operation: revertToNew, prepare, reenableLecturerReview, approve, publish.
        #[arg(long)]
        operation: String,
        /// Evaluate date rules against this day instead of today (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Course IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Notify participants that grade documents are available.
    GradeDocuments {
        /// Course IDs.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn execute(cmd: &SemesterCommands, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        SemesterCommands::Preview { operation, ids } => preview(ctx, operation, ids),
        SemesterCommands::Run {
            operation,
            date,
            ids,
        } => run(ctx, operation, *date, ids),
        SemesterCommands::GradeDocuments { ids } => grade_documents(ctx, ids),
    }
}

fn preview(ctx: &Context, operation: &str, ids: &[String]) -> anyhow::Result<()> {
    let operation: BulkOperation = operation.parse()?;
    let ids = parse_ids(ids)?;
    let notifier = ctx.notifier();
    let ops = ctx.operations(notifier.as_ref())?;

    let preview = ops.preview(&ids, operation)?;
    println!(
        "{}: {} course(s) from '{}' to '{}'",
        preview.operation,
        preview.course_names.len(),
        preview.current_state_name(),
        preview.target_state_name()
    );
    for name in &preview.course_names {
        println!("  - {}", name);
    }
    Ok(())
}

fn run(ctx: &Context, operation: &str, date: Option<NaiveDate>, ids: &[String]) -> anyhow::Result<()> {
    let operation: BulkOperation = operation.parse()?;
    let ids = parse_ids(ids)?;
    let notifier = ctx.notifier();
    let mut ops = ctx.operations(notifier.as_ref())?;
    if let Some(day) = date {
        ops = ops.at_date(day);
    }

    let outcome = ops.run(&ids, operation)?;
    print_outcome(&outcome);

    if let Some(ref error) = outcome.notification_error {
        anyhow::bail!(
            "{} course(s) changed, but notifications were not sent: {}",
            outcome.succeeded.len(),
            error
        );
    }
    Ok(())
}

fn grade_documents(ctx: &Context, ids: &[String]) -> anyhow::Result<()> {
    let ids = parse_ids(ids)?;
    let notifier = ctx.notifier();
    let ops = ctx.operations(notifier.as_ref())?;

    let report = ops.publish_grade_documents(&ids)?;
    print_report(&report);
    Ok(())
}

fn print_outcome(outcome: &BulkOutcome) {
    println!(
        "{}: {} succeeded, {} failed",
        outcome.operation,
        outcome.succeeded.len(),
        outcome.failed.len()
    );
    for failed in &outcome.failed {
        println!("  [failed] {}: {}", failed.course_id, failed.error);
    }
    print_report(&outcome.notifications);
}

fn print_report(report: &DeliveryReport) {
    if report.delivered == 0 && report.failures.is_empty() {
        return;
    }
    println!("Notifications: {} delivered", report.delivered);
    for failure in &report.failures {
        println!("  [undelivered] {}: {}", failure.username, failure.error);
    }
}
