//! # evap-cli
//!
//! Staff command line for course evaluations.
//!
//! - `evap course import/list/show/transition/unpublish/reopen/delete` — manage courses
//! - `evap semester preview/run` — bulk lifecycle operations with notifications
//! - `evap semester grade-documents` — announce newly available grade documents
//! - `evap comment review` — review a text answer

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use evap_course::ProjectLayout;
use tracing_subscriber::EnvFilter;

/// Course evaluation lifecycle and publish notifications.
#[derive(Parser)]
#[command(name = "evap", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".", global = true)]
    project_root: PathBuf,

    /// Log notifications instead of writing them to the outbox.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage individual courses.
    Course {
        #[command(subcommand)]
        command: commands::course::CourseCommands,
    },
    /// Bulk operations over a selection of courses.
    Semester {
        #[command(subcommand)]
        command: commands::semester::SemesterCommands,
    },
    /// Review free-text answers.
    Comment {
        #[command(subcommand)]
        command: commands::comment::CommentCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("evap_course=info".parse()?)
                .add_directive("evap=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let ctx = commands::Context::load(ProjectLayout::for_project(&project_root), cli.dry_run)?;

    match &cli.command {
        Commands::Course { command } => commands::course::execute(command, &ctx),
        Commands::Semester { command } => commands::semester::execute(command, &ctx),
        Commands::Comment { command } => commands::comment::execute(command, &ctx),
    }
}
