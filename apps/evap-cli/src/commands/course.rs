// course.rs — Course subcommands: import, list, show, transition, unpublish, reopen, delete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Subcommand;
use evap_course::{Course, CourseId, CourseState, CourseStore, Transition, User};
use serde::Deserialize;

use super::{truncate, Context};

#[derive(Subcommand)]
pub enum CourseCommands {
    /// Import a course from a JSON description.
    Import {
        /// Path to the course JSON file.
        file: PathBuf,
    },
    /// List all courses.
    List {
        /// Filter by state (e.g., "approved", "inEvaluation", "reviewed").
        #[arg(long)]
        state: Option<String>,
    },
    /// Show details for a course.
    Show {
        /// Course ID.
        id: String,
    },
    /// Apply a single lifecycle transition.
    Transition {
        /// Course ID.
        id: String,
        /// Transition name (e.g., "prepare", "staffApprove", "publish").
        transition: String,
        /// Evaluate date rules against this day instead of today (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Take a published course back to reviewed.
    Unpublish {
        /// Course ID.
        id: String,
    },
    /// Reopen an evaluated or reviewed course whose evaluation is still running.
    Reopen {
        /// Course ID.
        id: String,
        /// Evaluate the window against this day instead of today (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a course that has not received any votes.
    Delete {
        /// Course ID.
        id: String,
    },
}

pub fn execute(cmd: &CourseCommands, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.store()?;

    match cmd {
        CourseCommands::Import { file } => import_course(ctx, &store, file),
        CourseCommands::List { state } => list_courses(&store, state.as_deref()),
        CourseCommands::Show { id } => show_course(&store, id),
        CourseCommands::Transition {
            id,
            transition,
            date,
        } => apply_transition(&store, id, transition, *date),
        CourseCommands::Unpublish { id } => unpublish_course(ctx, id),
        CourseCommands::Reopen { id, date } => reopen_course(ctx, id, *date),
        CourseCommands::Delete { id } => delete_course(&store, id),
    }
}

/// A person as written in an import file.
#[derive(Debug, Deserialize)]
struct PersonImport {
    username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContributorImport {
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    responsible: bool,
    #[serde(default)]
    can_edit: bool,
    #[serde(default)]
    questionnaires: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TextAnswerImport {
    /// Username of the contributor the answer is about; omitted for the course itself.
    #[serde(default)]
    contributor: Option<String>,
    answer: String,
}

/// Import file format for `evap course import`.
#[derive(Debug, Deserialize)]
struct CourseImport {
    name: String,
    vote_start_date: NaiveDate,
    vote_end_date: NaiveDate,
    #[serde(default)]
    num_voters: u32,
    #[serde(default)]
    general_questionnaires: Vec<String>,
    #[serde(default)]
    participants: Vec<PersonImport>,
    #[serde(default)]
    contributors: Vec<ContributorImport>,
    #[serde(default)]
    text_answers: Vec<TextAnswerImport>,
}

/// Resolves usernames to users, reusing identities already in the store so
/// one person is one user across courses.
struct UserDirectory {
    known: HashMap<String, User>,
    internal_domains: Vec<String>,
}

impl UserDirectory {
    fn from_store(store: &CourseStore, internal_domains: &[String]) -> anyhow::Result<Self> {
        let mut known = HashMap::new();
        for course in store.list()? {
            let contributors = course.contributions.iter().filter_map(|c| c.contributor.clone());
            for user in course.participants.iter().cloned().chain(contributors) {
                known.entry(user.username.clone()).or_insert(user);
            }
        }
        Ok(Self {
            known,
            internal_domains: internal_domains.to_vec(),
        })
    }

    fn resolve(&mut self, username: &str, email: Option<&str>) -> User {
        if let Some(user) = self.known.get(username) {
            return user.clone();
        }
        let user = match email {
            Some(email) => User::with_email(username, email, &self.internal_domains),
            None => User::new(username),
        };
        self.known.insert(username.to_string(), user.clone());
        user
    }
}

fn build_course(import: CourseImport, users: &mut UserDirectory) -> anyhow::Result<Course> {
    if import.vote_end_date < import.vote_start_date {
        anyhow::bail!(
            "evaluation window ends ({}) before it starts ({})",
            import.vote_end_date,
            import.vote_start_date
        );
    }

    let responsible: Vec<&str> = import
        .contributors
        .iter()
        .filter(|c| c.responsible)
        .map(|c| c.username.as_str())
        .collect();
    if responsible.len() > 1 {
        anyhow::bail!(
            "only one contributor may be responsible, found {}: {}",
            responsible.len(),
            responsible.join(", ")
        );
    }

    let mut course = Course::new(import.name, import.vote_start_date, import.vote_end_date);
    course.num_voters = import.num_voters;

    if let Some(general) = course.general_contribution_mut() {
        for name in &import.general_questionnaires {
            general.with_questionnaire(name.as_str());
        }
    }

    for person in &import.participants {
        course.add_participant(users.resolve(&person.username, person.email.as_deref()));
    }

    let mut contributions = HashMap::new();
    for entry in &import.contributors {
        let user = users.resolve(&entry.username, entry.email.as_deref());
        let contribution = course.add_contributor(user);
        if entry.responsible {
            contribution.mark_responsible();
        }
        if entry.can_edit {
            contribution.mark_editor();
        }
        for name in &entry.questionnaires {
            contribution.with_questionnaire(name.as_str());
        }
        contributions.insert(entry.username.clone(), contribution.id);
    }

    for answer in import.text_answers {
        let contribution_id = match answer.contributor {
            Some(ref username) => *contributions.get(username).ok_or_else(|| {
                anyhow::anyhow!("text answer refers to unknown contributor '{}'", username)
            })?,
            None => course.general_contribution()?.id,
        };
        course.add_text_answer(contribution_id, answer.answer);
    }

    Ok(course)
}

fn import_course(ctx: &Context, store: &CourseStore, file: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
    let import: CourseImport = serde_json::from_str(&json)?;

    let mut users = UserDirectory::from_store(store, &ctx.config.users.internal_domains)?;
    let course = build_course(import, &mut users)?;
    store.save(&course)?;
    tracing::info!(course_id = %course.id, file = %file.display(), "course imported");

    println!("Course imported: {}", course.id);
    println!("  Name:         {}", course.name);
    println!("  Participants: {}", course.participants.len());
    println!("  Contributors: {}", course.contributions.len() - 1);
    println!("  Text answers: {}", course.text_answers.len());

    Ok(())
}

fn list_courses(store: &CourseStore, state: Option<&str>) -> anyhow::Result<()> {
    let courses = match state {
        Some(filter) => store.list_by_state(filter.parse::<CourseState>().map_err(anyhow::Error::msg)?)?,
        None => store.list()?,
    };

    if courses.is_empty() {
        println!("No courses found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<30} {:<16} {:<24} {:>6}",
        "ID", "NAME", "STATE", "EVALUATION", "VOTERS"
    );
    println!("{}", "-".repeat(118));

    for c in &courses {
        println!(
            "{:<38} {:<30} {:<16} {:<24} {:>6}",
            c.id,
            truncate(&c.name, 28),
            c.state.display_name(),
            format!("{} - {}", c.vote_start_date, c.vote_end_date),
            c.num_voters,
        );
    }
    println!("\n{} course(s) total.", courses.len());

    Ok(())
}

fn show_course(store: &CourseStore, id: &str) -> anyhow::Result<()> {
    let course_id: CourseId = id.parse()?;
    match store.get(course_id)? {
        Some(c) => {
            println!("Course:     {}", c.id);
            println!("Name:       {}", c.name);
            println!("State:      {} ({}/{})", c.state.display_name(), c.state.progress() + 1, CourseState::ORDERED.len());
            println!("Evaluation: {} - {}", c.vote_start_date, c.vote_end_date);
            println!("Voters:     {} of {}", c.num_voters, c.participants.len());
            println!("Created:    {}", c.created_at.to_rfc3339());
            println!("Updated:    {}", c.updated_at.to_rfc3339());

            match c.responsible_contributor() {
                Ok(user) => println!("Responsible: {}", user.username),
                Err(e) => println!("Responsible: ({})", e),
            }
            let editors: Vec<&str> = c.editors().into_iter().map(|u| u.username.as_str()).collect();
            if !editors.is_empty() {
                println!("Editors:    {}", editors.join(", "));
            }

            if !c.text_answers.is_empty() {
                println!();
                println!("Text answers:");
                for answer in &c.text_answers {
                    println!(
                        "  {}  {:<10}  {}",
                        answer.id,
                        format!("{:?}", answer.state).to_lowercase(),
                        truncate(&answer.answer, 50)
                    );
                }
            }

            let next: Vec<&str> = c.state.transitions_from().iter().map(|t| t.as_str()).collect();
            println!();
            println!("Transitions: {}", if next.is_empty() { "(none)".to_string() } else { next.join(", ") });
        }
        None => {
            eprintln!("Course not found: {}", id);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn apply_transition(
    store: &CourseStore,
    id: &str,
    transition: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let course_id: CourseId = id.parse()?;
    let transition: Transition = transition.parse().map_err(anyhow::Error::msg)?;
    let today = date.unwrap_or_else(|| chrono::Utc::now().date_naive());

    let course = store.transition(course_id, transition, today)?;
    println!("{}: {} -> {}", course.name, transition, course.state.display_name());
    Ok(())
}

fn unpublish_course(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let course_id: CourseId = id.parse()?;
    let notifier = ctx.notifier();
    let ops = ctx.operations(notifier.as_ref())?;

    let course = ops.unpublish(course_id)?;
    println!("Unpublished: {} (now {})", course.name, course.state.display_name());
    Ok(())
}

fn reopen_course(ctx: &Context, id: &str, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let course_id: CourseId = id.parse()?;
    let notifier = ctx.notifier();
    let mut ops = ctx.operations(notifier.as_ref())?;
    if let Some(day) = date {
        ops = ops.at_date(day);
    }

    if ops.reopen_evaluation_if_running(course_id)? {
        println!("Evaluation reopened: {}", course_id);
    } else {
        println!("Course not reopened: evaluation is not running or not finished.");
    }
    Ok(())
}

fn delete_course(store: &CourseStore, id: &str) -> anyhow::Result<()> {
    let course_id: CourseId = id.parse()?;
    match store.get(course_id)? {
        Some(c) => {
            store.delete(course_id)?;
            println!("Deleted course: {} ({})", c.name, course_id);
        }
        None => {
            eprintln!("Course not found: {}", id);
            std::process::exit(1);
        }
    }

    Ok(())
}
