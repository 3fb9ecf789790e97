pub mod comment;
pub mod course;
pub mod semester;

use evap_course::{
    CourseId, CourseOperations, CourseStore, EvapConfig, OutboxNotifier, ProjectLayout,
    PublishNotifier, TracingNotifier, VoterThreshold,
};

/// Everything a command needs: where state lives and how to behave.
pub struct Context {
    pub layout: ProjectLayout,
    pub config: EvapConfig,
    pub dry_run: bool,
}

impl Context {
    pub fn load(layout: ProjectLayout, dry_run: bool) -> anyhow::Result<Self> {
        let config = layout.load_config()?;
        Ok(Self {
            layout,
            config,
            dry_run,
        })
    }

    pub fn store(&self) -> anyhow::Result<CourseStore> {
        Ok(CourseStore::new(&self.layout.courses_dir)?)
    }

    pub fn notifier(&self) -> Box<dyn PublishNotifier> {
        if self.dry_run {
            Box::new(TracingNotifier)
        } else {
            Box::new(OutboxNotifier::new(&self.layout.outbox))
        }
    }

    pub fn operations<'n>(
        &self,
        notifier: &'n dyn PublishNotifier,
    ) -> anyhow::Result<CourseOperations<'n, VoterThreshold>> {
        let policy = VoterThreshold::from(&self.config.results);
        Ok(CourseOperations::new(self.store()?, policy, notifier))
    }
}

pub fn parse_ids(ids: &[String]) -> anyhow::Result<Vec<CourseId>> {
    ids.iter()
        .map(|id| {
            id.parse::<CourseId>()
                .map_err(|e| anyhow::anyhow!("invalid course id '{}': {}", id, e))
        })
        .collect()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
