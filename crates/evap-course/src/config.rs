// config.rs — Project layout and evaluation settings.
//
// Everything lives under `<project>/.evap/`:
//   config.toml   — settings below (optional)
//   courses/      — one JSON file per course
//   outbox.jsonl  — delivered notifications

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CourseError;

/// Top-level settings from `.evap/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvapConfig {
    /// When evaluation results may be shown to participants.
    #[serde(default)]
    pub results: ResultsConfig,

    /// How user capabilities are derived.
    #[serde(default)]
    pub users: UsersConfig,
}

/// Result-visibility policy behind `can_publish_grades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    /// Minimum number of submitted evaluations.
    #[serde(default = "default_min_voters")]
    pub min_voters: u32,

    /// Minimum share of participants who voted (0.0 to 1.0).
    #[serde(default = "default_min_voter_percentage")]
    pub min_voter_percentage: f64,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            min_voters: default_min_voters(),
            min_voter_percentage: default_min_voter_percentage(),
        }
    }
}

/// User capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// Email domains whose users may download grade documents.
    #[serde(default = "default_internal_domains")]
    pub internal_domains: Vec<String>,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            internal_domains: default_internal_domains(),
        }
    }
}

// Serde default functions
fn default_min_voters() -> u32 {
    2
}

fn default_min_voter_percentage() -> f64 {
    0.2
}

fn default_internal_domains() -> Vec<String> {
    vec!["hpi.de".to_string(), "student.hpi.de".to_string()]
}

impl EvapConfig {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CourseError> {
        let content = std::fs::read_to_string(path).map_err(|source| CourseError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| CourseError::ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load settings, falling back to defaults when the file does not exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, CourseError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

/// Where a project keeps its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLayout {
    /// Root directory of the project.
    pub root: PathBuf,

    /// Settings file.
    pub config_file: PathBuf,

    /// Directory for CourseStore (one JSON file per course).
    pub courses_dir: PathBuf,

    /// Notification outbox.
    pub outbox: PathBuf,
}

impl ProjectLayout {
    /// Standard `.evap/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let evap_dir = root.join(".evap");
        Self {
            root,
            config_file: evap_dir.join("config.toml"),
            courses_dir: evap_dir.join("courses"),
            outbox: evap_dir.join("outbox.jsonl"),
        }
    }

    pub fn load_config(&self) -> Result<EvapConfig, CourseError> {
        EvapConfig::load_or_default(&self.config_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = EvapConfig::default();
        assert_eq!(config.results.min_voters, 2);
        assert!((config.results.min_voter_percentage - 0.2).abs() < f64::EPSILON);
        assert!(config.users.internal_domains.contains(&"hpi.de".to_string()));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[results]\nmin_voters = 5\n").unwrap();

        let config = EvapConfig::load(&path).unwrap();
        assert_eq!(config.results.min_voters, 5);
        assert!((config.results.min_voter_percentage - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.users.internal_domains.len(), 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = EvapConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.results.min_voters, 2);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[results\nmin_voters = ").unwrap();
        let err = EvapConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, CourseError::ConfigError { .. }));
    }

    #[test]
    fn layout_lives_under_dot_evap() {
        let layout = ProjectLayout::for_project("/srv/evap");
        assert_eq!(layout.courses_dir, PathBuf::from("/srv/evap/.evap/courses"));
        assert_eq!(layout.outbox, PathBuf::from("/srv/evap/.evap/outbox.jsonl"));
        assert_eq!(layout.config_file, PathBuf::from("/srv/evap/.evap/config.toml"));
    }
}
