// store.rs — CourseStore: persistence for course records.
//
// Each course is stored as a JSON file: `<store_dir>/<course_id>.json`.
// Saves go through `<course_id>.json.tmp` and a rename, so a failed save
// leaves the previous record in place. The caller serializes access; the
// store does no locking of its own.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::course::{Course, CourseId};
use crate::error::CourseError;
use crate::state_machine::{CourseState, Transition};

/// Persistent store for course records.
pub struct CourseStore {
    store_dir: PathBuf,
}

impl CourseStore {
    /// Create a new store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, CourseError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| CourseError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    /// Save a course to disk (creates or overwrites).
    pub fn save(&self, course: &Course) -> Result<(), CourseError> {
        let path = self.course_file(course.id);
        let staged = self.staging_file(course.id);
        let json = serde_json::to_string_pretty(course)?;
        fs::write(&staged, json).map_err(|source| CourseError::IoError {
            path: staged.display().to_string(),
            source,
        })?;
        fs::rename(&staged, &path).map_err(|source| CourseError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Get a specific course by ID.
    pub fn get(&self, course_id: CourseId) -> Result<Option<Course>, CourseError> {
        let path = self.course_file(course_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| CourseError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        let course: Course = serde_json::from_str(&json)?;
        Ok(Some(course))
    }

    /// Get a course that must exist.
    pub fn require(&self, course_id: CourseId) -> Result<Course, CourseError> {
        self.get(course_id)?.ok_or(CourseError::NotFound(course_id))
    }

    /// List all courses, sorted by lifecycle state, then name.
    pub fn list(&self) -> Result<Vec<Course>, CourseError> {
        let mut courses = Vec::new();

        let entries = fs::read_dir(&self.store_dir).map_err(|source| CourseError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| CourseError::IoError {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| CourseError::IoError {
                    path: path.display().to_string(),
                    source,
                })?;
                match serde_json::from_str::<Course>(&json) {
                    Ok(course) => courses.push(course),
                    Err(e) => tracing::warn!("skipping unreadable course file {}: {}", path.display(), e),
                }
            }
        }

        courses.sort_by(|a, b| a.state.cmp(&b.state).then_with(|| a.name.cmp(&b.name)));
        Ok(courses)
    }

    /// List courses in one state.
    pub fn list_by_state(&self, state: CourseState) -> Result<Vec<Course>, CourseError> {
        let all = self.list()?;
        Ok(all.into_iter().filter(|c| c.state == state).collect())
    }

    /// Apply a transition to a stored course and save it.
    /// Nothing is written when the transition is rejected.
    pub fn transition(
        &self,
        course_id: CourseId,
        transition: Transition,
        today: NaiveDate,
    ) -> Result<Course, CourseError> {
        let mut course = self.require(course_id)?;
        course.transition(transition, today)?;
        self.save(&course)?;
        Ok(course)
    }

    /// Delete a course from the store. Only courses staff may still delete
    /// (not published, no votes) are removed; others are a precondition
    /// violation and stay on disk.
    pub fn delete(&self, course_id: CourseId) -> Result<bool, CourseError> {
        let path = self.course_file(course_id);
        let Some(course) = self.get(course_id)? else {
            return Ok(false);
        };
        if !course.can_staff_delete() {
            return Err(course.precondition("course is published or already has votes"));
        }
        fs::remove_file(&path).map_err(|source| CourseError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(true)
    }

    /// Path to the JSON file for a given course.
    fn course_file(&self, course_id: CourseId) -> PathBuf {
        self.store_dir.join(format!("{}.json", course_id))
    }

    fn staging_file(&self, course_id: CourseId) -> PathBuf {
        self.store_dir.join(format!("{}.json.tmp", course_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn make_course(name: &str) -> Course {
        Course::new(name, date(), date())
    }

    #[test]
    fn save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();

        let course = make_course("Operating Systems");
        let id = course.id;
        store.save(&course).unwrap();

        let found = store.get(id).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "Operating Systems");
        assert_eq!(found.contributions.len(), 1);
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();
        assert!(store.get(CourseId::new()).unwrap().is_none());
        assert!(matches!(
            store.require(CourseId::new()),
            Err(CourseError::NotFound(_))
        ));
    }

    #[test]
    fn list_by_state_filters_correctly() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();

        let fresh = make_course("Fresh");
        let mut prepared = make_course("Prepared");
        prepared.transition(Transition::Prepare, date()).unwrap();
        store.save(&fresh).unwrap();
        store.save(&prepared).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Fresh");

        let only_prepared = store.list_by_state(CourseState::Prepared).unwrap();
        assert_eq!(only_prepared.len(), 1);
        assert_eq!(only_prepared[0].name, "Prepared");
    }

    #[test]
    fn transition_updates_state_and_persists() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();
        let course = make_course("Course");
        let id = course.id;
        store.save(&course).unwrap();

        let updated = store.transition(id, Transition::Prepare, date()).unwrap();
        assert_eq!(updated.state, CourseState::Prepared);
        assert_eq!(store.require(id).unwrap().state, CourseState::Prepared);
    }

    #[test]
    fn rejected_transition_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();
        let course = make_course("Course");
        let id = course.id;
        store.save(&course).unwrap();

        let result = store.transition(id, Transition::Publish, date());
        assert!(matches!(result, Err(CourseError::InvalidTransition { .. })));
        assert_eq!(store.require(id).unwrap().state, CourseState::New);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path()).unwrap();
        store.save(&make_course("Good")).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn delete_course() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();
        let course = make_course("To Delete");
        let id = course.id;
        store.save(&course).unwrap();

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn delete_refuses_voted_or_published_courses() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();

        let mut voted = make_course("Voted");
        voted.num_voters = 4;
        let mut published = make_course("Published");
        published.state = CourseState::Published;
        store.save(&voted).unwrap();
        store.save(&published).unwrap();

        for id in [voted.id, published.id] {
            assert!(matches!(
                store.delete(id),
                Err(CourseError::PreconditionViolation { .. })
            ));
            assert!(store.get(id).unwrap().is_some());
        }
    }

    #[test]
    fn failed_save_keeps_previous_record() {
        let dir = tempdir().unwrap();
        let store = CourseStore::new(dir.path().join("courses")).unwrap();
        let mut course = make_course("Course");
        store.save(&course).unwrap();

        // A directory where the staging file goes makes the write fail.
        fs::create_dir(dir.path().join("courses").join(format!("{}.json.tmp", course.id))).unwrap();
        course.name = "Renamed".to_string();
        assert!(matches!(store.save(&course), Err(CourseError::IoError { .. })));
        assert_eq!(store.require(course.id).unwrap().name, "Course");
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
