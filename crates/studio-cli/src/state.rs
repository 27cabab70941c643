//! Persistent wizard session for the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use studio_core::preview::PreviewRegistry;
use studio_core::store::{FileStore, SaveOutcome, WizardRepository, DEFAULT_QUOTA_BYTES};
use studio_core::wizard::WizardState;

const STATE_DIR: &str = ".studio";
const STATE_FILE: &str = "state.json";
const LAST_TRY_ON_FILE: &str = "last-try-on.json";

/// The wizard state of one project directory, loaded from and saved to
/// `.studio/state.json`.
pub struct Session {
    repository: WizardRepository<FileStore>,
    pub wizard: WizardState,
}

impl Session {
    pub fn open(project_dir: &Path) -> Result<Self> {
        let path = state_dir(project_dir).join(STATE_FILE);
        let store = FileStore::open(&path, DEFAULT_QUOTA_BYTES)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let repository = WizardRepository::new(store, PreviewRegistry::new());
        let wizard = repository.load();
        Ok(Self { repository, wizard })
    }

    pub fn registry(&self) -> &PreviewRegistry {
        self.repository.registry()
    }

    pub fn save(&mut self) -> Result<()> {
        match self.repository.save(&self.wizard)? {
            SaveOutcome::Full => {}
            SaveOutcome::WithoutImages => println!(
                "{}",
                "Session is too large to keep images; they will need to be supplied again."
                    .yellow()
            ),
        }
        Ok(())
    }

    /// Reset the wizard and remove everything persisted for it.
    pub fn clear(&mut self, project_dir: &Path) -> Result<()> {
        self.wizard.reset();
        self.repository.clear()?;
        let last = last_try_on_path(project_dir);
        if last.exists() {
            std::fs::remove_file(&last)
                .with_context(|| format!("Failed to remove {}", last.display()))?;
        }
        Ok(())
    }
}

pub fn state_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_DIR)
}

/// Where the last full try-on response is kept for `approve`.
pub fn last_try_on_path(project_dir: &Path) -> PathBuf {
    state_dir(project_dir).join(LAST_TRY_ON_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::open(dir.path()).unwrap();
        session.wizard.set_description("Tea-length dress");
        session.wizard.set_color("#c0ffee");
        session.save().unwrap();

        let reopened = Session::open(dir.path()).unwrap();
        assert_eq!(reopened.wizard.description(), "Tea-length dress");
        assert_eq!(reopened.wizard.color(), "#c0ffee");

        let mut session = reopened;
        std::fs::write(last_try_on_path(dir.path()), "{}").unwrap();
        session.clear(dir.path()).unwrap();
        assert_eq!(session.wizard.description(), "");
        assert!(!last_try_on_path(dir.path()).exists());
        assert_eq!(Session::open(dir.path()).unwrap().wizard.color(), "#000000");
    }

    #[test]
    fn test_unreadable_state_file_opens_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(state_dir(dir.path())).unwrap();
        std::fs::write(state_dir(dir.path()).join(STATE_FILE), "{not json").unwrap();

        let mut session = Session::open(dir.path()).unwrap();
        assert_eq!(session.wizard.step(), studio_core::wizard::WizardStep::Design);
        assert!(session.wizard.description().is_empty());

        session.wizard.set_description("Recovered");
        session.save().unwrap();
        let reopened = Session::open(dir.path()).unwrap();
        assert_eq!(reopened.wizard.description(), "Recovered");
    }
}
