//! Progress tracking - per-subject level/XP and the JSON progress file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{CoreError, Result};

/// XP awarded per correct answer, multiplied by the current level.
pub const XP_PER_LEVEL: u64 = 10;
/// XP threshold per level; reaching `level * LEVEL_XP_STEP` levels up.
pub const LEVEL_XP_STEP: u64 = 50;

fn first_level() -> u32 {
    1
}

/// Level and cumulative XP for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    #[serde(default = "first_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
}

impl Default for SubjectProgress {
    fn default() -> Self {
        Self { level: 1, xp: 0 }
    }
}

/// Result of crediting one correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub xp_gained: u64,
    pub xp_needed: u64,
    pub leveled_up: bool,
    pub new_level: u32,
    pub new_xp: u64,
}

/// XP arithmetic for one correct answer at `current_level`. At most one
/// level is granted per answer, even when the new total clears several
/// thresholds.
pub fn award_for(current_level: u32, old_xp: u64) -> XpAward {
    let level = current_level.max(1);
    let xp_gained = XP_PER_LEVEL * u64::from(level);
    let new_xp = old_xp.saturating_add(xp_gained);
    let xp_needed = u64::from(level) * LEVEL_XP_STEP;
    let new_level = if new_xp >= xp_needed {
        level.saturating_add(1)
    } else {
        level
    };
    XpAward {
        xp_gained,
        xp_needed,
        leveled_up: new_level > level,
        new_level,
        new_xp,
    }
}

/// Running answer counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerTally {
    pub questions_answered: u32,
    pub correct_answers: u32,
}

impl AnswerTally {
    pub fn record(&mut self, is_correct: bool) {
        self.questions_answered += 1;
        if is_correct {
            self.correct_answers += 1;
        }
    }

    pub fn incorrect_answers(&self) -> u32 {
        self.questions_answered - self.correct_answers
    }

    pub fn accuracy_percent(&self) -> f64 {
        if self.questions_answered > 0 {
            f64::from(self.correct_answers) / f64::from(self.questions_answered) * 100.0
        } else {
            0.0
        }
    }
}

/// Subject progress mapping backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
    entries: BTreeMap<String, SubjectProgress>,
}

impl ProgressStore {
    /// Load the store; a missing or malformed file gives an empty mapping.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(entries) => {
                info!(path = %path.display(), subjects = entries.len(), "progress loaded");
                entries
            }
            Err(CoreError::Persistence { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                info!(path = %path.display(), "initialized new user data");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable progress file");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    /// Read the mapping without falling back.
    pub fn read_entries(path: &Path) -> Result<BTreeMap<String, SubjectProgress>> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::persistence(path, e))?;
        let mut entries: BTreeMap<String, SubjectProgress> = serde_json::from_str(&content)?;
        for progress in entries.values_mut() {
            progress.level = progress.level.max(1);
        }
        Ok(entries)
    }

    /// Write the full mapping back to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::persistence(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CoreError::persistence(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(CoreError::persistence(&self.path, e));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, subject: &str) -> Option<SubjectProgress> {
        self.entries.get(subject).copied()
    }

    pub fn entries(&self) -> &BTreeMap<String, SubjectProgress> {
        &self.entries
    }

    fn entry(&mut self, subject: &str) -> &mut SubjectProgress {
        self.entries.entry(subject.to_string()).or_default()
    }
}

/// Applies XP gains and level-ups to the progress store.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    store: ProgressStore,
}

impl ProgressTracker {
    pub fn new(store: ProgressStore) -> Self {
        Self { store }
    }

    /// Tracker over the progress file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(ProgressStore::load(path))
    }

    /// Existing progress for `subject`, or a fresh level-1 entry.
    pub fn get_or_init(&mut self, subject: &str) -> SubjectProgress {
        *self.store.entry(subject)
    }

    pub fn progress(&self, subject: &str) -> Option<SubjectProgress> {
        self.store.get(subject)
    }

    /// Credit one correct answer answered at `current_level` and persist.
    pub fn apply_correct_answer(&mut self, subject: &str, current_level: u32) -> XpAward {
        let entry = self.store.entry(subject);
        let award = award_for(current_level, entry.xp);
        entry.xp = award.new_xp;
        entry.level = award.new_level;

        info!(
            subject,
            xp_gained = award.xp_gained,
            total_xp = award.new_xp,
            xp_needed = award.xp_needed,
            "xp awarded"
        );
        if award.leveled_up {
            info!(subject, level = award.new_level, "level up");
        }

        self.persist();
        award
    }

    /// Save the store. Failures are logged and the in-memory state kept.
    pub fn persist(&self) -> bool {
        match self.store.save() {
            Ok(()) => {
                info!(path = %self.store.path().display(), "user data saved");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to save user data");
                false
            }
        }
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }
}
