//! Runtime configuration for the learning core

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CoreError, Result};

/// Top-level configuration, usually read from `learnxp.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnConfig {
    /// JSON file holding per-subject level and XP.
    pub progress_path: PathBuf,
    /// Log file; `None` logs to stderr.
    pub log_file: Option<PathBuf>,
    /// Minimum concept match ratio for a correct answer.
    pub pass_threshold: f64,
    /// Questions per progress-bar cycle.
    pub progress_window: u32,
    /// External stop-word and lemma file (JSON).
    pub lexicon_path: Option<PathBuf>,
    /// CSV or XLSX file replacing the built-in question bank.
    pub question_bank_path: Option<PathBuf>,
    /// JSON file with extra literal rules, appended after the defaults.
    pub rules_path: Option<PathBuf>,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            progress_path: PathBuf::from("data/user_progress.json"),
            log_file: Some(PathBuf::from("learning_assistant.log")),
            pass_threshold: 0.7,
            progress_window: 5,
            lexicon_path: None,
            question_bank_path: None,
            rules_path: None,
        }
    }
}

impl LearnConfig {
    /// Load configuration from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::persistence(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(CoreError::Config(format!(
                "pass_threshold must be within 0..=1, got {}",
                self.pass_threshold
            )));
        }
        if self.progress_window == 0 {
            return Err(CoreError::Config("progress_window must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = LearnConfig::from_toml("").unwrap();
        assert_eq!(config, LearnConfig::default());
        assert!((config.pass_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.progress_window, 5);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = LearnConfig::from_toml(
            r#"
            progress_path = "/tmp/progress.json"
            pass_threshold = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.progress_path, PathBuf::from("/tmp/progress.json"));
        assert!((config.pass_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.progress_window, 5);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = LearnConfig::from_toml("pass_threshold = 1.5").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn rejects_zero_window() {
        assert!(LearnConfig::from_toml("progress_window = 0").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LearnConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LearnConfig::default());
    }
}
