//! Grading configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::grading::GradingOptions;
use crate::model::{Weighting, DEFAULT_PASSING_GRADE};

/// Top-level coursegrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursegradeConfig {
    /// Whether question grade weights enter the grade.
    #[serde(default)]
    pub weighting: Weighting,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Passing grade (percent) for courses that do not set one.
    #[serde(default = "default_passing_grade")]
    pub default_passing_grade: u32,
    /// Tolerance when comparing a grade against the passing grade.
    #[serde(default = "default_epsilon")]
    pub pass_threshold_epsilon: f64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./coursegrade-results")
}
fn default_passing_grade() -> u32 {
    DEFAULT_PASSING_GRADE
}
fn default_epsilon() -> f64 {
    1e-9
}

impl Default for CoursegradeConfig {
    fn default() -> Self {
        Self {
            weighting: Weighting::default(),
            output_dir: default_output_dir(),
            default_passing_grade: default_passing_grade(),
            pass_threshold_epsilon: default_epsilon(),
        }
    }
}

impl CoursegradeConfig {
    pub fn grading_options(&self) -> GradingOptions {
        GradingOptions {
            weighting: self.weighting,
            default_passing_grade: self.default_passing_grade,
            pass_epsilon: self.pass_threshold_epsilon,
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.default_passing_grade <= 100,
            "default_passing_grade must be between 0 and 100, got {}",
            self.default_passing_grade
        );
        anyhow::ensure!(
            self.pass_threshold_epsilon >= 0.0,
            "pass_threshold_epsilon must not be negative"
        );
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `coursegrade.toml` in the current directory
/// 2. `~/.config/coursegrade/config.toml`
///
/// Environment variable overrides: `COURSEGRADE_WEIGHTING`, `COURSEGRADE_OUTPUT_DIR`.
pub fn load_config() -> Result<CoursegradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CoursegradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("coursegrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<CoursegradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => CoursegradeConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut CoursegradeConfig) -> Result<()> {
    if let Ok(weighting) = std::env::var("COURSEGRADE_WEIGHTING") {
        config.weighting = weighting
            .parse()
            .map_err(|e: String| anyhow::anyhow!("COURSEGRADE_WEIGHTING: {e}"))?;
    }
    if let Ok(dir) = std::env::var("COURSEGRADE_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("coursegrade"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CoursegradeConfig::default();
        assert_eq!(config.weighting, Weighting::Unweighted);
        assert_eq!(config.default_passing_grade, 80);
        assert_eq!(config.output_dir, PathBuf::from("./coursegrade-results"));
    }

    #[test]
    fn parse_config() {
        let toml_str = r#"
weighting = "weighted"
default_passing_grade = 60
output_dir = "out"
"#;
        let config: CoursegradeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.weighting, Weighting::Weighted);
        assert_eq!(config.default_passing_grade, 60);
        assert!((config.pass_threshold_epsilon - 1e-9).abs() < f64::EPSILON);

        let options = config.grading_options();
        assert_eq!(options.weighting, Weighting::Weighted);
        assert_eq!(options.default_passing_grade, 60);
    }

    #[test]
    fn explicit_missing_path_fails() {
        let err = load_config_from(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_file_rejects_bad_grade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coursegrade.toml");
        std::fs::write(&path, "default_passing_grade = 150\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("default_passing_grade"));
    }
}
