use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GradeError, Result};

pub const CONFIG_FILE: &str = "gdconfig.toml";

/// Course settings read from `gdconfig.toml`.
///
/// ```toml
/// log = "marking_log.md"
/// year = 2024
/// assignment = "Final project (123456)"
///
/// [fudges]
/// 2024 = 2.5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Path of the marking log.
    pub log: PathBuf,
    pub year: i32,
    /// Gradebook column receiving the marks in the upload CSV.
    #[serde(default)]
    pub assignment: Option<String>,
    /// Marks added to every student's total, keyed by year.
    #[serde(default)]
    pub fudges: BTreeMap<String, f64>,
    /// Notebook template instantiated for each new student.
    #[serde(default = "default_notebook_template")]
    pub notebook_template: PathBuf,
}

fn default_notebook_template() -> PathBuf {
    PathBuf::from("templates").join("grading.Rmd")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GradeError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(path, &content)?;
        if let Some(dir) = path.parent().filter(|_| config.log.is_relative()) {
            config.log = dir.join(&config.log);
        }
        if !config.log.exists() {
            return Err(GradeError::MissingLogFile {
                log: config.log,
                config: path.to_path_buf(),
            });
        }
        Ok(config)
    }

    fn from_toml(path: &Path, content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        for key in ["log", "year"] {
            if !table.contains_key(key) {
                return Err(GradeError::MissingConfigKey {
                    path: path.to_path_buf(),
                    key: key.to_string(),
                });
            }
        }
        Ok(toml::from_str(content)?)
    }

    pub fn student_file(&self) -> PathBuf {
        PathBuf::from(format!("students_{}.csv", self.year))
    }

    pub fn marks_file(&self) -> PathBuf {
        PathBuf::from(format!("marks_{}.csv", self.year))
    }

    pub fn previous_totals_file(&self) -> PathBuf {
        PathBuf::from(format!("marks_{}.txt", self.year - 1))
    }

    pub fn fudge(&self) -> f64 {
        self.fudges
            .get(&self.year.to_string())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn assignment(&self) -> Result<&str> {
        self.assignment
            .as_deref()
            .ok_or_else(|| GradeError::MissingConfigKey {
                path: PathBuf::from(CONFIG_FILE),
                key: "assignment".to_string(),
            })
    }
}
