use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GradeError>;

/// Fatal errors. Ordinary grading mistakes in a marking log are reported as
/// diagnostics by `check` instead.
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("invalid list element {line:?}: {reason}")]
    MalformedEntry { line: String, reason: String },

    #[error("score component {name:?} listed more than once in maxima")]
    DuplicateComponent { name: String },

    #[error("bad filename {filename:?}: {reason}")]
    FilenameFormat { filename: String, reason: String },

    #[error("{second} has same student ID {id} as {first}")]
    DuplicateIdentifier {
        id: String,
        first: String,
        second: String,
    },

    #[error("gradebook has no {column:?} column")]
    MissingColumn { column: String },

    #[error("gradebook first column should end with \"Student\", found {found:?}")]
    BadGradebookHeader { found: String },

    #[error("cannot convert {value:?} to an integer student ID")]
    InvalidId { value: String },

    #[error("cannot find student {login}")]
    UnknownStudent { login: String },

    #[error("invalid marks line {line:?}")]
    MalformedTotal { line: String },

    #[error("check returns message \"{report}\"")]
    UncheckedLog { report: String },

    #[error("should be {path:?} in current directory")]
    MissingConfig { path: PathBuf },

    #[error("{path:?} should have \"{key}\" field")]
    MissingConfigKey { path: PathBuf, key: String },

    #[error("{log:?} from {config:?} does not exist")]
    MissingLogFile { log: PathBuf, config: PathBuf },

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GradeError {
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        GradeError::MalformedEntry {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
