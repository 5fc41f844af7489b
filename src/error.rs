use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with a set of sort criteria, raised before any file is touched.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Sort position {0} already has a setting mapped to it")]
    DuplicatePosition(u8),

    #[error("Sort position {0} is out of range (expected 1-3)")]
    InvalidPosition(u8),

    #[error("No settings given for '{0}'")]
    EmptyCriterion(&'static str),

    #[error("Unable to sort without settings")]
    NoCriteria,

    #[error("Invalid date '{0}' (expected MM-DD-YYYY)")]
    InvalidDate(String),

    #[error("Starting date {start} is not before ending date {end}")]
    InvertedRange { start: String, end: String },

    #[error("Unknown file type category '{0}'")]
    UnknownCategory(String),

    #[error("Invalid keyword group '{0}' (expected FOLDER=word,word)")]
    InvalidKeywordGroup(String),

    #[error("Cannot read settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot write settings file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that end a sort, unpack or report run.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not start sort worker: {0}")]
    Spawn(io::Error),

    #[error("Sort worker panicked")]
    WorkerPanicked,
}

impl SortError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        SortError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
