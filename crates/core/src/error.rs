use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("rules country code must not be empty")]
    EmptyCountry,

    #[error("pickup method prefix must not be empty")]
    EmptyMethodPrefix,

    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rules json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RulesError>;
