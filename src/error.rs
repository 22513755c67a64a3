//! Error type shared by every pipeline stage.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Report file missing or unreadable
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A column a stage cannot work without is not in the table
    #[error("required column not found: {0}")]
    MissingColumn(String),

    #[error("imputation failed: {0}")]
    Imputation(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("xgboost error: {0}")]
    Xgboost(#[from] xgboost::XGBError),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("tracking error: {0}")]
    Tracking(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = Error::io(
            "./data/missing.rpt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("./data/missing.rpt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_missing_column_display() {
        let err = Error::MissingColumn("KM".to_string());
        assert_eq!(err.to_string(), "required column not found: KM");
    }
}
