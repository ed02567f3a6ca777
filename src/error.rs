use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RenamerError {
    #[error("folder argument is required")]
    #[diagnostic(help("pass the folder that contains the PDFs, e.g. `pdf-renamer ~/papers`, or start `--gui` and choose it there"))]
    MissingFolder,

    #[error("folder not found: {0}")]
    InvalidFolder(PathBuf),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read PDF: {0}")]
    PdfRead(String),

    #[error("Crossref request failed: {0}")]
    CrossrefHttp(String),

    #[error("background task stopped: {0}")]
    TaskAborted(String),

    #[error("terminal error: {0}")]
    Terminal(String),
}

impl RenamerError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RenamerError::MissingFolder
                | RenamerError::InvalidFolder(_)
                | RenamerError::InvalidOption(_)
                | RenamerError::ConfigRead(_)
                | RenamerError::ConfigParse(_)
        )
    }
}
