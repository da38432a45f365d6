use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read keyword file {path}: {source}")]
    KeywordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open output file {path}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scanner error: {0}")]
    Scan(#[from] lurker_scanner::ScanError),

    #[error("Result pipeline is closed")]
    PipelineClosed,
}

pub type Result<T> = std::result::Result<T, CoreError>;
