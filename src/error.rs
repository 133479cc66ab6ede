use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DysonError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("engine request failed: {0}")]
    EngineHttp(String),

    #[error("engine returned status {status}: {message}")]
    EngineStatus { status: u16, message: String },

    #[error("unexpected engine response: {0}")]
    EngineResponse(String),

    #[error("archive download failed: {0}")]
    DownloadHttp(String),

    #[error("archive download returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("download url carries no document id: {0}")]
    #[diagnostic(help("the engine's download url format may have changed"))]
    MissingDocumentId(String),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("archive for document {expected} contains band file for {found}")]
    DocumentIdMismatch { expected: String, found: String },

    #[error("archive for document {id} is missing band file {}", path.display())]
    MissingBand { id: String, path: PathBuf },

    #[error("band rasters cannot be composited: {0}")]
    BandMismatch(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("failed to read feature collection {path}: {message}")]
    FeatureRead { path: PathBuf, message: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed record {path}: {message}")]
    RecordParse { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
