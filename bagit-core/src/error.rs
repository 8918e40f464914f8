use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BagError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    IoAt {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("bag already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed manifest {manifest} line {line}: {reason}")]
    MalformedManifest {
        manifest: String,
        line: usize,
        reason: String,
    },

    #[error("duplicate entry for {path} in {manifest}")]
    DuplicateEntry { manifest: String, path: String },

    #[error("malformed tag file {name} line {line}: {reason}")]
    MalformedTagFile {
        name: String,
        line: usize,
        reason: String,
    },

    #[error("unable to find: {0}")]
    MissingFile(String),

    #[error("no payload manifest found in {0}")]
    NoManifestFound(PathBuf),

    #[error("unable to find tag file {0}")]
    NotFound(String),

    #[error("unsafe payload path: {0}")]
    UnsafePath(String),

    #[error("{algorithm} mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("payload file not listed in any manifest: {0}")]
    UnlistedPayloadFile(String),

    #[error("cannot {op} a bag in state {state}")]
    InvalidState { op: &'static str, state: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{op} failed with {problems} problem(s)")]
    Incomplete { op: &'static str, problems: usize },
}

impl BagError {
    /// Attach the path an I/O failure happened on.
    pub fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BagError {
        let path = path.into();
        move |source| BagError::IoAt { path, source }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, BagError>;
