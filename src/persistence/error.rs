//! Error types for the persistence boundary
//!
//! Nothing below the [`SaveManager`](super::SaveManager) panics; every
//! failure surfaces as one of these.

use thiserror::Error;

use crate::platform::StorageError;

/// Stored string could not be opened as a save envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("save data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save data root is not a JSON object")]
    NotAnObject,
    #[error("envelope `data` field is not a JSON object")]
    DataNotAnObject,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to encode save: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to back up previous save: {0}")]
    Backup(#[source] BackupError),
    #[error("failed to write save: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read save: {0}")]
    Storage(#[from] StorageError),
    #[error("save is unreadable: {0}")]
    Parse(#[from] EnvelopeError),
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup slot {slot} out of range (1..={slots})")]
    InvalidSlot { slot: u8, slots: u8 },
    #[error("backup slot {slot} is empty")]
    Empty { slot: u8 },
    #[error("backup storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Restoring a backup copies it into place and then loads it
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no save to export")]
    NoSave,
    #[error("failed to read save: {0}")]
    Storage(#[from] StorageError),
}

/// Rejected import text; the stored save is left untouched
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import text is empty")]
    Empty,
    #[error("invalid character {found:?} at position {position}")]
    InvalidCharacters { position: usize, found: char },
    #[error("import text is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("import text has a broken escape sequence: {0}")]
    Escape(String),
    #[error("import text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("imported save is not a JSON object")]
    NotAnObject,
    #[error("failed to write imported save: {0}")]
    Storage(#[from] StorageError),
}
