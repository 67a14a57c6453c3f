//! Save/load persistence with integrity verification
//!
//! Features:
//! - Versioned JSON envelope with a 32-bit checksum
//! - Subsystem registry (each subsystem owns one key of the payload)
//! - Backup slots, optionally rotated on every save
//! - Legacy payload detection and version migrations
//! - Clipboard-safe export and sanitized import
//! - Coalescing autosave timer

pub mod autosave;
pub mod backup;
pub mod envelope;
pub mod error;
pub mod manager;
pub mod migration;
pub mod registry;
pub mod transfer;

pub use autosave::Autosave;
pub use backup::{BackupInfo, BackupRotator};
pub use envelope::{Envelope, Payload, Unwrapped, checksum};
pub use error::{
    BackupError, EnvelopeError, ExportError, ImportError, LoadError, RestoreError, SaveError,
};
pub use manager::{LoadReport, SaveConfig, SaveManager, SaveReport, SaveState};
pub use migration::{Migration, MigrationFn, Migrations};
pub use registry::{
    Registration, RejectReason, SaveSubsystem, SharedSubsystem, Snapshot, SubsystemRegistry,
};
pub use transfer::{FORBIDDEN_KEYS, ImportReport};
