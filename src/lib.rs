//! Idle Vault - persistence and numeric core for long-running idle games
//!
//! Core modules:
//! - `numeric`: Arbitrary-magnitude `Decimal` and number formatting
//! - `persistence`: Checksummed saves, backups, migrations, import/export
//! - `platform`: Browser/native storage and clock abstraction
//! - `settings`: Persisted player preferences
//! - `statistics`: Lifetime stats and best-runs leaderboard subsystem

pub mod numeric;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod statistics;

pub use numeric::{Decimal, Notation};
pub use persistence::{SaveConfig, SaveManager, SaveSubsystem};
pub use settings::Settings;
pub use statistics::Statistics;

/// Persistence configuration constants
pub mod consts {
    /// Save format version written by this build
    pub const SAVE_VERSION: u32 = 1;

    /// Primary storage key
    pub const DEFAULT_STORAGE_KEY: &str = "idle_vault_save";

    /// Backup slots kept next to the primary save
    pub const BACKUP_SLOTS: u8 = 3;

    /// Default autosave period
    pub const AUTOSAVE_INTERVAL_SECS: u32 = 30;
}
