//! Persistence facade
//!
//! [`SaveManager`] owns the store and ties the pieces together:
//! - `save`: registry snapshots + core fields → envelope → backup → write
//! - `load`: read → unwrap/verify → migrate → hand slices to subsystems
//! - backups, export/import and display settings

use serde::{Deserialize, Serialize};

use super::backup::{BackupInfo, BackupRotator};
use super::envelope::{self, Payload};
use super::error::{BackupError, ExportError, ImportError, LoadError, RestoreError, SaveError};
use super::migration::Migrations;
use super::registry::{Registration, SharedSubsystem, SubsystemRegistry};
use super::transfer::{self, ImportReport};
use crate::consts::{BACKUP_SLOTS, DEFAULT_STORAGE_KEY, SAVE_VERSION};
use crate::numeric::Decimal;
use crate::platform::{self, KeyValueStore, StorageError};
use crate::settings::Settings;

/// Where and how saves are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Primary key; backups and settings derive their keys from it
    pub storage_key: String,
    /// Version stamped into new saves and targeted by migrations
    pub version: u32,
    pub backup_slots: u8,
    /// Shift all slots on every save instead of overwriting slot 1
    pub rotate_backups: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            version: SAVE_VERSION,
            backup_slots: BACKUP_SLOTS,
            rotate_backups: false,
        }
    }
}

impl SaveConfig {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ..Self::default()
        }
    }
}

/// Outcome of the most recent save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    SaveFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub timestamp: i64,
    pub bytes: usize,
    pub checksum: i32,
    /// Previous primary was copied into a backup slot
    pub backed_up: bool,
    /// Subsystems that contributed a snapshot
    pub subsystems: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadReport {
    /// Loaded payload, `None` for a fresh game
    pub data: Option<Payload>,
    pub checksum_mismatch: bool,
    pub legacy: bool,
    /// Version the payload was migrated from, if it was migrated
    pub migrated_from: Option<u32>,
}

impl LoadReport {
    pub fn is_fresh(&self) -> bool {
        self.data.is_none()
    }
}

/// Save orchestrator over a [`KeyValueStore`]
pub struct SaveManager<S: KeyValueStore> {
    store: S,
    config: SaveConfig,
    registry: SubsystemRegistry,
    backups: BackupRotator,
    migrations: Migrations,
    settings: Settings,
    state: SaveState,
    clock: fn() -> i64,
}

impl<S: KeyValueStore> SaveManager<S> {
    pub fn new(store: S, config: SaveConfig) -> Self {
        let settings = Settings::load(&store, &config.storage_key);
        let backups = BackupRotator::new(config.storage_key.clone(), config.backup_slots);
        log::info!(
            "Save manager ready (key {:?}, v{}, {} backup slots)",
            config.storage_key,
            config.version,
            config.backup_slots
        );
        Self {
            store,
            config,
            registry: SubsystemRegistry::new(),
            backups,
            migrations: Migrations::new(),
            settings,
            state: SaveState::Idle,
            clock: platform::now_ms,
        }
    }

    /// Replace the wall clock used for save timestamps
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_migrations(mut self, migrations: Migrations) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn register_subsystem(
        &mut self,
        name: impl Into<String>,
        handler: SharedSubsystem,
    ) -> Registration {
        self.registry.register(name, handler)
    }

    pub fn registry(&self) -> &SubsystemRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SubsystemRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // === Save / load ===

    /// Snapshot every subsystem, merge with `core_fields` and write the
    /// result. The previous primary is backed up first; if anything fails
    /// the primary is left as it was.
    pub fn save(&mut self, core_fields: &Payload) -> Result<SaveReport, SaveError> {
        self.state = SaveState::Saving;
        match self.write_save(core_fields) {
            Ok(report) => {
                self.state = SaveState::Idle;
                log::info!(
                    "Game saved ({} bytes, {} subsystems)",
                    report.bytes,
                    report.subsystems
                );
                Ok(report)
            }
            Err(err) => {
                self.state = SaveState::SaveFailed;
                log::error!("Save failed: {err}");
                Err(err)
            }
        }
    }

    fn write_save(&mut self, core_fields: &Payload) -> Result<SaveReport, SaveError> {
        let timestamp = (self.clock)();
        let snapshots = self.registry.snapshots();
        let subsystems = snapshots.len();
        let envelope = envelope::wrap(self.config.version, timestamp, core_fields, snapshots)?;
        let json = envelope.to_json_string()?;

        let backed_up = if self.backups.slots() == 0 {
            false
        } else if self.config.rotate_backups {
            self.backups.rotate(&mut self.store).map_err(SaveError::Backup)?
        } else {
            self.backups
                .create_backup(&mut self.store, 1)
                .map_err(SaveError::Backup)?
        };

        self.store.set(&self.config.storage_key, &json)?;
        log::debug!("Wrote save envelope (checksum {})", envelope.checksum);

        Ok(SaveReport {
            timestamp,
            bytes: json.len(),
            checksum: envelope.checksum,
            backed_up,
            subsystems,
        })
    }

    /// Read, verify and apply the primary save.
    ///
    /// A missing save is a fresh game: every subsystem is reset with `None`
    /// and the report carries no data.
    pub fn load(&mut self) -> Result<LoadReport, LoadError> {
        let raw = self.store.get(&self.config.storage_key).map_err(|err| {
            log::error!("Could not read save: {err}");
            LoadError::from(err)
        })?;

        let Some(raw) = raw else {
            log::info!("No save found, starting fresh");
            self.registry.apply(&Payload::new());
            return Ok(LoadReport::default());
        };

        let opened = envelope::unwrap(&raw).map_err(|err| {
            log::error!("Save is unreadable: {err}");
            LoadError::from(err)
        })?;
        if opened.corrupted {
            log::warn!("Save checksum mismatch, loading anyway");
        }
        if opened.legacy {
            log::info!("Loading legacy save without envelope");
        }

        let mut data = opened.data;
        let migrated_from = self.migrations.migrate(&mut data, self.config.version);
        self.registry.apply(&data);
        log::info!("Game loaded ({} subsystems)", self.registry.len());

        Ok(LoadReport {
            data: Some(data),
            checksum_mismatch: opened.corrupted,
            legacy: opened.legacy,
            migrated_from,
        })
    }

    pub fn has_save(&self) -> bool {
        match self.store.contains(&self.config.storage_key) {
            Ok(found) => found,
            Err(err) => {
                log::warn!("Could not check for save: {err}");
                false
            }
        }
    }

    pub fn delete_save(&mut self, include_backups: bool) -> Result<(), StorageError> {
        self.store.remove(&self.config.storage_key)?;
        if include_backups {
            self.backups.delete_all(&mut self.store)?;
        }
        log::info!("Deleted save (backups included: {include_backups})");
        Ok(())
    }

    // === Backups ===

    pub fn create_backup(&mut self, slot: u8) -> Result<bool, BackupError> {
        self.backups.create_backup(&mut self.store, slot)
    }

    /// Copy a backup over the primary save and load it.
    ///
    /// A backup that cannot be opened is refused before the primary is touched.
    pub fn restore_backup(&mut self, slot: u8) -> Result<LoadReport, RestoreError> {
        self.backups.check_slot(slot)?;
        let raw = self
            .store
            .get(&self.backups.slot_key(slot))
            .map_err(BackupError::from)?
            .ok_or(BackupError::Empty { slot })?;
        envelope::unwrap(&raw).map_err(LoadError::from)?;

        self.backups.restore_backup(&mut self.store, slot)?;
        Ok(self.load()?)
    }

    pub fn backups_info(&self) -> Result<Vec<BackupInfo>, StorageError> {
        self.backups.info(&self.store)
    }

    // === Transfer ===

    pub fn export_save(&self) -> Result<String, ExportError> {
        transfer::export_save(&self.store, &self.config.storage_key)
    }

    /// Replace the primary save with imported text; call [`load`](Self::load)
    /// afterwards to apply it
    pub fn import_save(&mut self, text: &str) -> Result<ImportReport, ImportError> {
        transfer::import_save(&mut self.store, &self.config.storage_key, text)
    }

    // === Settings ===

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn save_settings(&mut self) -> Result<(), SaveError> {
        self.settings.save(&mut self.store, &self.config.storage_key)
    }

    /// Format a value in the player's chosen notation
    pub fn format(&self, value: &Decimal) -> String {
        self.settings.notation.format(value)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::{Value, json};

    use super::*;
    use crate::numeric::Notation;
    use crate::persistence::registry::{SaveSubsystem, Snapshot};
    use crate::platform::MemoryStore;

    const KEY: &str = "test_save";
    const NOW: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct Mining {
        level: i64,
        applied: usize,
    }

    impl SaveSubsystem for Mining {
        fn snapshot(&self) -> Snapshot {
            json!({ "level": self.level })
        }

        fn apply_snapshot(&mut self, snapshot: Option<&Snapshot>) {
            self.applied += 1;
            self.level = snapshot
                .and_then(|s| s.get("level"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
        }
    }

    fn manager() -> SaveManager<MemoryStore> {
        SaveManager::new(MemoryStore::new(), SaveConfig::new(KEY)).with_clock(|| NOW)
    }

    fn core(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn loaded(report: &LoadReport) -> &Payload {
        report.data.as_ref().unwrap()
    }

    #[test]
    fn test_fresh_game() {
        let mut manager = manager();
        let mining = Rc::new(RefCell::new(Mining { level: 4, applied: 0 }));
        manager.register_subsystem("mining", mining.clone());

        assert!(!manager.has_save());
        let report = manager.load().unwrap();
        assert!(report.is_fresh());
        assert_eq!(mining.borrow().level, 0);
        assert_eq!(mining.borrow().applied, 1);
    }

    #[test]
    fn test_save_then_load() {
        let mut manager = manager();
        let report = manager.save(&core(json!({"gold": 5}))).unwrap();
        assert_eq!(report.timestamp, NOW);
        assert!(!report.backed_up);
        assert_eq!(manager.state(), SaveState::Idle);
        assert!(manager.has_save());

        let report = manager.load().unwrap();
        let data = loaded(&report);
        assert_eq!(data["gold"], json!(5));
        assert_eq!(data["version"], json!(SAVE_VERSION));
        assert_eq!(data["timestamp"], json!(NOW));
        assert!(!report.checksum_mismatch);
        assert!(!report.legacy);
        assert_eq!(report.migrated_from, None);
    }

    #[test]
    fn test_subsystems_round_trip() {
        let mut manager = manager();
        let mining = Rc::new(RefCell::new(Mining { level: 7, applied: 0 }));
        manager.register_subsystem("mining", mining.clone());

        let report = manager.save(&Payload::new()).unwrap();
        assert_eq!(report.subsystems, 1);

        mining.borrow_mut().level = 1;
        manager.load().unwrap();
        assert_eq!(mining.borrow().level, 7);
    }

    #[test]
    fn test_corrupted_save_is_an_error() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 5}))).unwrap();
        let raw = manager.store().get(KEY).unwrap().unwrap();
        manager.store_mut().set(KEY, &raw[..raw.len() / 2]).unwrap();

        assert!(matches!(manager.load(), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_last_save_wins() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 5, "gems": 1}))).unwrap();
        let report = manager.save(&core(json!({"gold": 9}))).unwrap();
        assert!(report.backed_up);

        let report = manager.load().unwrap();
        let data = loaded(&report);
        assert_eq!(data["gold"], json!(9));
        assert!(!data.contains_key("gems"));
    }

    #[test]
    fn test_backup_restore_ordering() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 1}))).unwrap();
        assert!(manager.create_backup(1).unwrap());
        manager.save(&core(json!({"gold": 2}))).unwrap();

        let report = manager.restore_backup(1).unwrap();
        assert_eq!(loaded(&report)["gold"], json!(1));
        assert_eq!(manager.load().unwrap().data.unwrap()["gold"], json!(1));
    }

    #[test]
    fn test_restore_refuses_empty_or_broken_backup() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 1}))).unwrap();
        let primary = manager.store().get(KEY).unwrap();

        assert!(matches!(
            manager.restore_backup(2),
            Err(RestoreError::Backup(BackupError::Empty { slot: 2 }))
        ));
        assert!(matches!(
            manager.restore_backup(9),
            Err(RestoreError::Backup(BackupError::InvalidSlot { .. }))
        ));

        manager.store_mut().set("test_save_backup_2", "{garbage").unwrap();
        assert!(matches!(manager.restore_backup(2), Err(RestoreError::Load(_))));
        assert_eq!(manager.store().get(KEY).unwrap(), primary);
    }

    #[test]
    fn test_restore_write_failure_keeps_primary() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 1}))).unwrap();
        manager.save(&core(json!({"gold": 2}))).unwrap();
        let primary = manager.store().get(KEY).unwrap();

        manager.store_mut().set_fail_writes(true);
        assert!(matches!(
            manager.restore_backup(1),
            Err(RestoreError::Backup(BackupError::Storage(_)))
        ));

        manager.store_mut().set_fail_writes(false);
        assert_eq!(manager.store().get(KEY).unwrap(), primary);
        assert_eq!(manager.load().unwrap().data.unwrap()["gold"], json!(2));
    }

    #[test]
    fn test_failed_write_keeps_primary() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 1}))).unwrap();
        let primary = manager.store().get(KEY).unwrap();

        manager.store_mut().set_fail_writes(true);
        assert!(manager.save(&core(json!({"gold": 2}))).is_err());
        assert_eq!(manager.state(), SaveState::SaveFailed);

        manager.store_mut().set_fail_writes(false);
        assert_eq!(manager.store().get(KEY).unwrap(), primary);
        manager.save(&core(json!({"gold": 3}))).unwrap();
        assert_eq!(manager.state(), SaveState::Idle);
    }

    #[test]
    fn test_quota_failure_is_reported() {
        let store = MemoryStore::with_quota(64);
        let mut manager = SaveManager::new(store, SaveConfig::new(KEY)).with_clock(|| NOW);
        let big = "x".repeat(128);
        assert!(matches!(
            manager.save(&core(json!({ "blob": big }))),
            Err(SaveError::Storage(StorageError::QuotaExceeded { .. }))
        ));
        assert!(!manager.has_save());
    }

    #[test]
    fn test_unreadable_store() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 1}))).unwrap();
        manager.store_mut().set_fail_reads(true);
        assert!(!manager.has_save());
        assert!(matches!(manager.load(), Err(LoadError::Storage(_))));
    }

    #[test]
    fn test_checksum_mismatch_still_loads() {
        let mut manager = manager();
        manager.save(&core(json!({"gold": 5}))).unwrap();
        let raw = manager.store().get(KEY).unwrap().unwrap();
        manager
            .store_mut()
            .set(KEY, &raw.replace("\"gold\":5", "\"gold\":6"))
            .unwrap();

        let report = manager.load().unwrap();
        assert!(report.checksum_mismatch);
        assert_eq!(loaded(&report)["gold"], json!(6));
    }

    #[test]
    fn test_legacy_save_is_migrated() {
        fn rename_gold(data: &mut Payload) {
            if let Some(gold) = data.remove("gold") {
                data.insert("coins".to_string(), gold);
            }
        }

        let mut manager =
            manager().with_migrations(Migrations::new().with_step(0, "rename gold", rename_gold));
        manager.store_mut().set(KEY, r#"{"gold":5}"#).unwrap();

        let report = manager.load().unwrap();
        assert!(report.legacy);
        assert_eq!(report.migrated_from, Some(0));
        let data = loaded(&report);
        assert_eq!(data["coins"], json!(5));
        assert_eq!(data["version"], json!(SAVE_VERSION));
    }

    #[test]
    fn test_current_save_is_not_migrated_again() {
        fn rename_gold(data: &mut Payload) {
            if let Some(gold) = data.remove("gold") {
                data.insert("coins".to_string(), gold);
            }
        }

        let mut manager =
            manager().with_migrations(Migrations::new().with_step(0, "rename gold", rename_gold));
        manager.save(&core(json!({"gold": 5, "version": "1.4.2"}))).unwrap();

        let report = manager.load().unwrap();
        assert_eq!(report.migrated_from, None);
        let data = loaded(&report);
        assert_eq!(data["gold"], json!(5));
        assert_eq!(data["version"], json!(SAVE_VERSION));
        assert!(!data.contains_key("coins"));
    }

    #[test]
    fn test_rotating_backups() {
        let config = SaveConfig {
            rotate_backups: true,
            ..SaveConfig::new(KEY)
        };
        let mut manager = SaveManager::new(MemoryStore::new(), config).with_clock(|| NOW);
        for gold in 1..=4 {
            manager.save(&core(json!({ "gold": gold }))).unwrap();
        }

        let info = manager.backups_info().unwrap();
        assert!(info.iter().all(|slot| slot.exists && slot.timestamp == Some(NOW)));
        assert_eq!(manager.restore_backup(3).unwrap().data.unwrap()["gold"], json!(1));
    }

    #[test]
    fn test_no_backup_slots() {
        let config = SaveConfig {
            backup_slots: 0,
            ..SaveConfig::new(KEY)
        };
        let mut manager = SaveManager::new(MemoryStore::new(), config).with_clock(|| NOW);
        manager.save(&Payload::new()).unwrap();
        let report = manager.save(&Payload::new()).unwrap();
        assert!(!report.backed_up);
        assert!(manager.backups_info().unwrap().is_empty());
    }

    #[test]
    fn test_delete_save() {
        let mut manager = manager();
        manager.save(&Payload::new()).unwrap();
        manager.save(&Payload::new()).unwrap();

        manager.delete_save(false).unwrap();
        assert!(!manager.has_save());
        assert!(manager.backups_info().unwrap()[0].exists);

        manager.delete_save(true).unwrap();
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_export_import_then_load() {
        let mut source = manager();
        source.save(&core(json!({"gold": 5}))).unwrap();
        let text = source.export_save().unwrap();

        let mut target = manager();
        let mining = Rc::new(RefCell::new(Mining::default()));
        target.register_subsystem("mining", mining.clone());
        target.import_save(&text).unwrap();
        let report = target.load().unwrap();
        assert!(!report.checksum_mismatch);
        assert_eq!(loaded(&report)["gold"], json!(5));
    }

    #[test]
    fn test_import_pollution_is_stripped() {
        let mut manager = manager();
        let text = transfer::encode_export(r#"{"__proto__":{"polluted":true}}"#);
        let report = manager.import_save(&text).unwrap();
        assert_eq!(report.stripped_keys, 1);

        let raw = manager.store().get(KEY).unwrap().unwrap();
        assert!(!raw.contains("__proto__"));
        assert!(!raw.contains("polluted"));
    }

    #[test]
    fn test_settings_persist_and_format() {
        let mut manager = manager();
        assert_eq!(manager.format(&Decimal::from(1500)), "1.50K");

        manager.settings_mut().notation = Notation::Scientific;
        manager.save_settings().unwrap();
        assert_eq!(manager.format(&Decimal::from(1500)), "1.50e3");

        let store = manager.store().clone();
        let reopened = SaveManager::new(store, SaveConfig::new(KEY));
        assert_eq!(reopened.settings().notation, Notation::Scientific);
    }

    #[test]
    fn test_config_defaults() {
        let config: SaveConfig = serde_json::from_str(r#"{"storage_key":"x"}"#).unwrap();
        assert_eq!(config.storage_key, "x");
        assert_eq!(config.version, SAVE_VERSION);
        assert_eq!(config.backup_slots, BACKUP_SLOTS);
        assert!(!config.rotate_backups);
    }
}
