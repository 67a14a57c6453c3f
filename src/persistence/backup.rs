//! Fixed-slot backups of the primary save
//!
//! Slot `n` lives under `"<key>_backup_<n>"` and holds a verbatim copy of a
//! previous primary string.

use serde::Serialize;
use serde_json::Value;

use super::envelope;
use super::error::BackupError;
use crate::platform::{KeyValueStore, StorageError};

/// What a backup slot currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub slot: u8,
    pub exists: bool,
    pub bytes: usize,
    /// Save time recorded in the backed-up envelope, if readable
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BackupRotator {
    key: String,
    slots: u8,
}

impl BackupRotator {
    pub fn new(key: impl Into<String>, slots: u8) -> Self {
        Self {
            key: key.into(),
            slots,
        }
    }

    pub fn slots(&self) -> u8 {
        self.slots
    }

    pub fn slot_key(&self, slot: u8) -> String {
        format!("{}_backup_{}", self.key, slot)
    }

    pub(crate) fn check_slot(&self, slot: u8) -> Result<(), BackupError> {
        if slot == 0 || slot > self.slots {
            return Err(BackupError::InvalidSlot {
                slot,
                slots: self.slots,
            });
        }
        Ok(())
    }

    /// Copy the primary save into `slot`. Returns `false` if there is no primary.
    pub fn create_backup<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        slot: u8,
    ) -> Result<bool, BackupError> {
        self.check_slot(slot)?;
        let Some(primary) = store.get(&self.key)? else {
            return Ok(false);
        };
        store.set(&self.slot_key(slot), &primary)?;
        log::debug!("Backed up save to slot {slot} ({} bytes)", primary.len());
        Ok(true)
    }

    /// Copy `slot` over the primary save. Returns `false` if the slot is empty.
    pub fn restore_backup<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        slot: u8,
    ) -> Result<bool, BackupError> {
        self.check_slot(slot)?;
        let Some(backup) = store.get(&self.slot_key(slot))? else {
            return Ok(false);
        };
        store.set(&self.key, &backup)?;
        log::info!("Restored save from backup slot {slot}");
        Ok(true)
    }

    /// Shift every slot down by one (dropping the oldest), then back up the
    /// primary into slot 1. No-op if there is no primary.
    pub fn rotate<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<bool, BackupError> {
        if self.slots == 0 || !store.contains(&self.key)? {
            return Ok(false);
        }
        for slot in (1..self.slots).rev() {
            let next = self.slot_key(slot + 1);
            match store.get(&self.slot_key(slot))? {
                Some(value) => store.set(&next, &value)?,
                None => store.remove(&next)?,
            }
        }
        self.create_backup(store, 1)
    }

    pub fn info<S: KeyValueStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<BackupInfo>, StorageError> {
        (1..=self.slots)
            .map(|slot| -> Result<BackupInfo, StorageError> {
                let info = match store.get(&self.slot_key(slot))? {
                    Some(raw) => BackupInfo {
                        slot,
                        exists: true,
                        bytes: raw.len(),
                        timestamp: envelope::unwrap(&raw).ok().and_then(|opened| {
                            opened.data.get("timestamp").and_then(Value::as_i64)
                        }),
                    },
                    None => BackupInfo {
                        slot,
                        exists: false,
                        bytes: 0,
                        timestamp: None,
                    },
                };
                Ok(info)
            })
            .collect()
    }

    pub fn delete_all<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        for slot in 1..=self.slots {
            store.remove(&self.slot_key(slot))?;
        }
        Ok(())
    }
}
