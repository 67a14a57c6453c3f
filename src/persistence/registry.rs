//! Named subsystems that contribute a slice of the save

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Opaque subsystem state; the core never looks inside
pub type Snapshot = Value;

/// A slice of game state that can be saved and restored.
///
/// `apply_snapshot` must tolerate `None`, partial or unknown fields without
/// panicking, falling back to defaults for anything missing.
pub trait SaveSubsystem {
    fn snapshot(&self) -> Snapshot;
    fn apply_snapshot(&mut self, snapshot: Option<&Snapshot>);
}

/// Subsystems are owned by the game and shared with the registry
pub type SharedSubsystem = Rc<RefCell<dyn SaveSubsystem>>;

/// Top-level payload fields owned by the envelope
pub const RESERVED_NAMES: [&str; 2] = ["version", "timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// Name was taken; the new handler took over its position
    Replaced,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyName,
    ReservedName,
}

/// Subsystems in registration order
#[derive(Default)]
pub struct SubsystemRegistry {
    handlers: IndexMap<String, SharedSubsystem>,
}

impl fmt::Debug for SubsystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

impl SubsystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`.
    ///
    /// Invalid names are rejected without touching the registry.
    pub fn register(&mut self, name: impl Into<String>, handler: SharedSubsystem) -> Registration {
        let name = name.into();
        if name.trim().is_empty() {
            log::warn!("Rejected subsystem with empty name");
            return Registration::Rejected(RejectReason::EmptyName);
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            log::warn!("Rejected subsystem {name:?}: name is reserved");
            return Registration::Rejected(RejectReason::ReservedName);
        }

        // IndexMap::insert keeps the original slot for existing keys
        if self.handlers.insert(name.clone(), handler).is_some() {
            log::warn!("Subsystem {name:?} re-registered, replacing previous handler");
            Registration::Replaced
        } else {
            log::debug!("Registered subsystem {name:?}");
            Registration::Added
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.shift_remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&SharedSubsystem> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedSubsystem)> {
        self.handlers.iter().map(|(name, handler)| (name.as_str(), handler))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Collect every subsystem's snapshot in registration order.
    ///
    /// A subsystem that is mutably borrowed elsewhere is skipped with a warning.
    pub fn snapshots(&self) -> Vec<(String, Snapshot)> {
        self.handlers
            .iter()
            .filter_map(|(name, handler)| match handler.try_borrow() {
                Ok(subsystem) => Some((name.clone(), subsystem.snapshot())),
                Err(_) => {
                    log::warn!("Subsystem {name:?} busy, left out of save");
                    None
                }
            })
            .collect()
    }

    /// Hand each subsystem its named slice of `data` (or `None` if absent)
    pub fn apply(&self, data: &Map<String, Value>) {
        for (name, handler) in &self.handlers {
            match handler.try_borrow_mut() {
                Ok(mut subsystem) => subsystem.apply_snapshot(data.get(name)),
                Err(_) => log::warn!("Subsystem {name:?} busy, snapshot not applied"),
            }
        }
    }
}
