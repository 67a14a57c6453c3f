//! Periodic autosave with request coalescing
//!
//! Driven from the game tick. Any number of manual save requests between two
//! ticks collapse into one save, always built from the state at tick time.

use super::envelope::Payload;
use super::error::SaveError;
use super::manager::{SaveManager, SaveReport};
use crate::platform::KeyValueStore;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct Autosave {
    /// 0 disables the timer; requests still save
    interval_ms: i64,
    last_save_ms: i64,
    pending: bool,
    /// Requests folded into the pending one
    coalesced: u32,
}

impl Autosave {
    pub fn new(interval_ms: i64, now_ms: i64) -> Self {
        Self {
            interval_ms: interval_ms.max(0),
            last_save_ms: now_ms,
            pending: false,
            coalesced: 0,
        }
    }

    pub fn from_settings(settings: &Settings, now_ms: i64) -> Self {
        Self::new(settings.autosave_interval_ms(), now_ms)
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: i64) {
        self.interval_ms = interval_ms.max(0);
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Ask for a save on the next tick
    pub fn request(&mut self) {
        if self.pending {
            self.coalesced += 1;
        }
        self.pending = true;
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.pending || (self.interval_ms > 0 && now_ms - self.last_save_ms >= self.interval_ms)
    }

    /// Save through `manager` if a request is pending or the interval has
    /// elapsed. `core_fields` is only evaluated when a save happens.
    ///
    /// A failed save is not retried until the next request or interval.
    pub fn tick<S: KeyValueStore>(
        &mut self,
        now_ms: i64,
        manager: &mut SaveManager<S>,
        core_fields: impl FnOnce() -> Payload,
    ) -> Option<Result<SaveReport, SaveError>> {
        if !self.is_due(now_ms) {
            return None;
        }
        if self.coalesced > 0 {
            log::debug!("Coalesced {} save requests into one", self.coalesced + 1);
        }

        let result = manager.save(&core_fields());
        self.pending = false;
        self.coalesced = 0;
        self.last_save_ms = now_ms;
        Some(result)
    }
}
