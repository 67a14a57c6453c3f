//! Save format migrations
//!
//! Each step upgrades a payload from one version to the next. Versions with
//! no structural change need no step; the version number is simply bumped.

use serde_json::Value;

use super::envelope::Payload;

pub type MigrationFn = fn(&mut Payload);

#[derive(Debug, Clone)]
pub struct Migration {
    /// Version this step upgrades from (to `from + 1`)
    pub from: u32,
    pub description: &'static str,
    pub apply: MigrationFn,
}

/// Ordered chain of migration steps
#[derive(Debug, Clone, Default)]
pub struct Migrations {
    steps: Vec<Migration>,
}

/// Payload version; saves that predate versioning count as 0
pub fn payload_version(data: &Payload) -> u32 {
    data.get("version")
        .and_then(Value::as_u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step; a later step for the same `from` replaces the earlier one
    pub fn with_step(mut self, from: u32, description: &'static str, apply: MigrationFn) -> Self {
        self.steps.retain(|step| step.from != from);
        self.steps.push(Migration {
            from,
            description,
            apply,
        });
        self.steps.sort_by_key(|step| step.from);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Upgrade `data` to `target`, returning the version it started at if
    /// anything changed. Newer-than-target saves are left alone.
    pub fn migrate(&self, data: &mut Payload, target: u32) -> Option<u32> {
        let original = payload_version(data);
        if original > target {
            log::warn!("Save version {original} is newer than supported version {target}");
            return None;
        }
        if original == target {
            return None;
        }

        for step in self
            .steps
            .iter()
            .filter(|step| step.from >= original && step.from < target)
        {
            log::info!(
                "Migrating save v{} -> v{}: {}",
                step.from,
                step.from + 1,
                step.description
            );
            (step.apply)(data);
        }
        data.insert("version".to_string(), Value::from(target));
        Some(original)
    }
}
