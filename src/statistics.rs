//! Lifetime statistics and best-runs leaderboard
//!
//! Registered with the save manager under `"statistics"`; tracks the top 10
//! runs by currency earned.

use serde::{Deserialize, Serialize};

use crate::numeric::Decimal;
use crate::persistence::{SaveSubsystem, Snapshot};

/// Maximum number of runs to keep
pub const MAX_RUN_RECORDS: usize = 10;

/// A single finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Currency earned during the run
    pub earned: Decimal,
    /// Wave reached
    pub wave: u32,
    /// Unix timestamp (ms) when the run ended
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub lifetime_earned: Decimal,
    pub highest_wave: u32,
    pub prestige_count: u32,
    /// Best runs, sorted descending by `earned`
    pub runs: Vec<RunRecord>,
}

impl Statistics {
    pub const SUBSYSTEM_NAME: &'static str = "statistics";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_earnings(&mut self, amount: Decimal) {
        if amount > Decimal::ZERO {
            self.lifetime_earned += amount;
        }
    }

    pub fn record_prestige(&mut self) {
        self.prestige_count += 1;
    }

    /// Check if a run qualifies for the leaderboard
    pub fn qualifies(&self, earned: Decimal) -> bool {
        if earned <= Decimal::ZERO {
            return false;
        }
        if self.runs.len() < MAX_RUN_RECORDS {
            return true;
        }
        self.runs.last().map(|r| earned > r.earned).unwrap_or(true)
    }

    /// Rank a run would achieve (1-indexed, None if it doesn't qualify)
    pub fn potential_rank(&self, earned: Decimal) -> Option<usize> {
        if !self.qualifies(earned) {
            return None;
        }
        let rank = self.runs.iter().position(|r| earned > r.earned);
        Some(rank.unwrap_or(self.runs.len()) + 1)
    }

    /// Record a finished run, returning its rank if it made the leaderboard
    pub fn record_run(&mut self, earned: Decimal, wave: u32, timestamp: i64) -> Option<usize> {
        self.highest_wave = self.highest_wave.max(wave);
        let rank = self.potential_rank(earned)?;
        self.runs.insert(
            rank - 1,
            RunRecord {
                earned,
                wave,
                timestamp,
            },
        );
        self.runs.truncate(MAX_RUN_RECORDS);
        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn best_run(&self) -> Option<&RunRecord> {
        self.runs.first()
    }
}

impl SaveSubsystem for Statistics {
    fn snapshot(&self) -> Snapshot {
        serde_json::to_value(self).unwrap_or_else(|err| {
            log::error!("Failed to snapshot statistics: {err}");
            Snapshot::Null
        })
    }

    fn apply_snapshot(&mut self, snapshot: Option<&Snapshot>) {
        let Some(snapshot) = snapshot else {
            *self = Self::default();
            return;
        };
        match Self::deserialize(snapshot) {
            Ok(mut stats) => {
                // Hand-edited saves may be out of order or oversized
                stats.runs.sort_by(|a, b| b.earned.cmp(&a.earned));
                stats.runs.truncate(MAX_RUN_RECORDS);
                log::info!("Loaded statistics ({} runs)", stats.runs.len());
                *self = stats;
            }
            Err(err) => {
                log::warn!("Ignoring unreadable statistics: {err}");
                *self = Self::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn d(value: f64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_leaderboard_ordering() {
        let mut stats = Statistics::new();
        assert_eq!(stats.record_run(d(100.0), 3, 1), Some(1));
        assert_eq!(stats.record_run(d(500.0), 5, 2), Some(1));
        assert_eq!(stats.record_run(d(200.0), 4, 3), Some(2));
        let earned: Vec<_> = stats.runs.iter().map(|r| r.earned).collect();
        assert_eq!(earned, [d(500.0), d(200.0), d(100.0)]);
        assert_eq!(stats.highest_wave, 5);
        assert_eq!(stats.best_run().map(|r| r.wave), Some(5));
    }

    #[test]
    fn test_leaderboard_is_capped() {
        let mut stats = Statistics::new();
        for i in 1..=12 {
            stats.record_run(d(i as f64 * 10.0), 1, i);
        }
        assert_eq!(stats.runs.len(), MAX_RUN_RECORDS);
        assert!(!stats.qualifies(d(30.0)));
        assert_eq!(stats.potential_rank(d(35.0)), Some(10));
        assert_eq!(stats.record_run(d(1.0), 99, 0), None);
        // Wave still counts even when the run misses the board
        assert_eq!(stats.highest_wave, 99);
    }

    #[test]
    fn test_zero_runs_never_qualify() {
        let stats = Statistics::new();
        assert!(!stats.qualifies(Decimal::ZERO));
        assert!(!stats.qualifies(d(-5.0)));
    }

    #[test]
    fn test_earnings_beyond_f64_range() {
        let mut stats = Statistics::new();
        let huge: Decimal = "1e400".parse().unwrap();
        stats.record_earnings(huge);
        stats.record_earnings(huge);
        stats.record_earnings(d(-1.0));
        assert_eq!(stats.lifetime_earned, Decimal::from_parts(2.0, 400));
    }

    #[test]
    fn test_snapshot_apply_is_idempotent() {
        let mut stats = Statistics::new();
        stats.record_earnings("3.5e1200".parse().unwrap());
        stats.record_run(d(250.0), 7, 1_700_000_000_000);
        stats.record_prestige();

        let snapshot = stats.snapshot();
        let mut restored = Statistics::new();
        restored.apply_snapshot(Some(&snapshot));
        assert_eq!(restored, stats);
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn test_apply_tolerates_missing_and_bad_input() {
        let mut stats = Statistics::new();
        stats.record_run(d(1.0), 1, 1);
        stats.apply_snapshot(None);
        assert_eq!(stats, Statistics::default());

        stats.apply_snapshot(Some(&json!({"highest_wave": 12})));
        assert_eq!(stats.highest_wave, 12);
        assert!(stats.is_empty());

        stats.apply_snapshot(Some(&json!("not an object")));
        assert_eq!(stats, Statistics::default());

        let unsorted = json!({"runs": [
            {"earned": {"mantissa": 1.0, "exponent": 1}, "wave": 1, "timestamp": 0},
            {"earned": {"mantissa": 5.0, "exponent": 3}, "wave": 2, "timestamp": 0}
        ]});
        stats.apply_snapshot(Some(&unsorted));
        assert_eq!(stats.runs[0].wave, 2);
    }
}
