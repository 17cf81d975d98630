//! Weekly progress: which bosses have been logged since the last reset.

use chrono::{DateTime, Local};
use serde::Serialize;

/// Distinct bosses per week that count as a finished week.
pub const WEEKLY_QUOTA: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressState {
    InProgress { done: usize },
    Complete,
}

/// The weekly completion set plus when the current week was started.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyProgress {
    completed: Vec<String>,
    started_at: DateTime<Local>,
}

impl Default for WeeklyProgress {
    fn default() -> Self {
        WeeklyProgress::new()
    }
}

impl WeeklyProgress {
    pub fn new() -> Self {
        WeeklyProgress {
            completed: Vec::new(),
            started_at: Local::now(),
        }
    }

    /// Record a boss as logged. Returns false if it was already recorded.
    pub fn mark_done(&mut self, boss: &str) -> bool {
        if self.is_done(boss) {
            return false;
        }
        self.completed.push(boss.to_string());
        true
    }

    pub fn is_done(&self, boss: &str) -> bool {
        self.completed.iter().any(|b| b == boss)
    }

    /// Bosses in the order they were first logged.
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.count() >= WEEKLY_QUOTA
    }

    pub fn state(&self) -> ProgressState {
        if self.is_complete() {
            ProgressState::Complete
        } else {
            ProgressState::InProgress { done: self.count() }
        }
    }

    /// Fraction for the progress bar, capped at 1.
    pub fn fraction(&self) -> f64 {
        (self.count() as f64 / WEEKLY_QUOTA as f64).min(1.0)
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Start a new week. Only allowed once the week is complete; returns
    /// whether the set was cleared.
    pub fn reset(&mut self) -> bool {
        if !self.is_complete() {
            return false;
        }
        self.completed.clear();
        self.started_at = Local::now();
        true
    }
}
