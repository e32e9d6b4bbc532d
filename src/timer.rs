use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::dates::{api_timestamp, format_elapsed};
use crate::error::{FreshtimeError, Result};
use crate::models::NewTimeEntry;
use crate::storage::{config_dir, read_json, write_json};

/// Entries shorter than this are logged as this.
pub const MIN_LOGGED_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
    pub client_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    pub billable: bool,
}

impl TimerState {
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        let millis = (now - self.started_at).num_milliseconds().max(0);
        (millis + 500) / 1000
    }

    pub fn elapsed_label(&self, now: DateTime<Utc>) -> String {
        format_elapsed(self.elapsed_seconds(now))
    }

    /// The entry to submit when the timer stops at `now`.
    pub fn to_entry(&self, now: DateTime<Utc>, note_override: Option<&str>) -> NewTimeEntry {
        let note = note_override
            .filter(|note| !note.is_empty())
            .unwrap_or(&self.note)
            .to_string();
        NewTimeEntry {
            client_id: self.client_id,
            project_id: self.project_id,
            service_id: self.service_id,
            duration: self.elapsed_seconds(now).max(MIN_LOGGED_SECONDS),
            note,
            billable: self.billable,
            started_at: api_timestamp(self.started_at),
            is_logged: true,
        }
    }
}

/// The single timer file. Whole-file overwrite, no locking.
#[derive(Debug, Clone)]
pub struct TimerStore {
    path: PathBuf,
}

impl TimerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config_dir()?.join("timer.json")))
    }

    pub fn load(&self) -> Result<Option<TimerState>> {
        read_json(&self.path)
    }

    /// Persists a new timer; fails when one is already running.
    pub fn start(&self, state: TimerState, now: DateTime<Utc>) -> Result<TimerState> {
        if let Some(existing) = self.load()? {
            return Err(FreshtimeError::TimerRunning {
                elapsed: existing.elapsed_label(now),
                note: existing.note,
            });
        }
        write_json(&self.path, &state)?;
        Ok(state)
    }

    pub fn running(&self) -> Result<TimerState> {
        self.load()?.ok_or(FreshtimeError::NoTimer)
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap()
    }

    fn state(note: &str) -> TimerState {
        TimerState {
            started_at: started(),
            note: note.to_string(),
            client_id: 12,
            project_id: Some(4),
            service_id: None,
            billable: true,
        }
    }

    #[test]
    fn start_then_load_returns_state() {
        let dir = tempdir().unwrap();
        let store = TimerStore::new(dir.path().join("timer.json"));

        store.start(state("Planning"), started()).unwrap();

        assert_eq!(store.load().unwrap(), Some(state("Planning")));
    }

    #[test]
    fn second_start_is_rejected() {
        let dir = tempdir().unwrap();
        let store = TimerStore::new(dir.path().join("timer.json"));
        store.start(state("first"), started()).unwrap();

        let err = store
            .start(state("second"), started() + Duration::minutes(90))
            .unwrap_err();

        match err {
            FreshtimeError::TimerRunning { elapsed, note } => {
                assert_eq!(elapsed, "1h30m");
                assert_eq!(note, "first");
            }
            other => panic!("expected TimerRunning, got {other:?}"),
        }
        assert_eq!(store.load().unwrap().unwrap().note, "first");
    }

    #[test]
    fn running_without_timer_is_no_timer() {
        let dir = tempdir().unwrap();
        let store = TimerStore::new(dir.path().join("timer.json"));

        assert!(matches!(store.running(), Err(FreshtimeError::NoTimer)));
    }

    #[test]
    fn clear_removes_state_and_tolerates_absence() {
        let dir = tempdir().unwrap();
        let store = TimerStore::new(dir.path().join("timer.json"));
        store.start(state("x"), started()).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn stop_entry_enforces_minimum_minute() {
        let entry = state("quick").to_entry(started() + Duration::seconds(12), None);
        assert_eq!(entry.duration, MIN_LOGGED_SECONDS);
    }

    #[test]
    fn stop_entry_rounds_elapsed_and_keeps_ids() {
        let now = started() + Duration::milliseconds(5_400_600);
        let entry = state("Planning").to_entry(now, None);

        assert_eq!(entry.duration, 5401);
        assert_eq!(entry.client_id, 12);
        assert_eq!(entry.project_id, Some(4));
        assert_eq!(entry.started_at, "2026-02-10T09:00:00Z");
        assert_eq!(entry.note, "Planning");
        assert!(entry.is_logged);
    }

    #[test]
    fn stop_note_override_wins_unless_empty() {
        let now = started() + Duration::hours(1);
        assert_eq!(state("start note").to_entry(now, Some("final")).note, "final");
        assert_eq!(state("start note").to_entry(now, Some("")).note, "start note");
    }
}
