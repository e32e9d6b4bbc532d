use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{TimeEntry, placeholder_client_name};

pub const WORK_DAYS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub clients: Vec<ClientSummary>,
    pub grand_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub name: String,
    /// Hours for Monday through Friday.
    pub daily: [f64; WORK_DAYS],
    pub total: f64,
}

/// Monday and Friday of the week containing `reference`. Sunday belongs to the
/// week that started six days earlier.
pub fn week_range(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = i64::from(reference.weekday().num_days_from_monday());
    let monday = reference - Duration::days(offset);
    (monday, monday + Duration::days(4))
}

pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn seconds_to_hours(seconds: i64) -> f64 {
    round_hundredths(seconds as f64 / 3600.0)
}

/// Naive `YYYY-MM-DDTHH:MM:SS[.fff]` first, then RFC 3339 read in its own offset.
fn parse_entry_start(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Weekday bucket 0..=4, or `None` for weekends and unparseable starts.
fn weekday_index(entry: &TimeEntry) -> Option<usize> {
    let started = parse_entry_start(entry.effective_start())?;
    let index = started.weekday().num_days_from_monday() as usize;
    (index < WORK_DAYS).then_some(index)
}

pub fn build_summary(
    entries: &[TimeEntry],
    client_names: &HashMap<i64, String>,
    week_start: NaiveDate,
) -> WeeklySummary {
    let mut by_client: HashMap<i64, [i64; WORK_DAYS]> = HashMap::new();

    for entry in entries {
        let Some(day) = weekday_index(entry) else {
            continue;
        };
        by_client.entry(entry.client_id).or_insert([0; WORK_DAYS])[day] += entry.duration;
    }

    let mut clients: Vec<ClientSummary> = by_client
        .into_iter()
        .map(|(client_id, seconds)| {
            let daily = seconds.map(seconds_to_hours);
            let total = round_hundredths(daily.iter().fold(0.0, |acc, hours| acc + hours));
            let name = client_names
                .get(&client_id)
                .filter(|name| !name.is_empty())
                .cloned()
                .unwrap_or_else(|| placeholder_client_name(client_id));
            ClientSummary { name, daily, total }
        })
        .collect();

    clients.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    let grand_total = round_hundredths(
        clients
            .iter()
            .fold(0.0, |acc, client| acc + client.total),
    );

    WeeklySummary {
        week_start,
        week_end: week_start + Duration::days(4),
        clients,
        grand_total,
    }
}
