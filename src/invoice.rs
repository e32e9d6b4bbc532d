use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{FreshtimeError, Result};
use crate::models::{InvoiceAmount, InvoiceDraft, InvoiceLine, TimeEntry};
use crate::storage::Config;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_LINE_NAME: &str = "Consulting";
/// FreshBooks invoice status for a draft.
pub const DRAFT_STATUS: u8 = 1;

const SECONDS_PER_HOUR: i64 = 3600;

/// Rounds half away from zero to two places and always shows both.
pub fn two_places(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

pub fn hours(seconds: i64) -> Decimal {
    Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR)
}

/// Override first, then the configured rate for the client. Must be a decimal.
pub fn resolve_rate(rate_override: Option<&str>, config: &Config, client_id: i64) -> Result<Decimal> {
    let raw = rate_override
        .map(str::trim)
        .filter(|rate| !rate.is_empty())
        .or_else(|| {
            config
                .client_rates
                .get(&client_id.to_string())
                .map(|rate| rate.trim())
                .filter(|rate| !rate.is_empty())
        })
        .ok_or_else(|| {
            FreshtimeError::validation(format!(
                "No rate configured for client {client_id}. Use --rate <amount> or set client_rates.{client_id} in config"
            ))
        })?;

    Decimal::from_str(raw)
        .map_err(|_| FreshtimeError::validation(format!("Invalid rate {raw:?}: expected a decimal amount")))
}

/// Override first, then the configured default, then USD. Blank values are skipped.
pub fn resolve_currency(currency_override: Option<&str>, config: &Config) -> String {
    let present = |code: &str| {
        let code = code.trim();
        (!code.is_empty()).then(|| code.to_string())
    };
    currency_override
        .and_then(present)
        .or_else(|| config.default_currency.as_deref().and_then(present))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// One line per entry: the note (or a default) as name, the start date as
/// description, hours to two places as quantity.
pub fn build_invoice_lines(entries: &[TimeEntry], rate: Decimal, currency: &str) -> Vec<InvoiceLine> {
    entries
        .iter()
        .map(|entry| {
            let name = if entry.note.trim().is_empty() {
                DEFAULT_LINE_NAME.to_string()
            } else {
                entry.note.clone()
            };
            InvoiceLine {
                line_type: 0,
                name,
                description: start_date_of(&entry.local_started_at).to_string(),
                qty: two_places(hours(entry.duration)),
                unit_cost: InvoiceAmount {
                    amount: rate.normalize().to_string(),
                    code: currency.to_string(),
                },
            }
        })
        .collect()
}

fn start_date_of(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

#[derive(Debug, Clone)]
pub struct InvoicePlan {
    pub client_id: i64,
    pub lines: Vec<InvoiceLine>,
    pub entry_count: usize,
    pub total_seconds: i64,
    pub rate: Decimal,
    pub currency: String,
}

impl InvoicePlan {
    pub fn new(client_id: i64, entries: &[TimeEntry], rate: Decimal, currency: String) -> Self {
        Self {
            client_id,
            lines: build_invoice_lines(entries, rate, &currency),
            entry_count: entries.len(),
            total_seconds: entries.iter().map(|entry| entry.duration).sum(),
            rate,
            currency,
        }
    }

    pub fn total_hours(&self) -> Decimal {
        hours(self.total_seconds)
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_hours() * self.rate
    }

    pub fn draft(&self, create_date: NaiveDate, notes: Option<&str>) -> InvoiceDraft {
        InvoiceDraft {
            customer_id: self.client_id,
            create_date: create_date.format("%Y-%m-%d").to_string(),
            lines: self.lines.clone(),
            status: DRAFT_STATUS,
            notes: notes.unwrap_or_default().to_string(),
        }
    }

    pub fn render_dry_run(&self) -> String {
        let mut lines = vec![
            "Dry run — no invoice created.".to_string(),
            String::new(),
            format!("Entries: {}", self.entry_count),
            format!("Hours:   {}", two_places(self.total_hours())),
            format!("Rate:    {} {}/hr", self.rate.normalize(), self.currency),
            format!("Total:   {} {}", two_places(self.total_amount()), self.currency),
            String::new(),
            "Line items:".to_string(),
        ];
        for line in &self.lines {
            lines.push(format!("  {}  {}h  {}", line.description, line.qty, line.name));
        }
        lines.join("\n")
    }
}
