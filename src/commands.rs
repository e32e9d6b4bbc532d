use std::collections::HashMap;
use std::fmt;

use chrono::{Local, Utc};
use inquire::{Select, Text};
use log::{debug, warn};

use crate::auth::{ConfigTokenSource, OAuthApp, refresh_and_persist};
use crate::cli::{Command, EntryTarget};
use crate::dates::{api_timestamp, parse_date, parse_duration};
use crate::error::{FreshtimeError, Result};
use crate::format::{clients_table, weekly_json, weekly_table};
use crate::freshbooks::{FreshbooksClient, StaticToken};
use crate::invoice::{InvoicePlan, resolve_currency, resolve_rate, two_places};
use crate::models::NewTimeEntry;
use crate::storage::{Config, ConfigStore, PROJECT_CONFIG_FILE, ProjectConfig};
use crate::timer::{TimerState, TimerStore};
use crate::weekly::{build_summary, week_range};

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Setup { code } => run_setup(code),
        Command::Refresh => run_refresh(),
        Command::Clients => run_clients(),
        Command::Weekly { week_of, json } => run_weekly(week_of.as_deref(), json),
        Command::Invoice {
            client_id,
            rate,
            currency,
            dry_run,
            notes,
        } => run_invoice(client_id, rate.as_deref(), currency.as_deref(), dry_run, notes.as_deref()),
        Command::Init => run_init(),
        Command::Log {
            message,
            duration,
            target,
        } => run_log(&message, &duration, &target),
        Command::Start { message, target } => run_start(&message, &target),
        Command::Stop { message } => run_stop(message.as_deref()),
        Command::Status => run_status(),
    }
}

/// Loads the config and builds a client that refreshes (and re-saves) tokens on 401.
fn session() -> Result<(Config, FreshbooksClient)> {
    let store = ConfigStore::default_location()?;
    let config = store.load()?;
    let exchange = match OAuthApp::from_env() {
        Ok(app) => Some(app),
        Err(err) => {
            debug!("token refresh disabled: {err}");
            None
        }
    };
    let tokens = ConfigTokenSource::new(config.clone(), store, exchange);
    let client = FreshbooksClient::new(Box::new(tokens))?;
    Ok((config, client))
}

fn run_setup(code: Option<String>) -> Result<()> {
    let app = OAuthApp::from_env()?;

    println!("Open this link to authorize freshtime:\n");
    println!("  {}\n", app.authorize_url());

    let code = match code {
        Some(code) => code,
        None => Text::new("Paste the `code` value from the redirect URL:").prompt()?,
    };
    let code = code.trim();
    if code.is_empty() {
        return Err(FreshtimeError::validation("No authorization code received"));
    }

    println!("Exchanging code for token...");
    let tokens = app.exchange_code(code)?;

    println!("Verifying token...");
    let client = FreshbooksClient::new(Box::new(StaticToken::new(tokens.access_token.clone())))?;
    let identity = client.fetch_identity()?;

    let store = ConfigStore::default_location()?;
    let mut config = store.load_existing()?.unwrap_or_default();
    config.access_token = tokens.access_token;
    config.refresh_token = Some(tokens.refresh_token).filter(|token| !token.is_empty());
    config.account_id = identity.account_id.clone();
    config.business_id = identity.business_id;
    store.save(&config)?;

    println!();
    println!("Setup complete.");
    println!("  Account:  {}", identity.account_id);
    println!("  Business: {}", identity.business_id);
    println!("  Config:   {}", store.path().display());
    Ok(())
}

fn run_refresh() -> Result<()> {
    let store = ConfigStore::default_location()?;
    let mut config = store.load()?;
    let app = OAuthApp::from_env()?;
    refresh_and_persist(&mut config, &store, &app)?;
    println!("Access token refreshed.");
    Ok(())
}

/// Clients as `(id, name)`, sorted by name then id.
fn sorted_by_name(items: HashMap<i64, String>) -> Vec<(i64, String)> {
    let mut sorted: Vec<(i64, String)> = items.into_iter().collect();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    sorted
}

fn run_clients() -> Result<()> {
    let (config, client) = session()?;
    let clients = client.list_clients(&config.account_id)?;
    println!("{}", clients_table(&sorted_by_name(clients)));
    Ok(())
}

fn run_weekly(week_of: Option<&str>, json: bool) -> Result<()> {
    let reference = match week_of {
        Some(value) => parse_date(value)?,
        None => Local::now().date_naive(),
    };
    let (week_start, week_end) = week_range(reference);

    let (config, client) = session()?;
    let entries = client.list_time_entries(config.business_id, week_start, week_end)?;
    let client_names = client.list_clients(&config.account_id)?;

    let summary = build_summary(&entries, &client_names, week_start);
    if json {
        println!("{}", weekly_json(&summary)?);
    } else {
        println!("{}", weekly_table(&summary));
    }
    Ok(())
}

fn run_invoice(
    client_id: i64,
    rate: Option<&str>,
    currency: Option<&str>,
    dry_run: bool,
    notes: Option<&str>,
) -> Result<()> {
    let (config, client) = session()?;

    let entries = client.list_unbilled_entries(config.business_id, client_id)?;
    if entries.is_empty() {
        println!("No unbilled time entries found for this client.");
        return Ok(());
    }

    let rate = resolve_rate(rate, &config, client_id)?;
    let currency = resolve_currency(currency, &config);
    let plan = InvoicePlan::new(client_id, &entries, rate, currency);

    if dry_run {
        println!("{}", plan.render_dry_run());
        return Ok(());
    }

    let draft = plan.draft(Local::now().date_naive(), notes);
    let invoice = client.create_invoice(&config.account_id, &draft)?;

    println!("Invoice #{} created (draft).", invoice.invoice_number);
    println!("ID:      {}", invoice.invoice_id);
    println!("Entries: {}", plan.entry_count);
    println!("Hours:   {}", two_places(plan.total_hours()));
    println!("Total:   {} {}", invoice.amount.amount, invoice.amount.code);

    match client.fetch_share_link(&config.account_id, invoice.invoice_id) {
        Ok(Some(link)) => println!("Link:    {link}"),
        Ok(None) => println!("Link:    (share link unavailable, may need invoices:read scope)"),
        Err(err) => {
            debug!("share link fetch failed: {err}");
            println!("Link:    (share link unavailable, may need invoices:read scope)");
        }
    }

    match client.mark_entries_billed(config.business_id, &entries) {
        Ok(marked) => println!("Billed:  {marked} entries marked as billed"),
        Err(err) => {
            warn!("invoice {} created but billing update failed", invoice.invoice_id);
            println!(
                "Warning: Failed to mark entries as billed ({err}). Invoice #{} stands; mark the remaining entries billed in FreshBooks.",
                invoice.invoice_number
            );
        }
    }
    Ok(())
}

/// A selectable `(id, name)` for prompts.
struct Choice {
    id: i64,
    name: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)
    }
}

fn pick(label: &str, items: HashMap<i64, String>) -> Result<Option<i64>> {
    if items.is_empty() {
        println!("No {}s found, skipping.", label.to_lowercase());
        return Ok(None);
    }
    let choices = sorted_by_name(items)
        .into_iter()
        .map(|(id, name)| Choice { id, name })
        .collect();
    let selected = Select::new(&format!("Select {}:", label.to_lowercase()), choices).prompt()?;
    println!("Selected: {}", selected.name);
    Ok(Some(selected.id))
}

fn run_init() -> Result<()> {
    let (config, client) = session()?;

    let clients = client.list_clients(&config.account_id)?;
    let Some(client_id) = pick("Client", clients)? else {
        return Err(FreshtimeError::validation("No clients found on this account"));
    };
    let project_id = pick("Project", client.list_projects(config.business_id, client_id)?)?;
    let service_id = pick("Service", client.list_services(config.business_id)?)?;

    let project = ProjectConfig {
        client_id: Some(client_id),
        project_id,
        service_id,
    };
    let path = project.save_to_dir(&std::env::current_dir()?)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Flags first, then `.freshtime.json`; a client is required.
fn resolve_target(target: &EntryTarget, project: Option<ProjectConfig>) -> Result<(i64, Option<i64>, Option<i64>)> {
    let project = project.unwrap_or_default();
    let client_id = target
        .client
        .filter(|id| *id != 0)
        .or(project.client_id)
        .ok_or_else(|| {
            FreshtimeError::validation(
                "No client specified. Use --client or run `freshtime init` to create .freshtime.json",
            )
        })?;
    let project_id = target.project.filter(|id| *id != 0).or(project.project_id);
    let service_id = target.service.filter(|id| *id != 0).or(project.service_id);
    Ok((client_id, project_id, service_id))
}

fn project_defaults() -> Option<ProjectConfig> {
    match ProjectConfig::load_from_cwd() {
        Ok(config) => config,
        Err(err) => {
            warn!("ignoring {PROJECT_CONFIG_FILE}: {err}");
            None
        }
    }
}

fn run_log(message: &str, duration: &str, target: &EntryTarget) -> Result<()> {
    let (config, client) = session()?;
    let (client_id, project_id, service_id) = resolve_target(target, project_defaults())?;
    let seconds = parse_duration(duration)?;

    let entry = NewTimeEntry {
        client_id,
        project_id,
        service_id,
        duration: seconds,
        note: message.to_string(),
        billable: !target.no_billable,
        started_at: api_timestamp(Utc::now()),
        is_logged: true,
    };
    let created = client.create_time_entry(config.business_id, &entry)?;

    println!("Logged {:.2}h: {} (entry #{})", seconds as f64 / 3600.0, message, created.id);
    Ok(())
}

fn run_start(message: &str, target: &EntryTarget) -> Result<()> {
    let store = TimerStore::default_location()?;
    let now = Utc::now();
    if let Some(existing) = store.load()? {
        return Err(FreshtimeError::TimerRunning {
            elapsed: existing.elapsed_label(now),
            note: existing.note,
        });
    }

    let (client_id, project_id, service_id) = resolve_target(target, project_defaults())?;
    let state = TimerState {
        started_at: now,
        note: message.to_string(),
        client_id,
        project_id,
        service_id,
        billable: !target.no_billable,
    };
    store.start(state, now)?;

    if message.is_empty() {
        println!("Timer started");
    } else {
        println!("Timer started: {message}");
    }
    Ok(())
}

fn run_stop(message: Option<&str>) -> Result<()> {
    let store = TimerStore::default_location()?;
    let state = store.running()?;
    let entry = state.to_entry(Utc::now(), message);

    let (config, client) = session()?;
    let created = client.create_time_entry(config.business_id, &entry)?;

    if let Err(err) = store.clear() {
        warn!("failed to clear timer state: {err}");
        eprintln!("warning: failed to clear timer state: {err}");
    }

    println!(
        "Stopped. Logged {:.2}h: {} (entry #{})",
        entry.duration as f64 / 3600.0,
        entry.note,
        created.id
    );
    Ok(())
}

fn run_status() -> Result<()> {
    let store = TimerStore::default_location()?;
    let Some(state) = store.load()? else {
        println!("No timer running.");
        return Ok(());
    };

    println!("Timer running: {}", state.elapsed_label(Utc::now()));
    if !state.note.is_empty() {
        println!("Note: {}", state.note);
    }
    println!("Client: {}", state.client_id);
    if let Some(project_id) = state.project_id {
        println!("Project: {project_id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(client: Option<i64>, project: Option<i64>) -> EntryTarget {
        EntryTarget {
            client,
            project,
            ..EntryTarget::default()
        }
    }

    #[test]
    fn flags_override_project_defaults() {
        let defaults = ProjectConfig {
            client_id: Some(1),
            project_id: Some(2),
            service_id: Some(3),
        };
        let resolved = resolve_target(&target(Some(10), None), Some(defaults)).unwrap();
        assert_eq!(resolved, (10, Some(2), Some(3)));
    }

    #[test]
    fn zero_flag_falls_back_to_defaults() {
        let defaults = ProjectConfig {
            client_id: Some(1),
            ..ProjectConfig::default()
        };
        let resolved = resolve_target(&target(Some(0), Some(0)), Some(defaults)).unwrap();
        assert_eq!(resolved, (1, None, None));
    }

    #[test]
    fn missing_client_is_validation_error() {
        let err = resolve_target(&target(None, Some(4)), None).unwrap_err();
        assert!(matches!(err, FreshtimeError::Validation(_)));
    }

    #[test]
    fn sorted_by_name_breaks_ties_by_id() {
        let mut items = HashMap::new();
        items.insert(3, "Beta".to_string());
        items.insert(2, "Acme".to_string());
        items.insert(1, "Acme".to_string());
        let sorted = sorted_by_name(items);
        assert_eq!(
            sorted,
            vec![(1, "Acme".to_string()), (2, "Acme".to_string()), (3, "Beta".to_string())]
        );
    }

    #[test]
    fn choice_display_shows_id() {
        let choice = Choice {
            id: 12,
            name: "Acme".to_string(),
        };
        assert_eq!(choice.to_string(), "Acme (ID: 12)");
    }
}
