use crate::dates::format_week_label;
use crate::error::Result;
use crate::weekly::{WORK_DAYS, WeeklySummary};

const DAY_HEADERS: [&str; WORK_DAYS] = ["Mon", "Tue", "Wed", "Thu", "Fri"];
const NAME_WIDTH: usize = 20;
const COL_WIDTH: usize = 6;
const ID_WIDTH: usize = 8;

pub fn format_hours(hours: f64) -> String {
    if hours == 0.0 {
        "—".to_string()
    } else {
        format!("{hours:.1}")
    }
}

fn truncate(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

/// Pads by character count so multi-byte names and `—` stay aligned.
fn pad_left(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{}{value}", " ".repeat(width.saturating_sub(len)))
}

fn pad_right(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{value}{}", " ".repeat(width.saturating_sub(len)))
}

fn row(label: &str, daily: &[f64; WORK_DAYS], total: f64) -> String {
    let mut line = pad_right(&truncate(label, NAME_WIDTH), NAME_WIDTH);
    for hours in daily {
        line.push_str(&pad_left(&format_hours(*hours), COL_WIDTH));
    }
    line.push_str(&pad_left(&format_hours(total), COL_WIDTH + 1));
    line.push('h');
    line
}

pub fn weekly_table(summary: &WeeklySummary) -> String {
    let mut lines = vec![
        format!("Week of {}", format_week_label(summary.week_start, summary.week_end)),
        String::new(),
    ];

    let mut header = pad_right("Client", NAME_WIDTH);
    for day in DAY_HEADERS {
        header.push_str(&pad_left(day, COL_WIDTH));
    }
    header.push_str("  Total");
    let separator = "─".repeat(header.chars().count());
    lines.push(header);
    lines.push(separator.clone());

    let mut day_totals = [0.0; WORK_DAYS];
    for client in &summary.clients {
        lines.push(row(&client.name, &client.daily, client.total));
        for (total, hours) in day_totals.iter_mut().zip(client.daily) {
            *total += hours;
        }
    }

    lines.push(separator);
    lines.push(row("Total", &day_totals, summary.grand_total));
    lines.join("\n")
}

pub fn weekly_json(summary: &WeeklySummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// `(id, name)` pairs, sorted by name then id.
pub fn clients_table(clients: &[(i64, String)]) -> String {
    let mut lines = vec![
        format!("{}Name", pad_right("ID", ID_WIDTH)),
        "─".repeat(40),
    ];
    if clients.is_empty() {
        lines.push("No clients found.".to_string());
        return lines.join("\n");
    }
    for (id, name) in clients {
        lines.push(format!("{}{name}", pad_right(&id.to_string(), ID_WIDTH)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weekly::ClientSummary;
    use chrono::NaiveDate;

    fn summary() -> WeeklySummary {
        WeeklySummary {
            week_start: NaiveDate::from_ymd_opt(2026, 2, 23).unwrap(),
            week_end: NaiveDate::from_ymd_opt(2026, 2, 27).unwrap(),
            clients: vec![
                ClientSummary {
                    name: "Acme Corp".to_string(),
                    daily: [8.0, 8.0, 0.0, 0.0, 0.0],
                    total: 16.0,
                },
                ClientSummary {
                    name: "Beta Inc".to_string(),
                    daily: [0.0, 0.0, 4.0, 4.0, 0.0],
                    total: 8.0,
                },
            ],
            grand_total: 24.0,
        }
    }

    #[test]
    fn format_hours_uses_dash_for_zero() {
        assert_eq!(format_hours(0.0), "—");
        assert_eq!(format_hours(1.0), "1.0");
        assert_eq!(format_hours(8.5), "8.5");
        assert_eq!(format_hours(10.0), "10.0");
    }

    #[test]
    fn table_has_header_rows_and_totals() {
        let table = weekly_table(&summary());

        assert!(table.starts_with("Week of Feb 23 – Feb 27, 2026"));
        for day in DAY_HEADERS {
            assert!(table.contains(day));
        }
        assert!(table.contains("Acme Corp"));
        assert!(table.contains("Beta Inc"));
        let last = table.lines().last().unwrap();
        assert!(last.starts_with("Total"));
        assert!(last.ends_with("24.0h"));
        assert!(last.contains("8.0"));
    }

    #[test]
    fn table_rows_align_to_header() {
        let table = weekly_table(&summary());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[3].chars().count(), lines[2].chars().count());
        let row_width = lines[4].chars().count();
        assert_eq!(lines[5].chars().count(), row_width);
        assert_eq!(lines[7].chars().count(), row_width);
    }

    #[test]
    fn long_names_are_truncated() {
        let mut long = summary();
        long.clients[0].name = "An Extremely Long Client Name LLC".to_string();
        let table = weekly_table(&long);
        assert!(table.contains("An Extremely Long Cl"));
        assert!(!table.contains("An Extremely Long Client"));
    }

    #[test]
    fn json_uses_camel_case() {
        let json = weekly_json(&summary()).unwrap();
        assert!(json.contains("\"weekStart\": \"2026-02-23\""));
        assert!(json.contains("\"grandTotal\": 24.0"));
        assert!(json.contains("\"daily\""));
    }

    #[test]
    fn clients_table_lists_ids() {
        let table = clients_table(&[(12, "Acme Corp".to_string()), (7, "Beta".to_string())]);
        assert!(table.contains("12      Acme Corp"));
        assert!(table.contains("7       Beta"));
    }

    #[test]
    fn clients_table_reports_empty() {
        assert!(clients_table(&[]).contains("No clients found."));
    }
}
