use std::collections::HashMap;

use chrono::NaiveDate;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FreshtimeError, Result};
use crate::freshbooks::{ApiRequest, FreshbooksClient, Transport};
use crate::models::{
    AccountingResponse, BilledUpdate, ClientRecord, CreateInvoiceRequest, CreatedInvoice,
    CreatedTimeEntry, Identity, InvoiceDraft, InvoiceResponse, MeResponse, NewTimeEntry, Project,
    Service, ShareLink, TimeEntry, TimeEntryEnvelope,
};
use crate::pagination::parse_records;

fn time_entries_path(business_id: i64) -> String {
    format!("/timetracking/business/{business_id}/time_entries")
}

fn invoices_path(account_id: &str) -> String {
    format!("/accounting/account/{account_id}/invoices/invoices")
}

fn params(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Keeps the records that parsed and reports how many were dropped.
fn parse_listing<R: DeserializeOwned>(raw: Vec<Value>, kind: &str) -> Vec<R> {
    let parsed = parse_records::<R>(raw, kind);
    if parsed.skipped > 0 {
        warn!("dropped {} malformed {kind} record(s)", parsed.skipped);
    }
    parsed.items
}

impl<T: Transport> FreshbooksClient<T> {
    pub fn fetch_identity(&self) -> Result<Identity> {
        let me: MeResponse = self.get(ApiRequest::get("/auth/api/v1/users/me"))?;
        let membership = me
            .response
            .business_memberships
            .into_iter()
            .next()
            .ok_or(FreshtimeError::NoBusiness)?;
        Ok(Identity {
            account_id: membership.business.account_id,
            business_id: membership.business.id,
        })
    }

    /// Client id to display name.
    pub fn list_clients(&self, account_id: &str) -> Result<HashMap<i64, String>> {
        let path = format!("/accounting/account/{account_id}/users/clients");
        let raw = self.get_paginated(&path, "clients", &[])?;
        Ok(parse_listing::<ClientRecord>(raw, "client")
            .into_iter()
            .map(|client| (client.id, client.display_name()))
            .collect())
    }

    pub fn list_projects(&self, business_id: i64, client_id: i64) -> Result<HashMap<i64, String>> {
        let path = format!("/projects/business/{business_id}/projects");
        let raw = self.get_paginated(&path, "projects", &params(&[("client_id", client_id.to_string())]))?;
        Ok(parse_listing::<Project>(raw, "project")
            .into_iter()
            .map(|project| (project.id, project.title))
            .collect())
    }

    pub fn list_services(&self, business_id: i64) -> Result<HashMap<i64, String>> {
        let path = format!("/comments/business/{business_id}/services");
        let raw = self.get_paginated(&path, "services", &[])?;
        Ok(parse_listing::<Service>(raw, "service")
            .into_iter()
            .map(|service| (service.id, service.name))
            .collect())
    }

    /// Entries started between the start of `start` and the end of `end`.
    pub fn list_time_entries(
        &self,
        business_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let query = params(&[
            ("started_from", format!("{}T00:00:00", start.format("%Y-%m-%d"))),
            ("started_to", format!("{}T23:59:59", end.format("%Y-%m-%d"))),
        ]);
        let raw = self.get_paginated(&time_entries_path(business_id), "time_entries", &query)?;
        Ok(parse_listing(raw, "time entry"))
    }

    pub fn list_unbilled_entries(&self, business_id: i64, client_id: i64) -> Result<Vec<TimeEntry>> {
        let query = params(&[
            ("client_id", client_id.to_string()),
            ("billed", "false".to_string()),
            ("billable", "true".to_string()),
        ]);
        let raw = self.get_paginated(&time_entries_path(business_id), "time_entries", &query)?;
        Ok(parse_listing(raw, "time entry"))
    }

    pub fn create_time_entry(&self, business_id: i64, entry: &NewTimeEntry) -> Result<TimeEntry> {
        let body = TimeEntryEnvelope { time_entry: entry };
        let request = ApiRequest::post(time_entries_path(business_id), &body)?;
        let created: CreatedTimeEntry = self.execute(&request)?;
        info!("created time entry #{}", created.time_entry.id);
        Ok(created.time_entry)
    }

    /// Marks each entry billed, one request per entry. Stops at the first
    /// failure; entries already marked stay marked.
    pub fn mark_entries_billed(&self, business_id: i64, entries: &[TimeEntry]) -> Result<usize> {
        let mut marked = 0;
        for entry in entries {
            let path = format!("{}/{}", time_entries_path(business_id), entry.id);
            let body = TimeEntryEnvelope {
                time_entry: BilledUpdate {
                    billed: true,
                    started_at: &entry.started_at,
                    is_logged: true,
                    duration: entry.duration,
                },
            };
            let result = ApiRequest::put(path, &body).and_then(|request| self.execute_discarding(&request));
            if let Err(err) = result {
                warn!("marking entry #{} billed failed after {marked} succeeded", entry.id);
                return Err(FreshtimeError::PartiallyBilled {
                    marked,
                    total: entries.len(),
                    entry_id: entry.id,
                    source: Box::new(err),
                });
            }
            marked += 1;
        }
        Ok(marked)
    }

    pub fn create_invoice(&self, account_id: &str, draft: &InvoiceDraft) -> Result<InvoiceResponse> {
        let request = ApiRequest::post(invoices_path(account_id), &CreateInvoiceRequest { invoice: draft })?;
        let created: AccountingResponse<CreatedInvoice> = self.execute(&request)?;
        Ok(created.response.result.invoice)
    }

    /// `None` when the API returned no link.
    pub fn fetch_share_link(&self, account_id: &str, invoice_id: i64) -> Result<Option<String>> {
        let path = format!("{}/{invoice_id}/share_link", invoices_path(account_id));
        let link: AccountingResponse<ShareLink> = self.get(ApiRequest::get(path))?;
        let link = link.response.result.share_link;
        Ok(if link.is_empty() { None } else { Some(link) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freshbooks::testing::{ScriptedTransport, client_with};
    use crate::models::{InvoiceAmount, InvoiceLine};
    use reqwest::Method;
    use serde_json::json;

    fn query_value(query: &[(String, String)], key: &str) -> Option<String> {
        query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    }

    fn entry(id: i64, duration: i64) -> TimeEntry {
        TimeEntry {
            id,
            client_id: 1,
            duration,
            started_at: "2026-02-10T09:00:00Z".to_string(),
            local_started_at: String::new(),
            note: String::new(),
            billable: true,
        }
    }

    #[test]
    fn parse_listing_drops_malformed_records() {
        let entries: Vec<TimeEntry> = parse_listing(
            vec![json!({"id": 1, "duration": 60}), json!({"id": "bad"}), json!({"id": 3})],
            "time entry",
        );
        let ids: Vec<i64> = entries.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn identity_uses_first_membership() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({
            "response": {
                "id": 1,
                "business_memberships": [
                    {"business": {"id": 77, "account_id": "abc12"}},
                    {"business": {"id": 78, "account_id": "zzz"}}
                ]
            }
        }));
        let client = client_with(&transport);

        let identity = client.fetch_identity().unwrap();

        assert_eq!(identity.account_id, "abc12");
        assert_eq!(identity.business_id, 77);
        assert_eq!(transport.sent()[0].request.path, "/auth/api/v1/users/me");
    }

    #[test]
    fn identity_without_membership_fails() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"response": {"id": 1, "business_memberships": []}}));
        let client = client_with(&transport);

        assert!(matches!(client.fetch_identity(), Err(FreshtimeError::NoBusiness)));
    }

    #[test]
    fn list_clients_applies_name_fallbacks_and_skips_bad_records() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({
            "response": {"result": {"clients": [
                {"id": 1, "organization": "Acme Corp", "fname": "", "lname": ""},
                {"id": 2, "organization": "", "fname": "John", "lname": "Doe"},
                {"id": 42, "organization": "", "fname": "", "lname": ""},
                {"organization": "No id"}
            ], "pages": 1}}
        }));
        let client = client_with(&transport);

        let clients = client.list_clients("abc12").unwrap();

        assert_eq!(clients.len(), 3);
        assert_eq!(clients[&1], "Acme Corp");
        assert_eq!(clients[&2], "John Doe");
        assert_eq!(clients[&42], "Client #42");
        assert_eq!(transport.sent()[0].request.path, "/accounting/account/abc12/users/clients");
    }

    #[test]
    fn list_projects_filters_by_client() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"projects": [{"id": 5, "title": "Website"}], "meta": {"pages": 1}}));
        let client = client_with(&transport);

        let projects = client.list_projects(77, 9).unwrap();

        assert_eq!(projects[&5], "Website");
        let sent = transport.sent();
        assert_eq!(sent[0].request.path, "/projects/business/77/projects");
        assert_eq!(query_value(&sent[0].request.query, "client_id").as_deref(), Some("9"));
    }

    #[test]
    fn list_services_maps_names() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"services": [{"id": 3, "name": "Development"}]}));
        let client = client_with(&transport);

        let services = client.list_services(77).unwrap();

        assert_eq!(services[&3], "Development");
        assert_eq!(transport.sent()[0].request.path, "/comments/business/77/services");
    }

    #[test]
    fn list_time_entries_expands_dates_to_full_days() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"time_entries": [
            {"id": 1, "client_id": 2, "duration": 3600, "started_at": "2026-02-09T10:00:00Z"},
            {"id": "bad"}
        ], "meta": {"pages": 1}}));
        let client = client_with(&transport);
        let start = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 13).unwrap();

        let entries = client.list_time_entries(77, start, end).unwrap();

        assert_eq!(entries.len(), 1);
        let query = &transport.sent()[0].request.query;
        assert_eq!(query_value(query, "started_from").as_deref(), Some("2026-02-09T00:00:00"));
        assert_eq!(query_value(query, "started_to").as_deref(), Some("2026-02-13T23:59:59"));
    }

    #[test]
    fn list_unbilled_entries_sends_filters() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"time_entries": [], "meta": {"pages": 1}}));
        let client = client_with(&transport);

        client.list_unbilled_entries(77, 12).unwrap();

        let query = &transport.sent()[0].request.query;
        assert_eq!(query_value(query, "client_id").as_deref(), Some("12"));
        assert_eq!(query_value(query, "billed").as_deref(), Some("false"));
        assert_eq!(query_value(query, "billable").as_deref(), Some("true"));
    }

    #[test]
    fn create_time_entry_wraps_payload() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"time_entry": {"id": 501, "client_id": 12, "duration": 5400}}));
        let client = client_with(&transport);
        let new_entry = NewTimeEntry {
            client_id: 12,
            project_id: Some(4),
            service_id: None,
            duration: 5400,
            note: "Planning".to_string(),
            billable: true,
            started_at: "2026-02-10T09:00:00Z".to_string(),
            is_logged: true,
        };

        let created = client.create_time_entry(77, &new_entry).unwrap();

        assert_eq!(created.id, 501);
        let sent = transport.sent();
        assert_eq!(sent[0].request.method, Method::POST);
        let body = sent[0].request.body.clone().unwrap();
        assert_eq!(body["time_entry"]["duration"], 5400);
        assert_eq!(body["time_entry"]["project_id"], 4);
    }

    #[test]
    fn mark_entries_billed_puts_each_entry() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "{}");
        transport.respond(200, "{}");
        let client = client_with(&transport);

        let marked = client.mark_entries_billed(77, &[entry(1, 60), entry(2, 120)]).unwrap();

        assert_eq!(marked, 2);
        let sent = transport.sent();
        assert_eq!(sent[1].request.path, "/timetracking/business/77/time_entries/2");
        let body = sent[1].request.body.clone().unwrap();
        assert_eq!(body["time_entry"]["billed"], true);
        assert_eq!(body["time_entry"]["duration"], 120);
    }

    #[test]
    fn mark_entries_billed_reports_partial_progress() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "{}");
        transport.respond(500, "boom");
        let client = client_with(&transport);

        let err = client
            .mark_entries_billed(77, &[entry(1, 60), entry(2, 60), entry(3, 60)])
            .unwrap_err();

        match err {
            FreshtimeError::PartiallyBilled {
                marked,
                total,
                entry_id,
                ..
            } => {
                assert_eq!(marked, 1);
                assert_eq!(total, 3);
                assert_eq!(entry_id, 2);
            }
            other => panic!("expected PartiallyBilled, got {other:?}"),
        }
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn create_invoice_reads_nested_result() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"response": {"result": {"invoice": {
            "invoiceid": 900,
            "invoice_number": "0000012",
            "amount": {"amount": "112.50", "code": "USD"},
            "v3_status": "draft"
        }}}}));
        let client = client_with(&transport);
        let draft = InvoiceDraft {
            customer_id: 12,
            create_date: "2026-02-16".to_string(),
            lines: vec![InvoiceLine {
                line_type: 0,
                name: "Consulting".to_string(),
                description: "2026-02-10".to_string(),
                qty: "0.75".to_string(),
                unit_cost: InvoiceAmount {
                    amount: "150".to_string(),
                    code: "USD".to_string(),
                },
            }],
            status: 1,
            notes: String::new(),
        };

        let invoice = client.create_invoice("abc12", &draft).unwrap();

        assert_eq!(invoice.invoice_id, 900);
        assert_eq!(invoice.invoice_number, "0000012");
        let sent = transport.sent();
        assert_eq!(sent[0].request.path, "/accounting/account/abc12/invoices/invoices");
        let body = sent[0].request.body.clone().unwrap();
        assert_eq!(body["invoice"]["customerid"], 12);
        assert!(body["invoice"].get("notes").is_none());
    }

    #[test]
    fn share_link_absence_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.respond_json(json!({"response": {"result": {}}}));
        transport.respond_json(json!({"response": {"result": {"share_link": "https://my.freshbooks.com/x"}}}));
        let client = client_with(&transport);

        assert_eq!(client.fetch_share_link("abc12", 900).unwrap(), None);
        assert_eq!(
            client.fetch_share_link("abc12", 900).unwrap().as_deref(),
            Some("https://my.freshbooks.com/x")
        );
        assert_eq!(
            transport.sent()[0].request.path,
            "/accounting/account/abc12/invoices/invoices/900/share_link"
        );
    }
}
