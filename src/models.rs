use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit JSON `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: String,
    pub business_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub organization: String,
    #[serde(default, deserialize_with = "nullable")]
    pub fname: String,
    #[serde(default, deserialize_with = "nullable")]
    pub lname: String,
}

impl ClientRecord {
    pub fn display_name(&self) -> String {
        let organization = self.organization.trim();
        if !organization.is_empty() {
            return organization.to_string();
        }
        let person = format!("{} {}", self.fname, self.lname).trim().to_string();
        if !person.is_empty() {
            return person;
        }
        placeholder_client_name(self.id)
    }
}

pub fn placeholder_client_name(id: i64) -> String {
    format!("Client #{id}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub client_id: i64,
    /// Seconds.
    #[serde(default, deserialize_with = "nullable")]
    pub duration: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub started_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub local_started_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub note: String,
    #[serde(default, deserialize_with = "nullable")]
    pub billable: bool,
}

impl TimeEntry {
    /// Local start time when the API reported one, UTC start otherwise.
    pub fn effective_start(&self) -> &str {
        if self.local_started_at.is_empty() {
            &self.started_at
        } else {
            &self.local_started_at
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTimeEntry {
    pub client_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i64>,
    pub duration: i64,
    pub note: String,
    pub billable: bool,
    pub started_at: String,
    pub is_logged: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TimeEntryEnvelope<T> {
    pub time_entry: T,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BilledUpdate<'a> {
    pub billed: bool,
    pub started_at: &'a str,
    pub is_logged: bool,
    pub duration: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedTimeEntry {
    pub time_entry: TimeEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAmount {
    pub amount: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceLine {
    #[serde(rename = "type")]
    pub line_type: u8,
    pub name: String,
    pub description: String,
    pub qty: String,
    pub unit_cost: InvoiceAmount,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDraft {
    #[serde(rename = "customerid")]
    pub customer_id: i64,
    pub create_date: String,
    pub lines: Vec<InvoiceLine>,
    pub status: u8,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateInvoiceRequest<'a> {
    pub invoice: &'a InvoiceDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceResponse {
    #[serde(rename = "invoiceid")]
    pub invoice_id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub invoice_number: String,
    pub amount: InvoiceAmount,
}

/// `{ "response": { "result": T } }`, the accounting API wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountingResponse<T> {
    pub response: AccountingResult<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountingResult<T> {
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedInvoice {
    pub invoice: InvoiceResponse,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ShareLink {
    #[serde(default, deserialize_with = "nullable")]
    pub share_link: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub response: MeBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeBody {
    #[serde(default, deserialize_with = "nullable")]
    pub business_memberships: Vec<BusinessMembership>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BusinessMembership {
    pub business: Business,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Business {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub account_id: String,
}
