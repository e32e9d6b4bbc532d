use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::freshbooks::{ApiRequest, FreshbooksClient, Transport};

pub const PER_PAGE: u32 = 100;

/// The two wrappers FreshBooks puts around a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Timetracking and projects: `{ <key>: [...], meta: { pages: N } }`.
    Flat,
    /// Accounting: `{ response: { result: { <key>: [...], pages: N } } }`.
    Nested,
}

impl Envelope {
    /// Matchers in the order they are tried.
    pub const ALL: [Envelope; 2] = [Envelope::Flat, Envelope::Nested];

    pub fn extract(self, page: &Value, key: &str) -> Option<Page> {
        match self {
            Envelope::Flat => {
                let items = page.get(key)?;
                let pages = page.get("meta").and_then(|meta| meta.get("pages"));
                Some(Page::new(items, pages))
            }
            Envelope::Nested => {
                let result = page.get("response")?.get("result")?;
                let items = result.get(key)?;
                Some(Page::new(items, result.get("pages")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Page count reported by the server; 1 when it was absent.
    pub pages: i64,
}

impl Page {
    fn new(items: &Value, pages: Option<&Value>) -> Self {
        let items = items.as_array().cloned().unwrap_or_default();
        let pages = match pages {
            None => 1,
            Some(value) => value.as_i64().unwrap_or(0),
        };
        Self { items, pages }
    }

    fn empty() -> Self {
        Self {
            items: Vec::new(),
            pages: 1,
        }
    }
}

/// First envelope that holds `key` wins; neither means an empty, final page.
pub fn extract_page(page: &Value, key: &str) -> Page {
    Envelope::ALL
        .iter()
        .find_map(|envelope| envelope.extract(page, key))
        .unwrap_or_else(Page::empty)
}

/// Records that deserialized, plus how many did not.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

pub fn parse_records<T: DeserializeOwned>(raw: Vec<Value>, kind: &str) -> Parsed<T> {
    let mut items = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for record in raw {
        match serde_json::from_value::<T>(record) {
            Ok(item) => items.push(item),
            Err(err) => {
                skipped += 1;
                debug!("skipping malformed {kind} record: {err}");
            }
        }
    }
    Parsed { items, skipped }
}

impl<T: Transport> FreshbooksClient<T> {
    /// Fetches every page of a listing, in order.
    pub fn get_paginated(
        &self,
        path: &str,
        result_key: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        let mut page = 1;
        let mut total_pages = 1;

        while page <= total_pages {
            debug!("fetching {path} page {page}/{total_pages}");
            let request = ApiRequest::get(path)
                .query_pairs(params)
                .query("page", page)
                .query("per_page", PER_PAGE);
            let body: Value = self.execute(&request)?;

            let extracted = extract_page(&body, result_key);
            results.extend(extracted.items);
            if extracted.pages > 0 {
                total_pages = extracted.pages;
            }
            page += 1;
        }

        Ok(results)
    }
}
