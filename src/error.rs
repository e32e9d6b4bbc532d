use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FreshtimeError {
    #[error("Config not found at {}. Run `freshtime setup` to configure your token", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("Invalid config file {}: {source}", path.display())]
    ConfigInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Session expired ({detail}). Run `freshtime setup` to re-authenticate.")]
    AuthExpired { detail: String },

    #[error("API error {status} {status_text}: {body}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Error decoding response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Validation(String),

    #[error("No business memberships found on this account")]
    NoBusiness,

    #[error("Timer already running (started {elapsed} ago, note: {note:?}). Run `freshtime stop` first")]
    TimerRunning { elapsed: String, note: String },

    #[error("No timer running")]
    NoTimer,

    #[error("Marked {marked} of {total} entries as billed; entry #{entry_id} failed: {source}")]
    PartiallyBilled {
        marked: usize,
        total: usize,
        entry_id: i64,
        source: Box<FreshtimeError>,
    },

    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Input error: {source}")]
    Input {
        #[from]
        source: inquire::InquireError,
    },
}

impl FreshtimeError {
    pub fn validation(message: impl Into<String>) -> Self {
        FreshtimeError::Validation(message.into())
    }
}

pub type Result<T, E = FreshtimeError> = std::result::Result<T, E>;
