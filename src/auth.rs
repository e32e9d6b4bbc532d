use std::env;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FreshtimeError, Result};
use crate::freshbooks::{DEFAULT_BASE_URL, TokenSource};
use crate::storage::{Config, ConfigStore};

pub const REDIRECT_URI: &str = "https://localhost:8457/callback";
const AUTHORIZE_URL: &str = "https://auth.freshbooks.com/service/auth/oauth/authorize";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// Turns a refresh token into a fresh token pair.
pub trait TokenExchange {
    fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// The registered OAuth application.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    client_id: String,
    client_secret: String,
    base_url: String,
}

impl OAuthApp {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `FRESHBOOKS_CLIENT_ID` and `FRESHBOOKS_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self> {
        let read = |key: &str| env::var(key).ok().filter(|value| !value.trim().is_empty());
        match (read("FRESHBOOKS_CLIENT_ID"), read("FRESHBOOKS_CLIENT_SECRET")) {
            (Some(id), Some(secret)) => Ok(Self::new(id, secret)),
            _ => Err(FreshtimeError::validation(
                "Missing FRESHBOOKS_CLIENT_ID or FRESHBOOKS_CLIENT_SECRET environment variables",
            )),
        }
    }

    pub fn authorize_url(&self) -> String {
        reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", REDIRECT_URI),
            ],
        )
        .map(|url| url.to_string())
        .unwrap_or_else(|_| AUTHORIZE_URL.to_string())
    }

    pub fn exchange_code(&self, code: &str) -> Result<TokenPair> {
        self.request_tokens(&TokenRequest {
            grant_type: "authorization_code",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code: Some(code),
            redirect_uri: Some(REDIRECT_URI),
            refresh_token: None,
        })
    }

    fn request_tokens(&self, body: &TokenRequest<'_>) -> Result<TokenPair> {
        let client = Client::builder()
            .user_agent("freshtime-cli")
            .timeout(Duration::from_secs(30))
            .build()?;
        let url = format!("{}/auth/oauth/token", self.base_url);
        debug!("POST {url} ({})", body.grant_type);
        let response = client.post(url).json(body).send()?;

        let status = response.status();
        let text = response.text()?;
        if status.as_u16() != 200 {
            return Err(FreshtimeError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl TokenExchange for OAuthApp {
    fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.request_tokens(&TokenRequest {
            grant_type: "refresh_token",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code: None,
            redirect_uri: None,
            refresh_token: Some(refresh_token),
        })
    }
}

/// Exchanges the config's refresh token and saves the rotated pair.
pub fn refresh_and_persist(
    config: &mut Config,
    store: &ConfigStore,
    exchange: &dyn TokenExchange,
) -> Result<()> {
    let refresh_token = config.refresh_token().ok_or_else(|| {
        FreshtimeError::validation("No refresh token in config. Run `freshtime setup` to re-authenticate")
    })?;
    let pair = exchange.refresh(refresh_token)?;
    config.access_token = pair.access_token;
    if !pair.refresh_token.is_empty() {
        config.refresh_token = Some(pair.refresh_token);
    }
    store.save(config)?;
    info!("refreshed access token {}", fingerprint(&config.access_token));
    Ok(())
}

/// Token source backed by the saved config; refreshing rewrites the config file.
pub struct ConfigTokenSource<E: TokenExchange = OAuthApp> {
    config: Config,
    store: ConfigStore,
    exchange: Option<E>,
}

impl<E: TokenExchange> ConfigTokenSource<E> {
    /// `exchange` is `None` when no OAuth app is available, which disables refresh.
    pub fn new(config: Config, store: ConfigStore, exchange: Option<E>) -> Self {
        Self {
            config,
            store,
            exchange,
        }
    }
}

impl<E: TokenExchange> TokenSource for ConfigTokenSource<E> {
    fn token(&self) -> &str {
        &self.config.access_token
    }

    fn can_refresh(&self) -> bool {
        self.exchange.is_some() && self.config.refresh_token().is_some()
    }

    fn refresh(&mut self) -> Result<()> {
        let exchange = self.exchange.as_ref().ok_or_else(|| FreshtimeError::AuthExpired {
            detail: "OAuth client credentials are not configured".to_string(),
        })?;
        refresh_and_persist(&mut self.config, &self.store, exchange)
    }
}

/// Short stable digest for log lines; never log the token itself.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
