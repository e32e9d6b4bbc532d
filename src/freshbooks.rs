use std::cell::RefCell;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FreshtimeError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.freshbooks.com";

/// Refresh-and-retry cycles allowed for one outbound request.
const MAX_REFRESH_ATTEMPTS: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub fn put<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Ok(Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            body: Some(serde_json::to_value(body)?),
        })
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_pairs(mut self, pairs: &[(String, String)]) -> Self {
        self.query.extend(pairs.iter().cloned());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request. Implementations must not retry or inspect the status.
pub trait Transport {
    fn send(&self, request: &ApiRequest, authorization: &str) -> Result<RawResponse>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("freshtime-cli")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest, authorization: &str) -> Result<RawResponse> {
        let base = format!("{}{}", self.base_url, request.path);
        let url = reqwest::Url::parse_with_params(&base, &request.query)
            .map_err(|err| FreshtimeError::validation(format!("Invalid URL {base}: {err}")))?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status();
        let body = response.text()?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Access to the bearer token, and optionally a way to replace it.
pub trait TokenSource {
    fn token(&self) -> &str;

    fn can_refresh(&self) -> bool;

    /// Obtains and persists a new token pair, leaving `token()` returning the new
    /// access token.
    fn refresh(&mut self) -> Result<()>;
}

pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> &str {
        &self.0
    }

    fn can_refresh(&self) -> bool {
        false
    }

    fn refresh(&mut self) -> Result<()> {
        Err(FreshtimeError::AuthExpired {
            detail: "no refresh token available".to_string(),
        })
    }
}

pub struct FreshbooksClient<T: Transport = HttpTransport> {
    transport: T,
    tokens: RefCell<Box<dyn TokenSource>>,
}

impl FreshbooksClient<HttpTransport> {
    pub fn new(tokens: Box<dyn TokenSource>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, tokens)
    }

    pub fn with_base_url(base_url: &str, tokens: Box<dyn TokenSource>) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(base_url)?, tokens))
    }
}

impl<T: Transport> FreshbooksClient<T> {
    pub fn with_transport(transport: T, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            transport,
            tokens: RefCell::new(tokens),
        }
    }

    pub fn get<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        self.execute(&request)
    }

    pub fn execute<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R> {
        let response = self.dispatch(request)?;
        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        Ok(serde_json::from_str(body)?)
    }

    /// Runs a request whose response body is not needed.
    pub fn execute_discarding(&self, request: &ApiRequest) -> Result<()> {
        self.dispatch(request).map(|_| ())
    }

    fn dispatch(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut refresh_attempts = 0;
        loop {
            let authorization = format!("Bearer {}", self.tokens.borrow().token());
            debug!("{} {}", request.method, request.path);
            let response = self.transport.send(request, &authorization)?;

            if response.status == 401 {
                if refresh_attempts < MAX_REFRESH_ATTEMPTS && self.tokens.borrow().can_refresh() {
                    refresh_attempts += 1;
                    info!("401 from {}; refreshing access token", request.path);
                    if let Err(err) = self.tokens.borrow_mut().refresh() {
                        warn!("token refresh failed: {err}");
                        return Err(FreshtimeError::AuthExpired {
                            detail: format!("token refresh failed: {err}"),
                        });
                    }
                    continue;
                }
                return Err(FreshtimeError::AuthExpired {
                    detail: unauthorized_detail(&response.body),
                });
            }

            if !response.is_success() {
                return Err(FreshtimeError::Api {
                    status: response.status,
                    status_text: response.status_text,
                    body: response.body,
                });
            }

            return Ok(response);
        }
    }
}

fn unauthorized_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        "401 Unauthorized".to_string()
    } else {
        format!("401 Unauthorized: {body}")
    }
}
