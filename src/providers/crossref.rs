use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::RenameOptions;
use crate::domain::Doi;
use crate::error::RenamerError;

const DATE_FIELDS: &[&str] = &["issued", "published-print", "published-online", "created"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRecord {
    pub title: Option<String>,
    pub year: Option<i32>,
}

impl RegistryRecord {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.year.is_none()
    }
}

pub trait RegistryClient: Send + Sync {
    fn lookup(&self, doi: &Doi) -> Result<RegistryRecord, RenamerError>;
}

#[derive(Clone)]
pub struct CrossrefClient {
    client: Client,
    base: String,
}

impl CrossrefClient {
    pub fn new(base: &str, user_agent: &str, timeout: Duration) -> Result<Self, RenamerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| RenamerError::InvalidOption(format!("user agent: {err}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| RenamerError::CrossrefHttp(err.to_string()))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_options(options: &RenameOptions) -> Result<Self, RenamerError> {
        Self::new(
            &options.registry_base,
            &options.user_agent,
            options.timeout_duration(),
        )
    }

    pub fn work_url(&self, doi: &Doi) -> String {
        format!("{}/works/{}", self.base, encode_doi(doi.as_str()))
    }
}

impl RegistryClient for CrossrefClient {
    fn lookup(&self, doi: &Doi) -> Result<RegistryRecord, RenamerError> {
        let url = self.work_url(doi);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| RenamerError::CrossrefHttp(err.to_string()))?;
        if response.status() != StatusCode::OK {
            debug!("crossref {} answered {}", doi, response.status());
            return Ok(RegistryRecord::default());
        }
        let payload: CrossrefResponse = response
            .json()
            .map_err(|err| RenamerError::CrossrefHttp(err.to_string()))?;
        Ok(payload.message.into_record())
    }
}

#[derive(Debug, Deserialize)]
pub struct CrossrefResponse {
    #[serde(default)]
    pub message: CrossrefMessage,
}

#[derive(Debug, Default, Deserialize)]
pub struct CrossrefMessage {
    #[serde(default)]
    title: Option<Vec<String>>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

impl CrossrefMessage {
    pub fn into_record(self) -> RegistryRecord {
        let title = self
            .title
            .as_ref()
            .and_then(|titles| titles.first())
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());
        RegistryRecord {
            title,
            year: year_from_fields(&self.rest),
        }
    }
}

fn year_from_fields(fields: &serde_json::Map<String, Value>) -> Option<i32> {
    DATE_FIELDS.iter().find_map(|key| {
        fields
            .get(*key)
            .and_then(|value| value.get("date-parts"))
            .and_then(|value| value.as_array())
            .and_then(|parts| parts.first())
            .and_then(|value| value.as_array())
            .and_then(|first| first.first())
            .and_then(|value| value.as_i64())
            .and_then(|year| i32::try_from(year).ok())
    })
}

fn encode_doi(value: &str) -> String {
    let mut out = String::new();
    for byte in value.as_bytes() {
        let ch = *byte as char;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '/' | ':' | '(' | ')' | ';')
        {
            out.push(ch);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
