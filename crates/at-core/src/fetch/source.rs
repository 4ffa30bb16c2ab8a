//! Remote telemetry source.
//!
//! Queries are built independently of the transport so they can be checked
//! without a server. [`NightscoutClient`] is the `ureq` implementation.

use at_common::TelemetryStream;
use at_config::FetchSettings;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// Maximum response body bytes echoed into an error message.
const ERROR_BODY_LIMIT: usize = 256;

/// Errors from a telemetry source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unreadable response body: {0}")]
    Body(String),
}

impl SourceError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport(_) | SourceError::Body(_) => true,
            SourceError::Status { code, .. } => *code == 429 || *code >= 500,
        }
    }
}

/// One windowed query against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryQuery {
    pub stream: TelemetryStream,
    pub date: NaiveDate,
    pub path: &'static str,
    pub params: Vec<(String, String)>,
}

impl TelemetryQuery {
    /// The `[date - 1 day, date + 1 day)` window bounds.
    pub fn window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
        (date - Duration::days(1), date + Duration::days(1))
    }

    pub fn for_date(
        stream: TelemetryStream,
        date: NaiveDate,
        entries_count: u32,
        token: Option<&str>,
    ) -> Self {
        let (after, before) = Self::window(date);
        let after = after.format("%Y-%m-%d").to_string();
        let before = before.format("%Y-%m-%d").to_string();
        let (path, mut params) = match stream {
            TelemetryStream::Treatments => (
                "/api/v1/treatments.json",
                vec![
                    ("find[created_at][$gt]".to_string(), after),
                    ("find[created_at][$lt]".to_string(), before),
                ],
            ),
            TelemetryStream::Entries => (
                "/api/v1/entries/sgv.json",
                vec![
                    ("find[dateString][$gt]".to_string(), after),
                    ("find[dateString][$lt]".to_string(), before),
                    ("count".to_string(), entries_count.to_string()),
                ],
            ),
        };
        if let Some(token) = token {
            params.push(("token".to_string(), token.to_string()));
        }
        Self {
            stream,
            date,
            path,
            params,
        }
    }

    /// URL for log lines, with the token value masked.
    pub fn redacted_url(&self, host: &str) -> String {
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| {
                if k == "token" {
                    format!("{k}=[REDACTED]")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        format!("{host}{}?{}", self.path, query.join("&"))
    }
}

/// Capability to execute a telemetry query and return the raw body.
pub trait TelemetrySource: Send + Sync {
    fn get(&self, query: &TelemetryQuery) -> Result<String, SourceError>;
}

/// Nightscout REST client.
pub struct NightscoutClient {
    host: String,
    agent: ureq::Agent,
}

impl NightscoutClient {
    pub fn new(host: impl Into<String>, settings: &FetchSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(settings.connect_timeout())
            .timeout_read(settings.read_timeout())
            .user_agent(concat!("autotune-dow/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            agent,
        }
    }
}

impl TelemetrySource for NightscoutClient {
    fn get(&self, query: &TelemetryQuery) -> Result<String, SourceError> {
        let url = format!("{}{}", self.host, query.path);
        let mut request = self.agent.get(&url);
        for (key, value) in &query.params {
            request = request.query(key, value);
        }
        match request.call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| SourceError::Body(e.to_string())),
            Err(ureq::Error::Status(code, response)) => {
                let mut body = response.into_string().unwrap_or_default();
                if body.len() > ERROR_BODY_LIMIT {
                    let mut cut = ERROR_BODY_LIMIT;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                Err(SourceError::Status { code, body })
            }
            Err(e) => Err(SourceError::Transport(e.to_string())),
        }
    }
}
