//! Optional remote memory of past queries.
//!
//! After each `query` tool call the statement and its outcome are recorded
//! (fire-and-forget); the `learn` tool retrieves the most relevant past
//! entries for a question.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::LearningSettings;
use crate::error::{QuarryError, Result};
use crate::provider::http::shared_client;

const API_KEY_HEADER: &str = "x-api-key";

/// Default number of prior entries returned by `learn`.
pub const DEFAULT_RETRIEVE_LIMIT: usize = 5;

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    #[serde(rename = "code")]
    pub statement: String,
    pub description: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Backend family the statement was written for.
    #[serde(skip)]
    pub dialect: String,
}

/// A previously recorded query or table note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorEntry {
    #[serde(default, alias = "statement")]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[async_trait]
pub trait LearningCollaborator: Send + Sync {
    async fn record(&self, entry: &QueryRecord) -> Result<()>;

    async fn retrieve(&self, question: &str, limit: usize) -> Result<Vec<PriorEntry>>;
}

/// HTTP client for the learning service.
#[derive(Debug, Clone)]
pub struct HttpLearningClient {
    base_url: String,
    api_key: Option<String>,
}

impl HttpLearningClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_settings(settings: &LearningSettings) -> Self {
        Self::new(settings.url.clone(), settings.api_key.clone())
    }

    fn headers(&self) -> Result<HeaderMap> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            QuarryError::Authentication("learning service requires an API key".into())
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(key)
            .map_err(|_| QuarryError::Authentication("learning API key is not a valid header".into()))?;
        headers.insert(API_KEY_HEADER, value);
        Ok(headers)
    }
}

fn classify(status: u16, body: String) -> QuarryError {
    match status {
        401 | 403 => QuarryError::Authentication(format!("learning service rejected credentials: {body}")),
        _ => QuarryError::Degraded(format!("learning service returned {status}: {body}")),
    }
}

fn degraded(e: reqwest::Error) -> QuarryError {
    QuarryError::Degraded(format!("learning service unreachable: {e}"))
}

#[async_trait]
impl LearningCollaborator for HttpLearningClient {
    async fn record(&self, entry: &QueryRecord) -> Result<()> {
        let url = format!("{}/query/{}", self.base_url, entry.dialect);
        let resp = shared_client()
            .post(url)
            .headers(self.headers()?)
            .json(entry)
            .send()
            .await
            .map_err(degraded)?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }
        debug!(success = entry.success, "query recorded");
        Ok(())
    }

    async fn retrieve(&self, question: &str, limit: usize) -> Result<Vec<PriorEntry>> {
        let mut url = url::Url::parse(&format!("{}/query/", self.base_url))
            .map_err(|e| QuarryError::Configuration(format!("invalid learning URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| QuarryError::Configuration("learning URL cannot be a base".into()))?
            .pop_if_empty()
            .push(question);
        url.query_pairs_mut().append_pair("limit", &limit.to_string());

        let resp = shared_client()
            .get(url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(degraded)?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(status, body));
        }
        let payload: Value = resp.json().await.map_err(degraded)?;
        let items = match payload {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("queries").or_else(|| map.remove("results")) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        let mut entries: Vec<PriorEntry> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_statement_as_code() {
        let record = QueryRecord {
            statement: "SELECT 1".into(),
            description: Some("smoke".into()),
            success: false,
            error_message: Some("boom".into()),
            dialect: "database".into(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["code"], "SELECT 1");
        assert_eq!(value["error_message"], "boom");
        assert!(value.get("dialect").is_none());
    }

    #[tokio::test]
    async fn missing_key_is_an_authentication_error() {
        let client = HttpLearningClient::new("http://127.0.0.1:9", None);
        assert!(matches!(
            client.retrieve("revenue", 5).await,
            Err(QuarryError::Authentication(_))
        ));
    }
}
