//! # AI Dataset Summaries
//!
//! Builds a compact profile of a table and asks an OpenAI-compatible
//! chat-completions endpoint to describe it in prose.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AiConfig;
use crate::error::{ApiError, internal_error, truncate_body};
use crate::insights::{ColumnSummary, Table, kpis, sanitize_json, stats};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SAMPLE_ROWS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a data analyst. Summarize the dataset described by the user \
in a few short paragraphs: what it contains, notable patterns, and anything that looks unusual.";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("AI provider not configured")]
    NotConfigured,
    #[error("AI provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("AI provider returned status {status}")]
    Status { status: u16, body: String },
    #[error("AI provider returned no content")]
    EmptyResponse,
    #[error("failed to encode dataset profile: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<SummaryError> for ApiError {
    fn from(error: SummaryError) -> Self {
        match error {
            SummaryError::NotConfigured => internal_error("AI summary not configured"),
            other => {
                warn!(error = %other, "AI summary failed");
                internal_error("AI summary failed")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    /// `numeric` or `text`
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// What the provider gets to see about a dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
    pub kpis: Map<String, Value>,
    pub statistics: Vec<ColumnSummary>,
    pub sample_rows: Vec<Map<String, Value>>,
}

impl DatasetProfile {
    pub fn from_table(table: &Table) -> Self {
        Self {
            row_count: table.row_count(),
            columns: table
                .columns()
                .iter()
                .map(|column| ColumnProfile {
                    name: column.name.clone(),
                    kind: if column.data.is_numeric() { "numeric" } else { "text" },
                })
                .collect(),
            kpis: kpis::compute_kpis(table),
            statistics: stats::describe(table),
            sample_rows: table.head(SAMPLE_ROWS),
        }
    }
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, profile: &DatasetProfile) -> Result<String, SummaryError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsSummarizer {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsSummarizer {
    /// `None` when no API key is configured.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Some(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        }))
    }
}

#[async_trait]
impl SummaryProvider for ChatCompletionsSummarizer {
    async fn summarize(&self, profile: &DatasetProfile) -> Result<String, SummaryError> {
        let profile_json = serde_json::to_string_pretty(&sanitize_json(profile)?)?;
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Dataset profile:\n{profile_json}")},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let summary = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SummaryError::EmptyResponse)?;

        info!(model = %self.model, rows = profile.row_count, "AI summary generated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::table::{Column, ColumnData};

    fn table() -> Table {
        Table::new(vec![
            Column {
                name: "units".into(),
                data: ColumnData::Numeric((1..=8).map(|v| Some(v as f64)).collect()),
            },
            Column {
                name: "region".into(),
                data: ColumnData::Text((1..=8).map(|v| Some(format!("r{v}"))).collect()),
            },
        ])
    }

    #[test]
    fn test_profile_limits_sample_rows() {
        let profile = DatasetProfile::from_table(&table());
        assert_eq!(profile.row_count, 8);
        assert_eq!(profile.sample_rows.len(), 5);
        assert_eq!(
            profile.columns,
            vec![
                ColumnProfile { name: "units".into(), kind: "numeric" },
                ColumnProfile { name: "region".into(), kind: "text" },
            ]
        );
        assert_eq!(profile.statistics.len(), 1);
    }

    #[test]
    fn test_from_config_without_key_is_none() {
        assert!(ChatCompletionsSummarizer::from_config(&AiConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_errors_map_to_generic_500s() {
        let missing: ApiError = SummaryError::NotConfigured.into();
        assert_eq!(missing.message, Box::from("AI summary not configured"));

        let failed: ApiError = SummaryError::EmptyResponse.into();
        assert_eq!(failed.status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.message, Box::from("AI summary failed"));
    }
}
