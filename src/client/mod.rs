// Backend QA service client: batch upload, conversational query, history

mod types;

pub use types::{ChatMessage, HistoryCommand, HistoryReply, QueryResponse, Topic, Upload};

use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::ingestion::BatchPayload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

/// Seam between the triage workflow and the answering service
pub trait QaBackend {
    /// Upload a questionnaire and wait for the answered batch
    fn submit_batch(&self, upload: &Upload) -> impl Future<Output = Result<BatchPayload>> + Send;

    /// Ask a single free-form question
    fn ask(&self, message: &str) -> impl Future<Output = Result<QueryResponse>> + Send;

    /// Run a history (topic) command
    fn history(
        &self,
        command: &HistoryCommand,
    ) -> impl Future<Output = Result<HistoryReply>> + Send;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct HistoryRequest {
    history: String,
}

/// HTTP implementation of [`QaBackend`]
pub struct HttpBackend {
    client: reqwest::Client,
    batch_url: String,
    query_url: String,
    history_url: String,
}

impl HttpBackend {
    /// Build a client for the endpoints in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.backend.timeout_duration()?)
            .build()?;

        Ok(Self {
            client,
            batch_url: config.endpoint_url(&config.backend.batch_endpoint),
            query_url: config.endpoint_url(&config.backend.query_endpoint),
            history_url: config.endpoint_url(&config.backend.history_endpoint),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TriageError::Json {
            source: e,
            context: context.to_string(),
        })
    }
}

impl QaBackend for HttpBackend {
    async fn submit_batch(&self, upload: &Upload) -> Result<BatchPayload> {
        tracing::info!(
            url = %self.batch_url,
            file = %upload.file_name,
            bytes = upload.bytes.len(),
            "Submitting questionnaire"
        );

        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.mime_type())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.batch_url)
            .multipart(form)
            .send()
            .await?;
        let payload: BatchPayload =
            Self::read_json(response, "Failed to parse batch submission response").await?;

        tracing::info!(items = payload.results.len(), "Questionnaire answered");
        Ok(payload)
    }

    async fn ask(&self, message: &str) -> Result<QueryResponse> {
        tracing::debug!(url = %self.query_url, "Sending conversational query");
        let response = self
            .client
            .post(&self.query_url)
            .json(&QueryRequest { message })
            .send()
            .await?;
        Self::read_json(response, "Failed to parse query response").await
    }

    async fn history(&self, command: &HistoryCommand) -> Result<HistoryReply> {
        tracing::debug!(url = %self.history_url, command = %command, "Sending history command");
        let response = self
            .client
            .post(&self.history_url)
            .json(&HistoryRequest {
                history: command.to_string(),
            })
            .send()
            .await?;
        let value: serde_json::Value =
            Self::read_json(response, "Failed to parse history response").await?;
        Ok(HistoryReply::from_value(command, value))
    }
}
