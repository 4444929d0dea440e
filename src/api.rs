//! HTTP client for the word-list and results services.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{LoadError, SubmitError};
use crate::loader::WordSource;
use crate::stimulus::StimulusSet;
use crate::submitter::{ResultsPayload, ResultsSink};

pub const WORDS_PATH: &str = "/api/words";
pub const RESULTS_PATH: &str = "/api/results";

const CONNECT_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            // results service may rely on a session cookie
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl WordSource for ApiClient {
    async fn fetch_words(&self) -> Result<StimulusSet, LoadError> {
        let url = self.endpoint(WORDS_PATH);
        tracing::debug!(%url, "fetching word list");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| LoadError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ResultsSink for ApiClient {
    async fn send_results(&self, payload: &ResultsPayload) -> Result<(), SubmitError> {
        let url = self.endpoint(RESULTS_PATH);
        tracing::debug!(%url, records = payload.records.len(), "posting results");

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;

        if status.is_success() {
            // a 2xx that is not JSON did not come from the results service
            return match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(ack) => {
                    tracing::debug!(%ack, "results acknowledged");
                    Ok(())
                }
                Err(err) => {
                    tracing::warn!(status = status.as_u16(), error = %err, "results ack was not JSON");
                    Err(SubmitError::Rejected {
                        status: status.as_u16(),
                        message: SubmitError::GENERIC_MESSAGE.to_string(),
                    })
                }
            };
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| SubmitError::GENERIC_MESSAGE.to_string());

        Err(SubmitError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
