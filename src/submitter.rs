use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::participant::ParticipantId;
use crate::recorder::TrialRecord;

/// Where finished result sets go.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn send_results(&self, payload: &ResultsPayload) -> Result<(), SubmitError>;
}

#[async_trait]
impl<T: ResultsSink + ?Sized> ResultsSink for Arc<T> {
    async fn send_results(&self, payload: &ResultsPayload) -> Result<(), SubmitError> {
        (**self).send_results(payload).await
    }
}

/// Body of the results request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(rename = "email")]
    pub participant: String,
    #[serde(rename = "results")]
    pub records: Vec<TrialRecord>,
}

impl ResultsPayload {
    pub fn new(participant: &ParticipantId, records: Vec<TrialRecord>) -> Self {
        Self {
            participant: participant.as_str().to_string(),
            records,
        }
    }
}

pub struct ResultsSubmitter<R> {
    sink: R,
}

impl<R: ResultsSink> ResultsSubmitter<R> {
    pub fn new(sink: R) -> Self {
        Self { sink }
    }

    pub async fn submit(&self, payload: &ResultsPayload) -> Result<(), SubmitError> {
        tracing::info!(records = payload.records.len(), "submitting results");
        match self.sink.send_results(payload).await {
            Ok(()) => {
                tracing::info!("results saved");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "results submission failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Polarity, WordStimulus};
    use assert_matches::assert_matches;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        seen: Mutex<Vec<ResultsPayload>>,
        reject: bool,
    }

    #[async_trait]
    impl ResultsSink for CapturingSink {
        async fn send_results(&self, payload: &ResultsPayload) -> Result<(), SubmitError> {
            self.seen.lock().unwrap().push(payload.clone());
            if self.reject {
                Err(SubmitError::Rejected {
                    status: 500,
                    message: "db down".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn payload() -> ResultsPayload {
        let id = ParticipantId::parse("p1@lab.example").unwrap();
        let stim = WordStimulus::new("mutlu", Polarity::Positive, "tr");
        ResultsPayload::new(&id, vec![TrialRecord::new(&stim, Polarity::Positive, 350)])
    }

    #[test]
    fn payload_uses_service_field_names() {
        let value = serde_json::to_value(payload()).unwrap();
        assert_eq!(value["email"], "p1@lab.example");
        assert_eq!(value["results"][0]["word"], "mutlu");
        assert_eq!(value["results"][0]["responseTime"], 350);
    }

    #[tokio::test]
    async fn submit_forwards_payload_once() {
        let sink = Arc::new(CapturingSink::default());
        let submitter = ResultsSubmitter::new(sink.clone());

        submitter.submit(&payload()).await.unwrap();

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], payload());
    }

    #[tokio::test]
    async fn submit_surfaces_rejection() {
        let sink = CapturingSink {
            reject: true,
            ..Default::default()
        };
        let submitter = ResultsSubmitter::new(sink);

        assert_matches!(
            submitter.submit(&payload()).await,
            Err(SubmitError::Rejected { status: 500, .. })
        );
    }
}
