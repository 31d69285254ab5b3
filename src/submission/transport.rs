//! Submission transport — one outbound request, fire-and-forget.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::payload::SubmissionPayload;
use crate::error::SubmissionError;

#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, payload: SubmissionPayload) -> Result<(), SubmissionError>;
}

/// Posts the payload as a multipart form.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn submit(&self, payload: SubmissionPayload) -> Result<(), SubmissionError> {
        let resp = self
            .client
            .post(&self.url)
            .multipart(payload.to_form())
            .send()
            .await
            .map_err(|e| SubmissionError::SendFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(SubmissionError::Rejected {
                url: self.url.clone(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Send `payload` in the background. The caller never waits on or sees the
/// result; failures are only logged.
pub fn dispatch(
    transport: Arc<dyn SubmissionTransport>,
    payload: SubmissionPayload,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let fields = payload.len();
        match transport.submit(payload).await {
            Ok(()) => info!(fields, "Quote submitted"),
            Err(e) => warn!(fields, error = %e, "Quote submission failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;

    struct Recording {
        seen: Mutex<Vec<SubmissionPayload>>,
        fail: bool,
    }

    #[async_trait]
    impl SubmissionTransport for Recording {
        async fn submit(&self, payload: SubmissionPayload) -> Result<(), SubmissionError> {
            self.seen.lock().await.push(payload);
            if self.fail {
                Err(SubmissionError::Rejected {
                    url: "http://test".into(),
                    status: 500,
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_payload() {
        let transport = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        dispatch(transport.clone(), SubmissionPayload::default())
            .await
            .unwrap();
        assert_eq!(transport.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let transport = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        // The task itself completes normally.
        dispatch(transport.clone(), SubmissionPayload::default())
            .await
            .unwrap();
        assert_eq!(transport.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_send_failed() {
        let transport = HttpTransport::new(reqwest::Client::new(), "http://127.0.0.1:9/submit");
        let err = transport
            .submit(SubmissionPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::SendFailed { .. }));
    }
}
