//! Continuation delivery over HTTP to the processor's own trigger endpoint.

use async_trait::async_trait;
use tracing::info;

use super::{Continuation, ContinuationDispatcher, DispatchError, ForwardedAuth};

/// Header asking the receiving trigger to acknowledge before running.
pub const PREFER_ASYNC: &str = "respond-async";

/// Posts `{record, currentPath}` to the trigger URL with the caller's
/// `Authorization` header and `Prefer: respond-async`, so the next link runs
/// in its own task instead of inside this request.
#[derive(Debug, Clone)]
pub struct HttpContinuationDispatcher {
    http: reqwest::Client,
    url: String,
}

impl HttpContinuationDispatcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ContinuationDispatcher for HttpContinuationDispatcher {
    async fn dispatch(
        &self,
        continuation: &Continuation,
        auth: &ForwardedAuth,
    ) -> Result<(), DispatchError> {
        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, auth.header_value())
            .header("Prefer", PREFER_ASYNC)
            .json(continuation)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            job_id = %continuation.record.id,
            path = %continuation.current_path,
            status = status.as_u16(),
            "continuation dispatched"
        );
        Ok(())
    }
}
