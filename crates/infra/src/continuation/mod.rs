//! Soft deadline and self re-invocation.
//!
//! An invocation that runs out of budget hands the rest of the job to a fresh
//! invocation by sending a [`Continuation`]: the job record plus the directory
//! to inspect next. Nothing else survives between links of the chain.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::jobs::DeletionJob;

pub mod http;

pub use http::HttpContinuationDispatcher;

/// Payload that resumes a job in a new invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub record: DeletionJob,
    #[serde(rename = "currentPath")]
    pub current_path: String,
}

/// The caller's `Authorization` header value, forwarded verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct ForwardedAuth(String);

impl ForwardedAuth {
    pub fn new(header_value: impl Into<String>) -> Self {
        Self(header_value.into())
    }

    /// Header value for a bearer token.
    pub fn bearer(token: &str) -> Self {
        Self(format!("Bearer {token}"))
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for ForwardedAuth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ForwardedAuth(<redacted>)")
    }
}

/// Self-imposed wall-clock budget for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct SoftDeadline {
    started: Instant,
    budget: Duration,
}

impl SoftDeadline {
    pub const DEFAULT_BUDGET: Duration = Duration::from_secs(50);

    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// A zero budget is exceeded immediately.
    pub fn is_exceeded(&self) -> bool {
        self.elapsed() >= self.budget
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("continuation transport error: {0}")]
    Transport(String),
    #[error("continuation rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a continuation to a fresh invocation.
#[async_trait]
pub trait ContinuationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        continuation: &Continuation,
        auth: &ForwardedAuth,
    ) -> Result<(), DispatchError>;
}

/// Records continuations instead of sending them (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryContinuationDispatcher {
    sent: Mutex<Vec<(Continuation, ForwardedAuth)>>,
    failure: Mutex<Option<DispatchError>>,
}

impl InMemoryContinuationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent dispatch fail with `err`.
    pub fn fail_with(&self, err: DispatchError) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(err);
    }

    pub fn sent(&self) -> Vec<(Continuation, ForwardedAuth)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ContinuationDispatcher for InMemoryContinuationDispatcher {
    async fn dispatch(
        &self,
        continuation: &Continuation,
        auth: &ForwardedAuth,
    ) -> Result<(), DispatchError> {
        if let Some(err) = self.failure.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((continuation.clone(), auth.clone()));
        Ok(())
    }
}
