use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reclaim_core::{JobId, UserId};
use reclaim_infra::jobs::{DeletionJob, JobStatus};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /process`.
///
/// Every field is optional at this layer so a malformed payload maps to a
/// `400` with a readable message instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    pub record: Option<TriggerRecord>,
    #[serde(rename = "currentPath")]
    pub current_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerRecord {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub bucket_name: Option<String>,
    pub status: Option<String>,
    /// Either a JSON array of strings or a string holding one.
    pub logs: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const MISSING_RECORD: &str = "Invalid payload: Missing record or user_id";

impl TriggerRecord {
    /// Rebuild the job record carried by a trigger.
    pub fn into_job(self, default_bucket: &str) -> Result<DeletionJob, String> {
        let (Some(id), Some(user_id)) = (non_blank(self.id), non_blank(self.user_id)) else {
            return Err(MISSING_RECORD.to_string());
        };

        let id: JobId = id
            .parse()
            .map_err(|_| format!("Invalid payload: bad record id {id:?}"))?;
        let user_id: UserId = user_id
            .parse()
            .map_err(|_| format!("Invalid payload: bad user_id {user_id:?}"))?;
        let status = match non_blank(self.status) {
            Some(s) => s
                .parse::<JobStatus>()
                .map_err(|e| format!("Invalid payload: {e}"))?,
            None => JobStatus::Pending,
        };

        let now = Utc::now();
        Ok(DeletionJob {
            id,
            user_id,
            bucket_name: non_blank(self.bucket_name).unwrap_or_else(|| default_bucket.to_string()),
            status,
            logs: self.logs.map(parse_logs).unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_logs(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => serde_json::from_str::<Vec<String>>(&s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub user_id: String,
    pub bucket_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<usize>,
}

impl ListJobsQuery {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 500;

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TriggerResponse {
    Completed { message: &'static str, deleted: usize },
    HandedOff { message: &'static str, path: String },
    Accepted { message: &'static str, job_id: String },
}

impl TriggerResponse {
    pub fn completed(deleted: usize) -> Self {
        TriggerResponse::Completed {
            message: "completed",
            deleted,
        }
    }

    pub fn handed_off(path: String) -> Self {
        TriggerResponse::HandedOff {
            message: "re-invoked",
            path,
        }
    }

    pub fn accepted(job_id: JobId) -> Self {
        TriggerResponse::Accepted {
            message: "accepted",
            job_id: job_id.to_string(),
        }
    }
}
