use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One prior interview of a user for a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub user_id: String,
    pub project_id: String,
    /// Absent transcripts are stored as empty strings
    #[serde(default)]
    pub transcript: String,
    /// Interview duration in minutes
    pub interviewing_time: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            transcript: transcript.into(),
            interviewing_time: None,
            created_at: None,
        }
    }
}
