use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

pub const ASSESSMENT_LOG: &str = "assessment";
pub const QUIZ_ATTEMPT_SUBJECT: &str = "quiz_attempt";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub log_name: String,
    pub description: String,
    pub subject_type: String,
    pub subject_id: i64,
    pub causer_id: Option<i64>,
    pub event: String,
    pub properties: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub log_name: String,
    pub description: String,
    pub subject_type: String,
    pub subject_id: i64,
    pub causer_id: Option<i64>,
    pub event: String,
    pub properties: JsonValue,
}

impl NewAuditEntry {
    /// Entry for a workflow action taken on a quiz attempt.
    pub fn for_attempt(
        attempt_id: i64,
        causer_id: i64,
        event: &str,
        description: impl Into<String>,
        properties: JsonValue,
    ) -> Self {
        Self {
            log_name: ASSESSMENT_LOG.to_string(),
            description: description.into(),
            subject_type: QUIZ_ATTEMPT_SUBJECT.to_string(),
            subject_id: attempt_id,
            causer_id: Some(causer_id),
            event: event.to_string(),
            properties,
        }
    }
}
