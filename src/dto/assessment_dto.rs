use crate::models::audit_log::AuditLog;
use crate::models::evaluation::Evaluation;
use crate::models::feedback::Feedback;
use crate::models::status::{AttemptStatus, SystemResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ListAssessmentsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListAssessmentsQuery {
    pub fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluateQuestionPayload {
    #[validate(required(message = "question is required"))]
    pub question: Option<i64>,
    #[validate(required(message = "status is required"), length(min = 1))]
    pub status: Option<String>,
    #[validate(length(max = 5000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitFeedbackPayload {
    #[validate(required(message = "status is required"), length(min = 1))]
    pub status: Option<String>,
    #[validate(length(max = 10000))]
    pub feedback: Option<String>,
    pub assisted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateStatusPayload {
    #[validate(required(message = "status is required"), length(min = 1))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentListItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub student_id: i64,
    pub student_name: Option<String>,
    pub course_id: i64,
    pub course_title: Option<String>,
    pub quiz_id: i64,
    pub status: AttemptStatus,
    pub status_label: &'static str,
    pub score: Option<rust_decimal::Decimal>,
    pub system_result: SystemResult,
    pub assessed_by: String,
    pub assessed_on: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentPage {
    pub items: Vec<AssessmentListItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentDetail {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub student_id: i64,
    pub student_name: Option<String>,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub passing_percentage: Option<rust_decimal::Decimal>,
    pub course_id: i64,
    pub course_title: Option<String>,
    pub lesson_id: Option<i64>,
    pub lesson_title: Option<String>,
    pub topic_id: Option<i64>,
    pub topic_title: Option<String>,
    pub status: AttemptStatus,
    pub status_label: &'static str,
    pub system_result: SystemResult,
    pub score: Option<rust_decimal::Decimal>,
    pub assisted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub accessor_id: Option<i64>,
    pub assessed_by: String,
    pub assessed_on: String,
    pub questions: Vec<JsonValue>,
    pub evaluations: Vec<Evaluation>,
    pub feedbacks: Vec<Feedback>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateResponse {
    pub evaluation_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub id: i64,
    pub status: AttemptStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResponse {
    pub items: Vec<AuditLog>,
}
