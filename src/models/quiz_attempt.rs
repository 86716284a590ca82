use super::status::{AttemptStatus, SystemResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub course_id: i64,
    pub lesson_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub status: AttemptStatus,
    pub system_result: SystemResult,
    pub score: Option<rust_decimal::Decimal>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub accessor_id: Option<i64>,
    pub is_valid_accessor: bool,
    pub assisted: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Submitted and no longer being answered; the latest-per-student check lives in the store.
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some() && self.system_result != SystemResult::Inprogress
    }

    /// The student triggered the automatic mark themselves.
    pub fn marked_by_student(&self) -> bool {
        self.system_result == SystemResult::Marked
            && self.is_valid_accessor
            && self.accessor_id == Some(self.user_id)
    }
}

/// One row of the assessments grid: the latest attempt of a student for a quiz, joined with
/// the names and the latest finalized evaluation needed for display.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptSummary {
    #[sqlx(flatten)]
    pub attempt: QuizAttempt,
    pub student_name: Option<String>,
    pub course_title: Option<String>,
    pub assessor_name: Option<String>,
    pub assessed_at: Option<DateTime<Utc>>,
}
