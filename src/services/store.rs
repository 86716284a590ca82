use crate::error::{Error, Result};
use crate::models::audit_log::{AuditLog, NewAuditEntry};
use crate::models::evaluation::{Evaluation, NewEvaluation, QuestionResult};
use crate::models::feedback::Feedback;
use crate::models::quiz::{AttemptContext, Quiz};
use crate::models::quiz_attempt::{AttemptSummary, QuizAttempt};
use crate::models::status::{AttemptStatus, Verdict};
use crate::models::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Which latest-per-student attempts a list query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    /// Submitted, not auto-marked and still waiting for a human verdict.
    Pending,
    Exact(AttemptStatus),
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(StatusFilter::All);
        };
        match raw.to_ascii_uppercase().as_str() {
            "ALL" => Ok(StatusFilter::All),
            "PENDING" => Ok(StatusFilter::Pending),
            _ => raw
                .parse::<AttemptStatus>()
                .map(StatusFilter::Exact)
                .map_err(|e| Error::Validation(e.to_string())),
        }
    }

    pub fn exact_status(&self) -> Option<AttemptStatus> {
        match self {
            StatusFilter::Exact(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalizeAssessment {
    pub attempt_id: i64,
    pub expected_version: i32,
    pub student_id: i64,
    pub quiz_id: i64,
    pub evaluator_id: i64,
    pub verdict: Verdict,
    pub feedback: Option<String>,
    pub assisted: bool,
    pub accessed_at: DateTime<Utc>,
    pub audit: NewAuditEntry,
}

#[derive(Debug, Clone)]
pub struct FinalizedAssessment {
    pub attempt: QuizAttempt,
    pub evaluation: Evaluation,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub attempt_id: i64,
    pub expected_version: i32,
    pub status: AttemptStatus,
    pub audit: NewAuditEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub counts: BTreeMap<String, i64>,
    pub pending: i64,
}

/// Persistence seam of the assessment workflow.
///
/// Every mutating call carries the audit entry to write with it; implementations store both in
/// one transaction. Version-guarded calls fail with [`Error::Conflict`] when the attempt moved
/// on since it was read.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    async fn find_attempt(&self, attempt_id: i64) -> Result<Option<QuizAttempt>>;

    /// Id of the most recent attempt the student made on the quiz.
    async fn latest_attempt_id(&self, user_id: i64, quiz_id: i64) -> Result<Option<i64>>;

    /// Moves a SUBMITTED attempt to REVIEWING. Returns `None` when the attempt was not
    /// SUBMITTED any more.
    async fn claim_for_review(
        &self,
        attempt_id: i64,
        audit: NewAuditEntry,
    ) -> Result<Option<QuizAttempt>>;

    async fn latest_evaluation(&self, attempt_id: i64) -> Result<Option<Evaluation>>;

    /// All evaluations of the attempt, latest first.
    async fn list_evaluations(&self, attempt_id: i64) -> Result<Vec<Evaluation>>;

    async fn create_evaluation(
        &self,
        evaluation: NewEvaluation,
        audit: NewAuditEntry,
    ) -> Result<Evaluation>;

    /// Overwrites one question's entry in an open evaluation. Returns `None` when the
    /// evaluation has been finalized in the meantime.
    async fn merge_question_result(
        &self,
        evaluation_id: i64,
        evaluator_id: i64,
        question_id: i64,
        result: QuestionResult,
        audit: NewAuditEntry,
    ) -> Result<Option<Evaluation>>;

    async fn finalize_assessment(&self, command: FinalizeAssessment)
        -> Result<FinalizedAssessment>;

    async fn set_status(&self, change: StatusChange) -> Result<QuizAttempt>;

    /// Feedback left for the student on the quiz, latest first.
    async fn list_feedbacks(&self, quiz_id: i64, student_id: i64) -> Result<Vec<Feedback>>;

    async fn list_activity(&self, attempt_id: i64) -> Result<Vec<AuditLog>>;

    async fn find_user(&self, user_id: i64) -> Result<Option<User>>;

    async fn find_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>>;

    async fn attempt_context(&self, attempt: &QuizAttempt) -> Result<AttemptContext>;

    async fn list_latest_attempts(
        &self,
        filter: StatusFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AttemptSummary>, i64)>;

    async fn status_counts(&self) -> Result<StatusCounts>;
}
