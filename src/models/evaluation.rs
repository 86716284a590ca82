use super::status::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub status: Verdict,
    #[serde(default)]
    pub comment: String,
}

pub type EvaluationResults = BTreeMap<i64, QuestionResult>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Evaluation {
    pub id: i64,
    pub quiz_attempt_id: i64,
    pub student_id: i64,
    pub evaluator_id: Option<i64>,
    pub results: Json<EvaluationResults>,
    pub status: Option<Verdict>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    /// Open evaluations still accept per-question marks.
    pub fn is_open(&self) -> bool {
        self.status.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub quiz_attempt_id: i64,
    pub student_id: i64,
    pub evaluator_id: i64,
    pub results: EvaluationResults,
}
