use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

pub const QUIZ_ATTACHABLE: &str = "quiz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackBody {
    pub message: String,
    pub evaluation_id: i64,
    pub attempt_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: i64,
    pub attachable_type: String,
    pub attachable_id: i64,
    pub user_id: i64,
    pub owner_id: i64,
    pub body: Json<FeedbackBody>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
