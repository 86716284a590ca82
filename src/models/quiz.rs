use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub questions: JsonValue,
    pub passing_percentage: Option<rust_decimal::Decimal>,
}

/// Titles of the course, lesson and topic an attempt belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct AttemptContext {
    pub course_title: Option<String>,
    pub lesson_title: Option<String>,
    pub topic_title: Option<String>,
}
