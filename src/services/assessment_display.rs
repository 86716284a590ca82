//! "Assessed by" / "assessed on" values shown next to an attempt.

use crate::models::quiz_attempt::QuizAttempt;
use crate::models::status::SystemResult;
use crate::utils::time::to_display;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

pub const AUTO_COMPETENT: &str = "Auto Competent";
pub const SYSTEM_AUTO_COMPETENT: &str = "System/Auto Competent";
pub const NOT_ASSESSED: &str = "Not assessed yet.";
pub const UNKNOWN_ASSESSOR: &str = "N/A";

/// The latest finalized evaluation of an attempt, reduced to what the labels need.
#[derive(Debug, Clone, Copy)]
pub struct FinalAssessment<'a> {
    pub evaluator_name: Option<&'a str>,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentMarks {
    pub assessed_by: String,
    pub assessed_on: String,
}

pub fn derive_marks(
    attempt: &QuizAttempt,
    last_final: Option<FinalAssessment<'_>>,
    offset: FixedOffset,
) -> AssessmentMarks {
    if attempt.system_result == SystemResult::Evaluated {
        return AssessmentMarks {
            assessed_by: AUTO_COMPETENT.to_string(),
            assessed_on: AUTO_COMPETENT.to_string(),
        };
    }
    if attempt.marked_by_student() {
        return AssessmentMarks {
            assessed_by: SYSTEM_AUTO_COMPETENT.to_string(),
            assessed_on: AUTO_COMPETENT.to_string(),
        };
    }

    match last_final {
        Some(done) => AssessmentMarks {
            assessed_by: done
                .evaluator_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(UNKNOWN_ASSESSOR)
                .to_string(),
            assessed_on: to_display(done.assessed_at, offset),
        },
        None => AssessmentMarks {
            assessed_by: NOT_ASSESSED.to_string(),
            assessed_on: NOT_ASSESSED.to_string(),
        },
    }
}
