use crate::dto::assessment_dto::{
    AssessmentDetail, AssessmentListItem, AssessmentPage, ListAssessmentsQuery,
};
use crate::error::{Error, Result};
use crate::models::actor::{Actor, Role};
use crate::models::audit_log::{AuditLog, NewAuditEntry};
use crate::models::evaluation::{EvaluationResults, NewEvaluation, QuestionResult};
use crate::models::quiz_attempt::QuizAttempt;
use crate::models::status::{AttemptStatus, Verdict};
use crate::services::assessment_display::{derive_marks, FinalAssessment};
use crate::services::store::{
    AssessmentStore, FinalizeAssessment, StatusChange, StatusCounts, StatusFilter,
};
use crate::utils::time::now;
use chrono::FixedOffset;
use serde_json::json;
use std::sync::Arc;

const ATTEMPT_KIND: &str = "quiz";

/// Verdict request for [`AssessmentService::submit_feedback`].
#[derive(Debug, Clone)]
pub struct FeedbackSubmission {
    pub verdict: Verdict,
    pub feedback: Option<String>,
    pub assisted: Option<bool>,
}

/// Drives the quiz-attempt assessment workflow on behalf of an explicit actor.
#[derive(Clone)]
pub struct AssessmentService {
    store: Arc<dyn AssessmentStore>,
    display_offset: FixedOffset,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn AssessmentStore>, display_offset: FixedOffset) -> Self {
        Self {
            store,
            display_offset,
        }
    }

    fn require_evaluator(actor: &Actor) -> Result<()> {
        if actor.role.is_evaluator() {
            Ok(())
        } else {
            tracing::warn!(actor_id = actor.id, role = %actor.role, "assessment action denied");
            Err(Error::Forbidden(format!(
                "Role '{}' may not assess quiz attempts",
                actor.role
            )))
        }
    }

    async fn load_attempt(&self, attempt_id: i64) -> Result<QuizAttempt> {
        self.store
            .find_attempt(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Assessment {} not found", attempt_id)))
    }

    /// Evaluators only act on the student's latest attempt once it has been submitted.
    async fn ensure_actionable(&self, attempt: &QuizAttempt) -> Result<()> {
        if !attempt.is_submitted() {
            return Err(Error::Validation(format!(
                "Assessment {} has not been submitted yet",
                attempt.id
            )));
        }
        let latest = self
            .store
            .latest_attempt_id(attempt.user_id, attempt.quiz_id)
            .await?;
        if latest != Some(attempt.id) {
            return Err(Error::Validation(format!(
                "Assessment {} has been superseded by a newer attempt",
                attempt.id
            )));
        }
        Ok(())
    }

    pub async fn list(&self, actor: &Actor, query: &ListAssessmentsQuery) -> Result<AssessmentPage> {
        Self::require_evaluator(actor)?;
        let filter = StatusFilter::parse(query.status.as_deref())?;
        let (limit, offset) = query.page();

        let (rows, total) = self
            .store
            .list_latest_attempts(filter, limit, offset)
            .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let last_final = row.assessed_at.map(|assessed_at| FinalAssessment {
                    evaluator_name: row.assessor_name.as_deref(),
                    assessed_at,
                });
                let marks = derive_marks(&row.attempt, last_final, self.display_offset);
                let attempt = row.attempt;
                AssessmentListItem {
                    id: attempt.id,
                    kind: ATTEMPT_KIND,
                    student_id: attempt.user_id,
                    student_name: row.student_name,
                    course_id: attempt.course_id,
                    course_title: row.course_title,
                    quiz_id: attempt.quiz_id,
                    status: attempt.status,
                    status_label: attempt.status.display_label(),
                    score: attempt.score,
                    system_result: attempt.system_result,
                    assessed_by: marks.assessed_by,
                    assessed_on: marks.assessed_on,
                    created_at: attempt.created_at,
                    updated_at: attempt.updated_at,
                }
            })
            .collect();

        Ok(AssessmentPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Reads an attempt. Evaluator roles may read any attempt, and opening a SUBMITTED one claims
    /// it for review. A Student may read only their own attempt and never claims it. Every other
    /// role is Forbidden.
    pub async fn view_attempt(&self, actor: &Actor, attempt_id: i64) -> Result<AssessmentDetail> {
        let mut attempt = self.load_attempt(attempt_id).await?;

        let evaluator = actor.role.is_evaluator();
        let own_attempt = actor.role == Role::Student && attempt.user_id == actor.id;
        if !evaluator && !own_attempt {
            return Err(Error::Forbidden(format!(
                "Assessment {} is not visible to this user",
                attempt_id
            )));
        }

        if evaluator && attempt.status == AttemptStatus::Submitted {
            let audit = NewAuditEntry::for_attempt(
                attempt.id,
                actor.id,
                "reviewing",
                "Assessment claimed for review",
                json!({ "from": AttemptStatus::Submitted, "to": AttemptStatus::Reviewing }),
            );
            match self.store.claim_for_review(attempt.id, audit).await? {
                Some(claimed) => {
                    tracing::info!(attempt_id = attempt.id, actor_id = actor.id, "assessment claimed for review");
                    attempt = claimed;
                }
                // Someone else claimed it first; show what is stored now.
                None => attempt = self.load_attempt(attempt_id).await?,
            }
        }

        let quiz = self
            .store
            .find_quiz(attempt.quiz_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Quiz {} not found", attempt.quiz_id)))?;
        let student = self.store.find_user(attempt.user_id).await?;
        let context = self.store.attempt_context(&attempt).await?;
        let evaluations = self.store.list_evaluations(attempt.id).await?;
        let feedbacks = self
            .store
            .list_feedbacks(attempt.quiz_id, attempt.user_id)
            .await?;

        let last_final = evaluations.iter().find(|e| !e.is_open());
        let evaluator_name = match last_final.and_then(|e| e.evaluator_id) {
            Some(evaluator_id) => self.store.find_user(evaluator_id).await?.map(|u| u.name),
            None => None,
        };
        let marks = derive_marks(
            &attempt,
            last_final.map(|e| FinalAssessment {
                evaluator_name: evaluator_name.as_deref(),
                assessed_at: e.updated_at,
            }),
            self.display_offset,
        );

        let questions = match quiz.questions {
            serde_json::Value::Array(items) => items,
            _ => Vec::new(),
        };

        Ok(AssessmentDetail {
            id: attempt.id,
            kind: ATTEMPT_KIND,
            student_id: attempt.user_id,
            student_name: student.map(|s| s.name),
            quiz_id: attempt.quiz_id,
            quiz_title: quiz.title,
            passing_percentage: quiz.passing_percentage,
            course_id: attempt.course_id,
            course_title: context.course_title,
            lesson_id: attempt.lesson_id,
            lesson_title: context.lesson_title,
            topic_id: attempt.topic_id,
            topic_title: context.topic_title,
            status: attempt.status,
            status_label: attempt.status.display_label(),
            system_result: attempt.system_result,
            score: attempt.score,
            assisted: attempt.assisted,
            submitted_at: attempt.submitted_at,
            accessed_at: attempt.accessed_at,
            accessor_id: attempt.accessor_id,
            assessed_by: marks.assessed_by,
            assessed_on: marks.assessed_on,
            questions,
            evaluations,
            feedbacks,
            created_at: attempt.created_at,
            updated_at: attempt.updated_at,
        })
    }

    /// Records one question's mark on the open evaluation, opening one when needed.
    /// Returns the evaluation id.
    pub async fn evaluate_question(
        &self,
        actor: &Actor,
        attempt_id: i64,
        question_id: i64,
        result: QuestionResult,
    ) -> Result<i64> {
        Self::require_evaluator(actor)?;
        let attempt = self.load_attempt(attempt_id).await?;
        self.ensure_actionable(&attempt).await?;

        let audit = NewAuditEntry::for_attempt(
            attempt.id,
            actor.id,
            "evaluated",
            format!("Question {} evaluated", question_id),
            json!({ "question_id": question_id, "status": result.status }),
        );

        let open = self
            .store
            .latest_evaluation(attempt.id)
            .await?
            .filter(|e| e.is_open());

        let evaluation = match open {
            Some(open) => self
                .store
                .merge_question_result(open.id, actor.id, question_id, result, audit)
                .await?
                .ok_or_else(|| {
                    Error::Conflict(format!(
                        "Evaluation {} was finalized while it was being edited",
                        open.id
                    ))
                })?,
            None => {
                let mut results = EvaluationResults::new();
                results.insert(question_id, result);
                self.store
                    .create_evaluation(
                        NewEvaluation {
                            quiz_attempt_id: attempt.id,
                            student_id: attempt.user_id,
                            evaluator_id: actor.id,
                            results,
                        },
                        audit,
                    )
                    .await?
            }
        };

        tracing::info!(
            attempt_id = attempt.id,
            evaluation_id = evaluation.id,
            question_id,
            actor_id = actor.id,
            "question evaluated"
        );
        Ok(evaluation.id)
    }

    /// Finalizes the assessment with a verdict, optional feedback and the assisted flag.
    pub async fn submit_feedback(
        &self,
        actor: &Actor,
        attempt_id: i64,
        submission: FeedbackSubmission,
    ) -> Result<QuizAttempt> {
        Self::require_evaluator(actor)?;
        let attempt = self.load_attempt(attempt_id).await?;
        self.ensure_actionable(&attempt).await?;

        let feedback = submission
            .feedback
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        let assisted = submission.assisted.unwrap_or(attempt.assisted);
        let status = AttemptStatus::from(submission.verdict);

        let audit = NewAuditEntry::for_attempt(
            attempt.id,
            actor.id,
            "marked",
            format!("Assessment marked {}", status.display_label()),
            json!({
                "from": attempt.status,
                "to": status,
                "assisted": assisted,
                "has_feedback": feedback.is_some(),
            }),
        );

        let outcome = self
            .store
            .finalize_assessment(FinalizeAssessment {
                attempt_id: attempt.id,
                expected_version: attempt.version,
                student_id: attempt.user_id,
                quiz_id: attempt.quiz_id,
                evaluator_id: actor.id,
                verdict: submission.verdict,
                feedback,
                assisted,
                accessed_at: now(),
                audit,
            })
            .await?;

        tracing::info!(
            attempt_id = attempt.id,
            evaluation_id = outcome.evaluation.id,
            status = %outcome.attempt.status,
            actor_id = actor.id,
            "assessment finalized"
        );
        Ok(outcome.attempt)
    }

    /// Hands the attempt back to the student. Evaluations and feedback stay as they are.
    pub async fn return_assessment(&self, actor: &Actor, attempt_id: i64) -> Result<QuizAttempt> {
        Self::require_evaluator(actor)?;
        let attempt = self.load_attempt(attempt_id).await?;
        self.ensure_actionable(&attempt).await?;

        let audit = NewAuditEntry::for_attempt(
            attempt.id,
            actor.id,
            "returned",
            "Assessment returned to student",
            json!({ "from": attempt.status, "to": AttemptStatus::Returned }),
        );
        let updated = self
            .store
            .set_status(StatusChange {
                attempt_id: attempt.id,
                expected_version: attempt.version,
                status: AttemptStatus::Returned,
                audit,
            })
            .await?;

        tracing::info!(attempt_id = attempt.id, actor_id = actor.id, "assessment returned");
        Ok(updated)
    }

    /// Administrative override of the stored status.
    pub async fn update_status(
        &self,
        actor: &Actor,
        attempt_id: i64,
        status: AttemptStatus,
    ) -> Result<QuizAttempt> {
        Self::require_evaluator(actor)?;
        let attempt = self.load_attempt(attempt_id).await?;

        let audit = NewAuditEntry::for_attempt(
            attempt.id,
            actor.id,
            "status_updated",
            format!("Assessment status set to {}", status),
            json!({ "from": attempt.status, "to": status }),
        );
        let updated = self
            .store
            .set_status(StatusChange {
                attempt_id: attempt.id,
                expected_version: attempt.version,
                status,
                audit,
            })
            .await?;

        tracing::info!(
            attempt_id = attempt.id,
            from = %attempt.status,
            to = %status,
            actor_id = actor.id,
            "assessment status overridden"
        );
        Ok(updated)
    }

    pub async fn activity(&self, actor: &Actor, attempt_id: i64) -> Result<Vec<AuditLog>> {
        Self::require_evaluator(actor)?;
        let attempt = self.load_attempt(attempt_id).await?;
        self.store.list_activity(attempt.id).await
    }

    pub async fn status_counts(&self, actor: &Actor) -> Result<StatusCounts> {
        Self::require_evaluator(actor)?;
        self.store.status_counts().await
    }
}
