use crate::error::{Error, Result};
use crate::models::audit_log::{AuditLog, NewAuditEntry, QUIZ_ATTEMPT_SUBJECT};
use crate::models::evaluation::{Evaluation, NewEvaluation, QuestionResult};
use crate::models::feedback::{Feedback, FeedbackBody, QUIZ_ATTACHABLE};
use crate::models::quiz::{AttemptContext, Quiz};
use crate::models::quiz_attempt::{AttemptSummary, QuizAttempt};
use crate::models::status::AttemptStatus;
use crate::models::user::User;
use crate::services::audit_service::{self, AuditService};
use crate::services::store::{
    AssessmentStore, FinalizeAssessment, FinalizedAssessment, StatusChange, StatusCounts,
    StatusFilter,
};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

/// Latest attempt per (student, quiz).
const LATEST_ATTEMPTS: &str = r#"
    WITH latest AS (
        SELECT DISTINCT ON (qa.user_id, qa.quiz_id) qa.*
        FROM quiz_attempts qa
        ORDER BY qa.user_id, qa.quiz_id, qa.created_at DESC, qa.id DESC
    )
"#;

/// `$1` exact status or NULL, `$2` pending only.
const LATEST_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR latest.status = $1)
      AND (NOT $2 OR (
            latest.submitted_at IS NOT NULL
        AND latest.system_result NOT IN ('EVALUATED', 'MARKED', 'INPROGRESS')
        AND latest.status IN ('SUBMITTED', 'REVIEWING')
      ))
"#;

#[derive(Clone)]
pub struct PgAssessmentStore {
    pool: PgPool,
    audit: AuditService,
}

impl PgAssessmentStore {
    pub fn new(pool: PgPool) -> Self {
        let audit = AuditService::new(pool.clone());
        Self { pool, audit }
    }

    fn stale(attempt_id: i64) -> Error {
        Error::Conflict(format!(
            "Assessment {} was changed by someone else, reload and try again",
            attempt_id
        ))
    }
}

#[async_trait]
impl AssessmentStore for PgAssessmentStore {
    async fn find_attempt(&self, attempt_id: i64) -> Result<Option<QuizAttempt>> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(r#"SELECT * FROM quiz_attempts WHERE id = $1"#)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attempt)
    }

    async fn latest_attempt_id(&self, user_id: i64, quiz_id: i64) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM quiz_attempts
            WHERE user_id = $1 AND quiz_id = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn claim_for_review(
        &self,
        attempt_id: i64,
        audit: NewAuditEntry,
    ) -> Result<Option<QuizAttempt>> {
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET status = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(AttemptStatus::Reviewing)
        .bind(AttemptStatus::Submitted)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_some() {
            audit_service::record(&mut *tx, &audit).await?;
        }
        tx.commit().await?;
        Ok(claimed)
    }

    async fn latest_evaluation(&self, attempt_id: i64) -> Result<Option<Evaluation>> {
        let evaluation = sqlx::query_as::<_, Evaluation>(
            r#"
            SELECT * FROM evaluations
            WHERE quiz_attempt_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(evaluation)
    }

    async fn list_evaluations(&self, attempt_id: i64) -> Result<Vec<Evaluation>> {
        let rows = sqlx::query_as::<_, Evaluation>(
            r#"
            SELECT * FROM evaluations
            WHERE quiz_attempt_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_evaluation(
        &self,
        evaluation: NewEvaluation,
        audit: NewAuditEntry,
    ) -> Result<Evaluation> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, Evaluation>(
            r#"
            INSERT INTO evaluations (quiz_attempt_id, student_id, evaluator_id, results)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(evaluation.quiz_attempt_id)
        .bind(evaluation.student_id)
        .bind(evaluation.evaluator_id)
        .bind(Json(&evaluation.results))
        .fetch_one(&mut *tx)
        .await?;

        let mut audit = audit;
        audit.properties["evaluation_id"] = created.id.into();
        audit_service::record(&mut *tx, &audit).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn merge_question_result(
        &self,
        evaluation_id: i64,
        evaluator_id: i64,
        question_id: i64,
        result: QuestionResult,
        audit: NewAuditEntry,
    ) -> Result<Option<Evaluation>> {
        let mut tx = self.pool.begin().await?;
        let merged = sqlx::query_as::<_, Evaluation>(
            r#"
            UPDATE evaluations
            SET results = results || jsonb_build_object($2::text, $3::jsonb),
                evaluator_id = $4,
                updated_at = NOW()
            WHERE id = $1 AND status IS NULL
            RETURNING *
            "#,
        )
        .bind(evaluation_id)
        .bind(question_id.to_string())
        .bind(Json(&result))
        .bind(evaluator_id)
        .fetch_optional(&mut *tx)
        .await?;

        if merged.is_some() {
            audit_service::record(&mut *tx, &audit).await?;
        }
        tx.commit().await?;
        Ok(merged)
    }

    async fn finalize_assessment(
        &self,
        command: FinalizeAssessment,
    ) -> Result<FinalizedAssessment> {
        let mut tx = self.pool.begin().await?;

        // The attempt row goes first so racing finalizations queue behind its lock.
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET status = $2,
                assisted = $3,
                accessed_at = $4,
                accessor_id = $5,
                is_valid_accessor = TRUE,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $6
            RETURNING *
            "#,
        )
        .bind(command.attempt_id)
        .bind(AttemptStatus::from(command.verdict))
        .bind(command.assisted)
        .bind(command.accessed_at)
        .bind(command.evaluator_id)
        .bind(command.expected_version)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Self::stale(command.attempt_id))?;

        let finalized = sqlx::query_as::<_, Evaluation>(
            r#"
            UPDATE evaluations
            SET status = $2, evaluator_id = $3, updated_at = NOW()
            WHERE id = (
                SELECT id FROM evaluations
                WHERE quiz_attempt_id = $1 AND status IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(command.attempt_id)
        .bind(command.verdict)
        .bind(command.evaluator_id)
        .fetch_optional(&mut *tx)
        .await?;

        let evaluation = match finalized {
            Some(evaluation) => evaluation,
            None => {
                sqlx::query_as::<_, Evaluation>(
                    r#"
                    INSERT INTO evaluations (quiz_attempt_id, student_id, evaluator_id, results, status)
                    VALUES ($1, $2, $3, '{}'::jsonb, $4)
                    RETURNING *
                    "#,
                )
                .bind(command.attempt_id)
                .bind(command.student_id)
                .bind(command.evaluator_id)
                .bind(command.verdict)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let feedback = match command.feedback {
            Some(message) => {
                let body = FeedbackBody {
                    message,
                    evaluation_id: evaluation.id,
                    attempt_id: command.attempt_id,
                };
                let row = sqlx::query_as::<_, Feedback>(
                    r#"
                    INSERT INTO feedbacks (attachable_type, attachable_id, user_id, owner_id, body)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(QUIZ_ATTACHABLE)
                .bind(command.quiz_id)
                .bind(command.student_id)
                .bind(command.evaluator_id)
                .bind(Json(&body))
                .fetch_one(&mut *tx)
                .await?;
                Some(row)
            }
            None => None,
        };

        let mut audit = command.audit;
        audit.properties["evaluation_id"] = evaluation.id.into();
        if let Some(feedback) = &feedback {
            audit.properties["feedback_id"] = feedback.id.into();
        }
        audit_service::record(&mut *tx, &audit).await?;

        tx.commit().await?;
        Ok(FinalizedAssessment {
            attempt,
            evaluation,
            feedback,
        })
    }

    async fn set_status(&self, change: StatusChange) -> Result<QuizAttempt> {
        let mut tx = self.pool.begin().await?;
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET status = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $3
            RETURNING *
            "#,
        )
        .bind(change.attempt_id)
        .bind(change.status)
        .bind(change.expected_version)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Self::stale(change.attempt_id))?;

        audit_service::record(&mut *tx, &change.audit).await?;
        tx.commit().await?;
        Ok(attempt)
    }

    async fn list_feedbacks(&self, quiz_id: i64, student_id: i64) -> Result<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, Feedback>(
            r#"
            SELECT * FROM feedbacks
            WHERE attachable_type = $1 AND attachable_id = $2 AND user_id = $3
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(QUIZ_ATTACHABLE)
        .bind(quiz_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_activity(&self, attempt_id: i64) -> Result<Vec<AuditLog>> {
        self.audit.for_subject(QUIZ_ATTEMPT_SUBJECT, attempt_id).await
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT id, name, email, role FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"SELECT id, title, questions, passing_percentage FROM quizzes WHERE id = $1"#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn attempt_context(&self, attempt: &QuizAttempt) -> Result<AttemptContext> {
        let context = sqlx::query_as::<_, AttemptContext>(
            r#"
            SELECT
                (SELECT title FROM courses WHERE id = $1) AS course_title,
                (SELECT title FROM lessons WHERE id = $2) AS lesson_title,
                (SELECT title FROM topics WHERE id = $3) AS topic_title
            "#,
        )
        .bind(attempt.course_id)
        .bind(attempt.lesson_id)
        .bind(attempt.topic_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(context)
    }

    async fn list_latest_attempts(
        &self,
        filter: StatusFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AttemptSummary>, i64)> {
        let exact = filter.exact_status().map(|s| s.as_str());
        let pending = filter == StatusFilter::Pending;

        let rows_sql = format!(
            r#"
            {LATEST_ATTEMPTS}
            SELECT latest.*,
                   u.name AS student_name,
                   c.title AS course_title,
                   ev.name AS assessor_name,
                   fe.updated_at AS assessed_at
            FROM latest
            LEFT JOIN users u ON u.id = latest.user_id
            LEFT JOIN courses c ON c.id = latest.course_id
            LEFT JOIN LATERAL (
                SELECT e.evaluator_id, e.updated_at
                FROM evaluations e
                WHERE e.quiz_attempt_id = latest.id AND e.status IS NOT NULL
                ORDER BY e.created_at DESC, e.id DESC
                LIMIT 1
            ) fe ON TRUE
            LEFT JOIN users ev ON ev.id = fe.evaluator_id
            {LATEST_FILTER}
            ORDER BY latest.updated_at DESC, latest.id DESC
            LIMIT $3 OFFSET $4
            "#
        );
        let rows = sqlx::query_as::<_, AttemptSummary>(&rows_sql)
            .bind(exact)
            .bind(pending)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("{LATEST_ATTEMPTS} SELECT COUNT(*) FROM latest {LATEST_FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(exact)
            .bind(pending)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let grouped_sql = format!(
            "{LATEST_ATTEMPTS} SELECT latest.status, COUNT(*) FROM latest GROUP BY latest.status"
        );
        let grouped = sqlx::query_as::<_, (String, i64)>(&grouped_sql)
            .fetch_all(&self.pool)
            .await?;

        let pending_sql = format!("{LATEST_ATTEMPTS} SELECT COUNT(*) FROM latest {LATEST_FILTER}");
        let pending = sqlx::query_scalar::<_, i64>(&pending_sql)
            .bind(None::<&str>)
            .bind(true)
            .fetch_one(&self.pool)
            .await?;

        Ok(StatusCounts {
            counts: grouped.into_iter().collect(),
            pending,
        })
    }
}
