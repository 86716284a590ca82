#![allow(dead_code)]

use assessment_backend::error::{Error, Result};
use assessment_backend::models::actor::{Actor, Role};
use assessment_backend::models::audit_log::{AuditLog, NewAuditEntry};
use assessment_backend::models::evaluation::{Evaluation, NewEvaluation, QuestionResult};
use assessment_backend::models::feedback::{Feedback, FeedbackBody, QUIZ_ATTACHABLE};
use assessment_backend::models::quiz::{AttemptContext, Quiz};
use assessment_backend::models::quiz_attempt::{AttemptSummary, QuizAttempt};
use assessment_backend::models::status::{AttemptStatus, SystemResult};
use assessment_backend::models::user::User;
use assessment_backend::services::assessment_service::AssessmentService;
use assessment_backend::services::store::{
    AssessmentStore, FinalizeAssessment, FinalizedAssessment, StatusChange, StatusCounts,
    StatusFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde_json::json;
use sqlx::types::Json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const TRAINER_ID: i64 = 900;
pub const ADMIN_ID: i64 = 901;
pub const STUDENT_ID: i64 = 10;
pub const OTHER_STUDENT_ID: i64 = 11;
pub const QUIZ_ID: i64 = 3;
pub const COURSE_ID: i64 = 1;

type Interleave = Box<dyn FnOnce(&mut Inner) + Send>;

#[derive(Default)]
pub struct Inner {
    pub tick: i64,
    pub next_id: i64,
    pub attempts: BTreeMap<i64, QuizAttempt>,
    pub evaluations: Vec<Evaluation>,
    pub feedbacks: Vec<Feedback>,
    pub audit: Vec<AuditLog>,
    pub users: BTreeMap<i64, User>,
    pub quizzes: BTreeMap<i64, Quiz>,
    pub courses: BTreeMap<i64, String>,
}

impl Inner {
    fn now(&mut self) -> DateTime<Utc> {
        self.tick += 1;
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap() + Duration::seconds(self.tick)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_audit(&mut self, entry: NewAuditEntry) {
        let id = self.next_id();
        let created_at = self.now();
        self.audit.push(AuditLog {
            id,
            log_name: entry.log_name,
            description: entry.description,
            subject_type: entry.subject_type,
            subject_id: entry.subject_id,
            causer_id: entry.causer_id,
            event: entry.event,
            properties: entry.properties,
            created_at,
        });
    }

    fn latest_evaluation(&self, attempt_id: i64) -> Option<&Evaluation> {
        self.evaluations
            .iter()
            .filter(|e| e.quiz_attempt_id == attempt_id)
            .max_by_key(|e| (e.created_at, e.id))
    }

    fn latest_attempts(&self) -> Vec<QuizAttempt> {
        let mut latest: BTreeMap<(i64, i64), &QuizAttempt> = BTreeMap::new();
        for attempt in self.attempts.values() {
            let key = (attempt.user_id, attempt.quiz_id);
            let newer = latest.get(&key).map_or(true, |current| {
                (current.created_at, current.id) < (attempt.created_at, attempt.id)
            });
            if newer {
                latest.insert(key, attempt);
            }
        }
        latest.into_values().cloned().collect()
    }
}

fn matches_filter(attempt: &QuizAttempt, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Exact(status) => attempt.status == status,
        StatusFilter::Pending => {
            attempt.submitted_at.is_some()
                && !matches!(
                    attempt.system_result,
                    SystemResult::Evaluated | SystemResult::Marked | SystemResult::Inprogress
                )
                && attempt.status.awaits_verdict()
        }
    }
}

/// In-memory [`AssessmentStore`] with the same per-call atomicity as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    pub inner: Mutex<Inner>,
    interleave: Mutex<Option<Interleave>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.next_id = 1000;
            for (id, name, role) in [
                (TRAINER_ID, "Dana Trainer", "Trainer"),
                (ADMIN_ID, "Ari Admin", "Admin"),
                (STUDENT_ID, "Sam Student", "Student"),
                (OTHER_STUDENT_ID, "Kim Student", "Student"),
            ] {
                inner.users.insert(
                    id,
                    User {
                        id,
                        name: name.to_string(),
                        email: format!("{}@lms.test", id),
                        role: role.to_string(),
                    },
                );
            }
            inner.quizzes.insert(
                QUIZ_ID,
                Quiz {
                    id: QUIZ_ID,
                    title: "Workplace Safety".to_string(),
                    questions: json!([
                        { "id": 1, "question": "Name two hazards." },
                        { "id": 2, "question": "Describe the evacuation route." }
                    ]),
                    passing_percentage: Some(rust_decimal::Decimal::new(80, 0)),
                },
            );
            inner.courses.insert(COURSE_ID, "Certificate III".to_string());
        }
        store
    }

    /// Stores a submitted attempt with an explicit id.
    pub fn submitted_attempt(&self, id: i64, user_id: i64) -> QuizAttempt {
        self.insert_attempt(id, user_id, AttemptStatus::Submitted, SystemResult::Completed)
    }

    pub fn insert_attempt(
        &self,
        id: i64,
        user_id: i64,
        status: AttemptStatus,
        system_result: SystemResult,
    ) -> QuizAttempt {
        let mut inner = self.inner.lock().unwrap();
        let at = inner.now();
        let attempt = QuizAttempt {
            id,
            user_id,
            quiz_id: QUIZ_ID,
            course_id: COURSE_ID,
            lesson_id: None,
            topic_id: None,
            status,
            system_result,
            score: None,
            submitted_at: (status != AttemptStatus::Attempting).then_some(at),
            accessed_at: None,
            accessor_id: None,
            is_valid_accessor: false,
            assisted: false,
            version: 0,
            created_at: at,
            updated_at: at,
        };
        inner.attempts.insert(id, attempt.clone());
        attempt
    }

    pub fn update_attempt(&self, id: i64, change: impl FnOnce(&mut QuizAttempt)) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(&id) {
            change(attempt);
        }
    }

    pub fn attempt(&self, id: i64) -> QuizAttempt {
        self.inner.lock().unwrap().attempts[&id].clone()
    }

    pub fn evaluations_for(&self, attempt_id: i64) -> Vec<Evaluation> {
        let inner = self.inner.lock().unwrap();
        inner
            .evaluations
            .iter()
            .filter(|e| e.quiz_attempt_id == attempt_id)
            .cloned()
            .collect()
    }

    pub fn evaluation(&self, id: i64) -> Evaluation {
        let inner = self.inner.lock().unwrap();
        inner.evaluations.iter().find(|e| e.id == id).cloned().unwrap()
    }

    pub fn feedbacks(&self) -> Vec<Feedback> {
        self.inner.lock().unwrap().feedbacks.clone()
    }

    pub fn audit_events(&self, attempt_id: i64) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .audit
            .iter()
            .filter(|a| a.subject_id == attempt_id)
            .map(|a| a.event.clone())
            .collect()
    }

    /// Runs `change` inside the next finalization, before its version check, the way a
    /// concurrent writer would.
    pub fn interleave_next_finalize(&self, change: impl FnOnce(&mut Inner) + Send + 'static) {
        *self.interleave.lock().unwrap() = Some(Box::new(change));
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn find_attempt(&self, attempt_id: i64) -> Result<Option<QuizAttempt>> {
        Ok(self.inner.lock().unwrap().attempts.get(&attempt_id).cloned())
    }

    async fn latest_attempt_id(&self, user_id: i64, quiz_id: i64) -> Result<Option<i64>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quiz_id == quiz_id)
            .max_by_key(|a| (a.created_at, a.id))
            .map(|a| a.id))
    }

    async fn claim_for_review(
        &self,
        attempt_id: i64,
        audit: NewAuditEntry,
    ) -> Result<Option<QuizAttempt>> {
        let mut inner = self.inner.lock().unwrap();
        let at = inner.now();
        let claimed = match inner.attempts.get_mut(&attempt_id) {
            Some(attempt) if attempt.status == AttemptStatus::Submitted => {
                attempt.status = AttemptStatus::Reviewing;
                attempt.version += 1;
                attempt.updated_at = at;
                Some(attempt.clone())
            }
            _ => None,
        };
        if claimed.is_some() {
            inner.push_audit(audit);
        }
        Ok(claimed)
    }

    async fn latest_evaluation(&self, attempt_id: i64) -> Result<Option<Evaluation>> {
        Ok(self.inner.lock().unwrap().latest_evaluation(attempt_id).cloned())
    }

    async fn list_evaluations(&self, attempt_id: i64) -> Result<Vec<Evaluation>> {
        let mut rows = self.evaluations_for(attempt_id);
        rows.sort_by_key(|e| std::cmp::Reverse((e.created_at, e.id)));
        Ok(rows)
    }

    async fn create_evaluation(
        &self,
        evaluation: NewEvaluation,
        audit: NewAuditEntry,
    ) -> Result<Evaluation> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .evaluations
            .iter()
            .any(|e| e.quiz_attempt_id == evaluation.quiz_attempt_id && e.is_open())
        {
            return Err(Error::Conflict("Concurrent modification detected".to_string()));
        }
        let id = inner.next_id();
        let at = inner.now();
        let created = Evaluation {
            id,
            quiz_attempt_id: evaluation.quiz_attempt_id,
            student_id: evaluation.student_id,
            evaluator_id: Some(evaluation.evaluator_id),
            results: Json(evaluation.results),
            status: None,
            created_at: at,
            updated_at: at,
        };
        inner.evaluations.push(created.clone());
        let mut audit = audit;
        audit.properties["evaluation_id"] = id.into();
        inner.push_audit(audit);
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
        let mut inner = self.inner.lock().unwrap();
        let at = inner.now();
        let merged = match inner
            .evaluations
            .iter_mut()
            .find(|e| e.id == evaluation_id && e.is_open())
        {
            Some(evaluation) => {
                evaluation.results.0.insert(question_id, result);
                evaluation.evaluator_id = Some(evaluator_id);
                evaluation.updated_at = at;
                Some(evaluation.clone())
            }
            None => None,
        };
        if merged.is_some() {
            inner.push_audit(audit);
        }
        Ok(merged)
    }

    async fn finalize_assessment(
        &self,
        command: FinalizeAssessment,
    ) -> Result<FinalizedAssessment> {
        let interleave = self.interleave.lock().unwrap().take();
        let mut inner = self.inner.lock().unwrap();
        if let Some(change) = interleave {
            change(&mut *inner);
        }

        let current = inner
            .attempts
            .get(&command.attempt_id)
            .ok_or_else(|| Error::NotFound("Resource not found".to_string()))?;
        if current.version != command.expected_version {
            return Err(Error::Conflict("Assessment was changed by someone else".to_string()));
        }

        let at = inner.now();
        let attempt = {
            let attempt = inner.attempts.get_mut(&command.attempt_id).unwrap();
            attempt.status = command.verdict.into();
            attempt.assisted = command.assisted;
            attempt.accessed_at = Some(command.accessed_at);
            attempt.accessor_id = Some(command.evaluator_id);
            attempt.is_valid_accessor = true;
            attempt.version += 1;
            attempt.updated_at = at;
            attempt.clone()
        };

        let open_id = inner
            .evaluations
            .iter()
            .filter(|e| e.quiz_attempt_id == command.attempt_id && e.is_open())
            .max_by_key(|e| (e.created_at, e.id))
            .map(|e| e.id);
        let evaluation = match open_id {
            Some(id) => {
                let evaluation = inner.evaluations.iter_mut().find(|e| e.id == id).unwrap();
                evaluation.status = Some(command.verdict);
                evaluation.evaluator_id = Some(command.evaluator_id);
                evaluation.updated_at = at;
                evaluation.clone()
            }
            None => {
                let id = inner.next_id();
                let created = Evaluation {
                    id,
                    quiz_attempt_id: command.attempt_id,
                    student_id: command.student_id,
                    evaluator_id: Some(command.evaluator_id),
                    results: Json(BTreeMap::new()),
                    status: Some(command.verdict),
                    created_at: at,
                    updated_at: at,
                };
                inner.evaluations.push(created.clone());
                created
            }
        };

        let feedback = match command.feedback {
            Some(message) => {
                let id = inner.next_id();
                let row = Feedback {
                    id,
                    attachable_type: QUIZ_ATTACHABLE.to_string(),
                    attachable_id: command.quiz_id,
                    user_id: command.student_id,
                    owner_id: command.evaluator_id,
                    body: Json(FeedbackBody {
                        message,
                        evaluation_id: evaluation.id,
                        attempt_id: command.attempt_id,
                    }),
                    created_at: at,
                    updated_at: at,
                };
                inner.feedbacks.push(row.clone());
                Some(row)
            }
            None => None,
        };

        let mut audit = command.audit;
        audit.properties["evaluation_id"] = evaluation.id.into();
        inner.push_audit(audit);

        Ok(FinalizedAssessment {
            attempt,
            evaluation,
            feedback,
        })
    }

    async fn set_status(&self, change: StatusChange) -> Result<QuizAttempt> {
        let mut inner = self.inner.lock().unwrap();
        let at = inner.now();
        let attempt = inner
            .attempts
            .get_mut(&change.attempt_id)
            .ok_or_else(|| Error::NotFound("Resource not found".to_string()))?;
        if attempt.version != change.expected_version {
            return Err(Error::Conflict("Assessment was changed by someone else".to_string()));
        }
        attempt.status = change.status;
        attempt.version += 1;
        attempt.updated_at = at;
        let updated = attempt.clone();
        inner.push_audit(change.audit);
        Ok(updated)
    }

    async fn list_feedbacks(&self, quiz_id: i64, student_id: i64) -> Result<Vec<Feedback>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Feedback> = inner
            .feedbacks
            .iter()
            .filter(|f| f.attachable_id == quiz_id && f.user_id == student_id)
            .cloned()
            .collect();
        rows.sort_by_key(|f| std::cmp::Reverse((f.created_at, f.id)));
        Ok(rows)
    }

    async fn list_activity(&self, attempt_id: i64) -> Result<Vec<AuditLog>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<AuditLog> = inner
            .audit
            .iter()
            .filter(|a| a.subject_id == attempt_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
        Ok(rows)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn find_quiz(&self, quiz_id: i64) -> Result<Option<Quiz>> {
        Ok(self.inner.lock().unwrap().quizzes.get(&quiz_id).cloned())
    }

    async fn attempt_context(&self, attempt: &QuizAttempt) -> Result<AttemptContext> {
        let inner = self.inner.lock().unwrap();
        Ok(AttemptContext {
            course_title: inner.courses.get(&attempt.course_id).cloned(),
            lesson_title: None,
            topic_title: None,
        })
    }

    async fn list_latest_attempts(
        &self,
        filter: StatusFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AttemptSummary>, i64)> {
        let inner = self.inner.lock().unwrap();
        let mut latest: Vec<QuizAttempt> = inner
            .latest_attempts()
            .into_iter()
            .filter(|a| matches_filter(a, filter))
            .collect();
        latest.sort_by_key(|a| std::cmp::Reverse((a.updated_at, a.id)));
        let total = latest.len() as i64;

        let rows = latest
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|attempt| {
                let last_final = inner
                    .evaluations
                    .iter()
                    .filter(|e| e.quiz_attempt_id == attempt.id && !e.is_open())
                    .max_by_key(|e| (e.created_at, e.id));
                let assessor_name = last_final
                    .and_then(|e| e.evaluator_id)
                    .and_then(|id| inner.users.get(&id))
                    .map(|u| u.name.clone());
                AttemptSummary {
                    student_name: inner.users.get(&attempt.user_id).map(|u| u.name.clone()),
                    course_title: inner.courses.get(&attempt.course_id).cloned(),
                    assessor_name,
                    assessed_at: last_final.map(|e| e.updated_at),
                    attempt,
                }
            })
            .collect();
        Ok((rows, total))
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = StatusCounts::default();
        for attempt in inner.latest_attempts() {
            *counts
                .counts
                .entry(attempt.status.as_str().to_string())
                .or_insert(0) += 1;
            if matches_filter(&attempt, StatusFilter::Pending) {
                counts.pending += 1;
            }
        }
        Ok(counts)
    }
}

pub fn trainer() -> Actor {
    Actor::new(TRAINER_ID, Role::Trainer)
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, Role::Admin)
}

pub fn student() -> Actor {
    Actor::new(STUDENT_ID, Role::Student)
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub fn service(store: &Arc<MemoryStore>) -> AssessmentService {
    AssessmentService::new(store.clone(), utc())
}
