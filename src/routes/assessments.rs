use crate::{
    dto::assessment_dto::{
        ActivityResponse, EvaluateQuestionPayload, EvaluateResponse, ListAssessmentsQuery,
        StatusResponse, SubmitFeedbackPayload, UpdateStatusPayload,
    },
    error::{Error, Result},
    extract::{Json, Path, Query},
    models::{
        actor::Actor,
        evaluation::QuestionResult,
        status::{AttemptStatus, Verdict},
    },
    services::assessment_service::FeedbackSubmission,
    AppState,
};
use axum::{extract::State, response::IntoResponse};
use validator::Validate;

fn parse_verdict(raw: Option<&str>) -> Result<Verdict> {
    let raw = raw.ok_or_else(|| Error::Validation("status is required".to_string()))?;
    Verdict::parse_lenient(raw).map_err(|e| Error::Validation(e.to_string()))
}

pub async fn list_assessments(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListAssessmentsQuery>,
) -> Result<impl IntoResponse> {
    let page = state.assessment_service.list(&actor, &query).await?;
    Ok(Json(page))
}

pub async fn get_assessment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let detail = state.assessment_service.view_attempt(&actor, id).await?;
    Ok(Json(detail))
}

pub async fn get_assessment_activity(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let items = state.assessment_service.activity(&actor, id).await?;
    Ok(Json(ActivityResponse { items }))
}

pub async fn get_status_counts(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse> {
    let counts = state.assessment_service.status_counts(&actor).await?;
    Ok(Json(counts))
}

pub async fn evaluate_question(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(payload): Json<EvaluateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question_id = payload
        .question
        .ok_or_else(|| Error::Validation("question is required".to_string()))?;
    let result = QuestionResult {
        status: parse_verdict(payload.status.as_deref())?,
        comment: payload.comment.unwrap_or_default(),
    };

    let evaluation_id = state
        .assessment_service
        .evaluate_question(&actor, id, question_id, result)
        .await?;
    Ok(Json(EvaluateResponse {
        evaluation_id,
        message: "Question evaluated".to_string(),
    }))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitFeedbackPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let submission = FeedbackSubmission {
        verdict: parse_verdict(payload.status.as_deref())?,
        feedback: payload.feedback,
        assisted: payload.assisted,
    };

    let attempt = state
        .assessment_service
        .submit_feedback(&actor, id, submission)
        .await?;
    Ok(Json(StatusResponse {
        id: attempt.id,
        status: attempt.status,
        message: "Assessment submitted".to_string(),
    }))
}

pub async fn return_assessment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .assessment_service
        .return_assessment(&actor, id)
        .await?;
    Ok(Json(StatusResponse {
        id: attempt.id,
        status: attempt.status,
        message: "Assessment returned to student".to_string(),
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let status = payload
        .status
        .as_deref()
        .ok_or_else(|| Error::Validation("status is required".to_string()))?
        .parse::<AttemptStatus>()
        .map_err(|e| Error::Validation(e.to_string()))?;

    let attempt = state
        .assessment_service
        .update_status(&actor, id, status)
        .await?;
    Ok(Json(StatusResponse {
        id: attempt.id,
        status: attempt.status,
        message: "Assessment status updated".to_string(),
    }))
}
