use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::pagination::{self, default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::models::{AnswerEvaluation, QaPair};
use crate::db::types::{ApplicationStatus, Department};
use crate::repositories;
use crate::schemas::application::{ApplicationDetailResponse, ApplicationResponse};
use crate::schemas::evaluation::{
    EvaluationResponse, RatingInput, SubmitEvaluationRequest, SubmitEvaluationResponse,
};
use crate::services::evaluation::{
    self, EvaluationError, EvaluationStore, PgEvaluationStore, Submission,
};
use crate::services::scoring::{Rating, RatingSheet, ScoringError};

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationListQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    department: Option<Department>,
    #[serde(default)]
    submitted: Option<bool>,
    #[serde(default)]
    status: Option<ApplicationStatus>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications))
        .route("/:application_id", get(get_application))
        .route("/:application_id/evaluations", get(list_evaluations).post(submit_evaluation))
}

async fn list_applications(
    Query(params): Query<ApplicationListQuery>,
    CurrentStaff(_staff): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<ApplicationResponse>>, ApiError> {
    let (skip, limit) = pagination::normalize(params.skip, params.limit);
    let filter = repositories::applications::ApplicationFilter {
        department: params.department,
        submitted: params.submitted,
        status: params.status,
    };

    let total_count = repositories::applications::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count applications"))?;
    let rows = repositories::applications::list(state.db(), &filter, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list applications"))?;

    Ok(Json(PaginatedResponse {
        items: rows.into_iter().map(ApplicationResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn get_application(
    Path(application_id): Path<String>,
    CurrentStaff(_staff): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<ApplicationDetailResponse>, ApiError> {
    let application = repositories::applications::find_with_applicant(state.db(), &application_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch application"))?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    let pairs = repositories::answers::list_qa_pairs(state.db(), &application_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load application answers"))?;

    Ok(Json(ApplicationDetailResponse {
        application: ApplicationResponse::from_db(application),
        qa_pairs: pairs.into_iter().map(Into::into).collect(),
    }))
}

async fn submit_evaluation(
    Path(application_id): Path<String>,
    CurrentStaff(evaluator): CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<SubmitEvaluationRequest>,
) -> Result<(StatusCode, Json<SubmitEvaluationResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let store = PgEvaluationStore::new(state.db().clone());
    let pairs = store.fetch_pairs(&application_id).await?;
    let sheet = rating_sheet(&pairs, &payload.ratings).map_err(EvaluationError::from)?;

    let submitted = evaluation::submit(
        &store,
        Submission {
            application_id: &application_id,
            evaluator_id: &evaluator.id,
            pairs: &pairs,
            sheet: &sheet,
            policy: state.settings().evaluation().duplicate_policy,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitEvaluationResponse::new(submitted.evaluation_id, &submitted.breakdown)),
    ))
}

async fn list_evaluations(
    Path(application_id): Path<String>,
    CurrentStaff(_staff): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<Vec<EvaluationResponse>>, ApiError> {
    let exists = repositories::applications::exists(state.db(), &application_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch application"))?;
    if !exists {
        return Err(ApiError::NotFound("Application not found".to_string()));
    }

    let evaluations =
        repositories::evaluations::list_by_application(state.db(), &application_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list evaluations"))?;
    let ids: Vec<String> = evaluations.iter().map(|evaluation| evaluation.id.clone()).collect();
    let answers = repositories::evaluations::list_answer_evaluations(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answer evaluations"))?;

    let mut by_evaluation: HashMap<String, Vec<AnswerEvaluation>> = HashMap::new();
    for answer in answers {
        by_evaluation.entry(answer.evaluation_id.clone()).or_default().push(answer);
    }

    let items = evaluations
        .into_iter()
        .map(|evaluation| {
            let answers = by_evaluation.remove(&evaluation.id).unwrap_or_default();
            EvaluationResponse::from_db(evaluation, answers)
        })
        .collect();

    Ok(Json(items))
}

/// Builds a fresh sheet for `pairs` and applies the submitted inputs.
/// Inputs without a rating only set the flag; the answer stays unrated.
/// An application without answers fails with `NoAnswers` whatever the inputs.
pub(crate) fn rating_sheet(
    pairs: &[QaPair],
    inputs: &[RatingInput],
) -> Result<RatingSheet, ScoringError> {
    if pairs.is_empty() {
        return Err(ScoringError::NoAnswers);
    }

    let mut sheet = RatingSheet::for_pairs(pairs);
    for input in inputs {
        sheet.set_looks_ai(&input.answer_id, input.looks_ai)?;
        if let Some(value) = input.rating {
            sheet.rate(&input.answer_id, Rating::new(value)?)?;
        }
    }
    Ok(sheet)
}
