use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::pagination::{self, default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::db::models::ApplicationWithApplicant;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::users::{UserFilter, UserSortKey};
use crate::schemas::application::ApplicationResponse;
use crate::schemas::user::{UserDetailResponse, UserResponse};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    role: Option<UserRole>,
    #[serde(default)]
    chickened_out: Option<bool>,
    #[serde(default)]
    sort: UserSortKey,
    #[serde(default)]
    order: SortOrder,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/", get(list_users))
        .route("/:user_id", get(get_user))
}

async fn me(CurrentStaff(user): CurrentStaff) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentStaff(_staff): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let (skip, limit) = pagination::normalize(params.skip, params.limit);
    let filter = UserFilter {
        search: params.search,
        role: params.role,
        chickened_out: params.chickened_out,
        sort: params.sort,
        descending: params.order == SortOrder::Desc,
    };

    let total_count = repositories::users::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;
    let users = repositories::users::list(state.db(), &filter, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;

    Ok(Json(PaginatedResponse {
        items: users.into_iter().map(UserResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentStaff(_staff): CurrentStaff,
    State(state): State<AppState>,
) -> Result<Json<UserDetailResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?;

    let Some(user) = user else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    let applications = repositories::applications::list_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list user applications"))?;

    let applications = applications
        .into_iter()
        .map(|application| {
            ApplicationResponse::from_db(ApplicationWithApplicant {
                application,
                applicant_name: user.full_name.clone(),
            })
        })
        .collect();

    Ok(Json(UserDetailResponse { user: UserResponse::from_db(user), applications }))
}
