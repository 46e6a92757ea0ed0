use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::model::{CreateRegisteredUserRequest, CreateUserResponse};
use crate::{
    AppState,
    error::AppError,
    middleware::RequestContext,
    result::ApiResponse,
    utils::success_to_api_response,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CreateRegisteredUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreateUserResponse>>), AppError> {
    let Json(req) = payload?;
    req.validate().map_err(AppError::Validation)?;

    let user = state.users.create(req).await.ok_or(AppError::UserExists)?;
    let total_users = state.users.count().await;
    tracing::info!(
        request_id = %ctx.request_id,
        user_id = %user.user_id,
        total_users,
        "Registered user"
    );

    Ok((
        StatusCode::CREATED,
        success_to_api_response(CreateUserResponse {
            user_id: user.user_id,
            nickname: user.nickname,
        }),
    ))
}
