//! Profile endpoints for the authenticated user.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use lets_talk::{
    UserId,
    auth::{ChangePasswordRequest, ProfileUpdate, User},
};

use super::{
    AppState,
    error::{ApiResponse, ApiResult},
};

/// `GET /api/user/getcurrentuser`
pub async fn current_user(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> ApiResult<ApiResponse<User>> {
    let user = state.auth_manager.current_user(user_id).await?;
    Ok(ApiResponse::ok(user, "User fetched successfully"))
}

/// `PATCH /api/user/update`
///
/// Only full name, profile picture and bio are editable here.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<ApiResponse<User>> {
    let Json(update) = payload?;
    let user = state.auth_manager.update_profile(user_id, update).await?;
    Ok(ApiResponse::ok(user, "Profile updated successfully"))
}

/// `PUT /api/user/changepassword`
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(request) = payload?;
    state.auth_manager.change_password(user_id, request).await?;
    Ok(ApiResponse::ok((), "Password changed successfully"))
}
