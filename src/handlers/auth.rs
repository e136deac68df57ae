// src/handlers/auth.rs

use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{CustomTokenPayload, LoginUserPayload, User},
    services::sync::Collection,
};

// POST /api/auth/login
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .auth_service
        .login_user(&payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

// POST /api/auth/anonymous
pub async fn anonymous(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .auth_service
        .sign_in_anonymously()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Sessão nova cria registro de perfil
    app_state.sync.refresh(Collection::UserRoles).await;
    Ok(Json(session))
}

// POST /api/auth/custom-token
pub async fn custom_token(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CustomTokenPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .auth_service
        .sign_in_with_custom_token(&payload.token)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    app_state.sync.refresh(Collection::UserRoles).await;
    Ok(Json(session))
}

// GET /api/users/me
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}
