// src/handlers/social.rs
// Cestas básicas e enxovais: `{item}` é `baskets` ou `kits`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{AdminOnly, EditorOrAdmin, RequireRole},
    },
    models::social::{
        CategoryReportQuery, ImportPayload, OutflowPayload, RecipientPayload, SocialEntryPayload, SocialItem,
    },
};

// GET /api/social/{item}/stock
pub async fn get_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<SocialItem>,
) -> Result<impl IntoResponse, ApiError> {
    let stock = app_state
        .social_service
        .stock(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(stock))
}

// POST /api/social/{item}/stock/entries
pub async fn add_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(item): Path<SocialItem>,
    Json(payload): Json<SocialEntryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let entry = app_state
        .social_service
        .add_entry(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

// GET /api/social/{item}/stock/entries
pub async fn list_entries(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<SocialItem>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .social_service
        .list_entries(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(entries))
}

// DELETE /api/social/{item}/stock/entries/{id}
pub async fn delete_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path((item, id)): Path<(SocialItem, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .social_service
        .delete_entry(item, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/social/{item}/movements
pub async fn register_outflow(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(item): Path<SocialItem>,
    Json(payload): Json<OutflowPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let movement = app_state
        .social_service
        .register_outflow(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(movement)))
}

// GET /api/social/{item}/movements
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<SocialItem>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .social_service
        .list_movements(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(movements))
}

// PATCH /api/social/{item}/movements/{id}/recipient
pub async fn update_recipient(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path((item, id)): Path<(SocialItem, Uuid)>,
    Json(payload): Json<RecipientPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let movement = app_state
        .social_service
        .update_recipient(item, id, &payload.recipient)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(movement))
}

// DELETE /api/social/{item}/movements/{id}
pub async fn delete_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path((item, id)): Path<(SocialItem, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .social_service
        .delete_movement(item, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/social/{item}/report?from=&to=&category=
pub async fn category_report(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<SocialItem>,
    Query(query): Query<CategoryReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .social_service
        .category_report(item, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}

// POST /api/social/import
pub async fn import(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Json(payload): Json<ImportPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let report = app_state
        .social_service
        .import(payload.format, &payload.text)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}
