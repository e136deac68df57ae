// src/handlers/dashboard.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::{containers::ContainerItem, dashboard::PendingMaterialsQuery},
};

// GET /api/dashboard/summary
pub async fn get_summary(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let summary = app_state
        .dashboard_service
        .summary()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(summary))
}

// GET /api/dashboard/chart/{item}
pub async fn get_chart(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
) -> Result<impl IntoResponse, ApiError> {
    let chart = app_state
        .dashboard_service
        .chart(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(chart))
}

// GET /api/dashboard/materials?status=
pub async fn get_pending_materials(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<PendingMaterialsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .dashboard_service
        .pending_materials(query.status)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(rows))
}
