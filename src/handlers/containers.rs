// src/handlers/containers.rs
// Rotas de água e gás: `{item}` é `water` ou `gas`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
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
    models::containers::{
        AnalysisRequest, BalanceQuery, ContainerItem, ForecastRequest, InflowPayload, InitialStockPayload,
        MovementPayload, ReportQuery,
    },
};

// ---
// ESTOQUE
// ---

// GET /api/containers/{item}/stock
pub async fn get_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
) -> Result<impl IntoResponse, ApiError> {
    let stock = app_state
        .container_service
        .stock(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(stock))
}

// POST /api/containers/{item}/stock/initial
pub async fn set_initial_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<InitialStockPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let entry = app_state
        .container_service
        .set_initial_stock(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

// POST /api/containers/{item}/stock/inflow
pub async fn add_inflow(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<InflowPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let entry = app_state
        .container_service
        .add_inflow(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

// GET /api/containers/{item}/stock/entries
pub async fn list_entries(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .container_service
        .list_entries(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(entries))
}

// DELETE /api/containers/{item}/stock/entries/{id}
pub async fn delete_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path((item, id)): Path<(ContainerItem, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .container_service
        .delete_entry(item, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---
// MOVIMENTAÇÕES
// ---

// GET /api/containers/{item}/movements
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .container_service
        .list_movements(item)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(movements))
}

// POST /api/containers/{item}/movements/prepare
pub async fn prepare_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<MovementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt = app_state
        .container_service
        .prepare_movement(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(prompt))
}

// POST /api/containers/{item}/movements
pub async fn commit_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<MovementPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = app_state
        .container_service
        .commit_movement(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

// DELETE /api/containers/{item}/movements/{id}
pub async fn delete_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path((item, id)): Path<(ContainerItem, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .container_service
        .delete_movement(item, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---
// SALDOS
// ---

// GET /api/containers/{item}/balances?filter=
pub async fn list_balances(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
    Query(query): Query<BalanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .container_service
        .balances(item, query.filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(rows))
}

// GET /api/containers/{item}/balances/{unitId}
pub async fn unit_balance(
    State(app_state): State<AppState>,
    locale: Locale,
    Path((item, unit_id)): Path<(ContainerItem, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let balance = app_state
        .container_service
        .unit_balance(item, unit_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(balance))
}

// ---
// PREVISÃO E ANÁLISE
// ---

// POST /api/containers/{item}/forecast
pub async fn forecast(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<ForecastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let result = app_state
        .container_service
        .forecast(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}

// POST /api/containers/{item}/analysis
pub async fn analysis(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
    Json(payload): Json<AnalysisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .container_service
        .analysis(item, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}

// ---
// RELATÓRIO DE FORNECIMENTO
// ---

// GET /api/containers/{item}/report?from=&to=
pub async fn supply_report(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .container_service
        .supply_report(item, query.from, query.to)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}

// GET /api/containers/{item}/report.pdf?from=&to=
pub async fn supply_report_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item): Path<ContainerItem>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let report = app_state
        .container_service
        .supply_report(item, query.from, query.to)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // genpdf é síncrono
    let service = app_state.report_service.clone();
    let pdf_bytes = tokio::task::spawn_blocking(move || service.supply_report_pdf(&report))
        .await
        .map_err(|e| AppError::from(anyhow::anyhow!("Falha na task do PDF: {}", e)))
        .and_then(|result| result)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let file_name = format!(
        "fornecimento_{}_{}_{}.pdf",
        match item {
            ContainerItem::Water => "agua",
            ContainerItem::Gas => "gas",
        },
        query.from,
        query.to
    );

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
    ];

    Ok((headers, pdf_bytes).into_response())
}
