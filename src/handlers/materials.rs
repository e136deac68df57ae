// src/handlers/materials.rs

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        format::parse_date,
    },
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{AdminOnly, EditorOrAdmin, RequireRole},
    },
    models::materials::{Attachment, DeliverPayload, NewMaterialRequest, StartSeparationPayload},
};

const DOWNLOAD_COUNT: HeaderName = HeaderName::from_static("x-download-count");
const DOWNLOAD_BLOCKED_UNTIL: HeaderName = HeaderName::from_static("x-download-blocked-until");

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidInput(format!("Formulário inválido: {}", e.body_text()))
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map(|t| t.trim().to_string()).map_err(multipart_error)
}

/// Vazio fica para o serviço (data de hoje); data ilegível é recusada.
fn requested_at(raw: &str) -> Result<Option<NaiveDate>, AppError> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(raw)
        .map(Some)
        .ok_or_else(|| AppError::InvalidInput(format!("Data da solicitação inválida ('{raw}').")))
}

/// Lê o formulário: campos de texto + arquivo opcional em `file`.
async fn read_form(mut multipart: Multipart) -> Result<(NewMaterialRequest, Option<Attachment>), AppError> {
    let mut fields = NewMaterialRequest::default();
    let mut attachment = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "unitId" => {
                let raw = field_text(field).await?;
                fields.unit_id = match raw.as_str() {
                    "" => None,
                    id => Some(Uuid::parse_str(id).map_err(|_| AppError::InvalidInput("Unidade inválida.".into()))?),
                };
            }
            "materialType" => fields.material_type = field_text(field).await?,
            "items" => fields.items = Some(field_text(field).await?).filter(|s| !s.is_empty()),
            "requestedBy" => fields.requested_by = field_text(field).await?,
            "requestedAt" => fields.requested_at = requested_at(&field_text(field).await?)?,
            "file" => {
                let file_name = field.file_name().unwrap_or("anexo").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                attachment = Some(Attachment { file_name, bytes: bytes.to_vec() });
            }
            other => tracing::debug!("Campo multipart ignorado: {}", other),
        }
    }
    Ok((fields, attachment))
}

// GET /api/materials
pub async fn get_board(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let board = app_state
        .material_service
        .board()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(board))
}

// POST /api/materials (multipart)
pub async fn create_request(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, attachment) = read_form(multipart)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    fields.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .material_service
        .create(&fields, attachment)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(request)))
}

// POST /api/materials/{id}/start-separation
pub async fn start_separation(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartSeparationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .material_service
        .start_separation(id, &payload.separator)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

// POST /api/materials/{id}/ready
pub async fn mark_ready(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = app_state
        .material_service
        .mark_ready(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

// POST /api/materials/{id}/deliver
pub async fn deliver(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<EditorOrAdmin>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliverPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .material_service
        .deliver(id, &payload.deliverer, &payload.receiver)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

// GET /api/materials/{id}/attachment
pub async fn download_attachment(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let download = app_state
        .material_service
        .download(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let blocked_until = download
        .state
        .blocked_until
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", download.file_name)),
        (DOWNLOAD_COUNT, download.state.count.to_string()),
        (DOWNLOAD_BLOCKED_UNTIL, blocked_until),
    ];

    Ok((headers, download.bytes).into_response())
}

// DELETE /api/materials/{id}
pub async fn delete_request(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .material_service
        .delete(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
