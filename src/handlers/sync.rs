// src/handlers/sync.rs

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    services::sync::Collection,
};

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub after: u64,
}

// GET /api/sync/{collection}?after=<versão>
// Long-poll: responde na hora se houver versão mais nova, senão espera o próximo push.
pub async fn poll_collection(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(collection): Path<Collection>,
    Query(query): Query<SyncQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if collection == Collection::UserRoles && !user.0.role.is_admin() {
        return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
    }

    let snapshot = app_state
        .sync
        .hub()
        .wait_newer(collection, query.after, app_state.sync_wait)
        .await;

    Ok(Json(snapshot))
}
