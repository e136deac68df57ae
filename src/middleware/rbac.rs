// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::Role,
};

/// Regra de acesso de uma rota, resolvida pelo perfil do usuário.
pub trait RoleDef: Send + Sync + 'static {
    fn name() -> &'static str;
    fn allows(role: Role) -> bool;
}

/// Extractor que barra a requisição antes do handler.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(locale) = Locale::from_request_parts(parts, state).await;

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

        if !T::allows(user.0.role) {
            tracing::warn!("Acesso negado a {} ({:?}): exige {}", user.0.id, user.0.role, T::name());
            return Err(AppError::Forbidden.to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// REGRAS
// ---

pub struct AdminOnly;
impl RoleDef for AdminOnly {
    fn name() -> &'static str { "admin" }
    fn allows(role: Role) -> bool { role.is_admin() }
}

pub struct EditorOrAdmin;
impl RoleDef for EditorOrAdmin {
    fn name() -> &'static str { "editor/admin" }
    fn allows(role: Role) -> bool { role.can_edit() }
}
