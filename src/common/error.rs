use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale};

/// Nível do aviso exibido ao usuário.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

// Erro de domínio. Os handlers convertem para ApiError com `to_api_error`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Estoque insuficiente. Disponível: {available}")]
    InsufficientStock { available: i64 },

    #[error("Estoque inicial não definido")]
    InitialStockUndefined,

    #[error("Estoque inicial já definido")]
    InitialStockAlreadyDefined,

    #[error("Transição inválida a partir de '{from}'")]
    InvalidTransition { from: &'static str },

    #[error("Downloads bloqueados por {minutes} minuto(s)")]
    DownloadBlocked { minutes: i64 },

    /// Carrega a chave da mensagem traduzida.
    #[error("Dados insuficientes: {0}")]
    InsufficientData(&'static str),

    #[error("Arquivo excede o limite de {max_mb} MB")]
    AttachmentTooLarge { max_mb: u64 },

    #[error("Registro não encontrado: {0}")]
    NotFound(&'static str),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Permissão negada")]
    Forbidden,

    #[error("Login por token personalizado desabilitado")]
    CustomTokenDisabled,

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro de E/S: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Erro já traduzido, pronto para virar resposta HTTP.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub severity: Severity,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, severity: Severity, error: impl Into<String>) -> Self {
        Self { status, error: error.into(), severity, details: None }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.error,
            "severity": self.severity,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let t = |key: &str| store.translate(lang, key, &[]);

        match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => Value::String(m.to_string()),
                            None => Value::String(e.code.to_string()),
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    error: t("validation_failed"),
                    severity: Severity::Warning,
                    details: Some(Value::Object(details)),
                }
            }
            AppError::InvalidInput(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, Severity::Warning, message.clone())
            }
            AppError::InsufficientStock { available } => ApiError::new(
                StatusCode::BAD_REQUEST,
                Severity::Error,
                store.translate(lang, "insufficient_stock", &[("available", available.to_string())]),
            ),
            AppError::InitialStockUndefined => {
                ApiError::new(StatusCode::BAD_REQUEST, Severity::Warning, t("initial_stock_undefined"))
            }
            AppError::InitialStockAlreadyDefined => {
                ApiError::new(StatusCode::CONFLICT, Severity::Info, t("initial_stock_already_defined"))
            }
            AppError::InvalidTransition { from } => ApiError::new(
                StatusCode::CONFLICT,
                Severity::Error,
                store.translate(lang, "invalid_transition", &[("from", from.to_string())]),
            ),
            AppError::DownloadBlocked { minutes } => ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                Severity::Warning,
                store.translate(lang, "download_blocked", &[("minutes", minutes.to_string())]),
            ),
            AppError::InsufficientData(key) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, Severity::Info, t(*key))
            }
            AppError::AttachmentTooLarge { max_mb } => ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                Severity::Warning,
                store.translate(lang, "attachment_too_large", &[("max", max_mb.to_string())]),
            ),
            AppError::NotFound(entity) => ApiError::new(
                StatusCode::NOT_FOUND,
                Severity::Error,
                store.translate(lang, "not_found", &[("entity", t(*entity))]),
            ),
            AppError::EmailAlreadyExists => {
                ApiError::new(StatusCode::CONFLICT, Severity::Error, t("email_already_exists"))
            }
            AppError::InvalidCredentials => {
                ApiError::new(StatusCode::UNAUTHORIZED, Severity::Error, t("invalid_credentials"))
            }
            AppError::InvalidToken => {
                ApiError::new(StatusCode::UNAUTHORIZED, Severity::Error, t("invalid_token"))
            }
            AppError::Forbidden => ApiError::new(StatusCode::FORBIDDEN, Severity::Error, t("forbidden")),
            AppError::CustomTokenDisabled => {
                ApiError::new(StatusCode::BAD_REQUEST, Severity::Error, t("custom_token_disabled"))
            }

            // O resto vira 500; o detalhe vai só para o log.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, Severity::Error, t("internal_error"))
            }
        }
    }
}

// Para extractors e rotas que não têm acesso ao Locale.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::new()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn insufficient_stock_reports_available_amount() {
        let store = I18nStore::new();
        let api = AppError::InsufficientStock { available: 3 }.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.severity, Severity::Error);
        assert_eq!(api.error, "Estoque insuficiente. Disponível: 3");
    }

    #[test]
    fn second_initial_stock_is_informational() {
        let store = I18nStore::new();
        let api = AppError::InitialStockAlreadyDefined.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.severity, Severity::Info);
    }

    #[test]
    fn permission_errors_are_error_level() {
        let store = I18nStore::new();
        let api = AppError::Forbidden.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.severity, Severity::Error);
    }

    #[test]
    fn backend_failures_hide_details() {
        let store = I18nStore::new();
        let err = AppError::InternalServerError(anyhow::anyhow!("conexão recusada em 10.0.0.3"));
        let api = err.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn response_body_carries_severity() {
        let store = I18nStore::new();
        let response = AppError::InitialStockAlreadyDefined.to_api_error(&pt(), &store).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["severity"], "info");
        assert!(body.get("level").is_none());
        assert!(body["error"].is_string());
    }

    #[test]
    fn english_locale_is_honored() {
        let store = I18nStore::new();
        let api = AppError::InvalidCredentials.to_api_error(&Locale("en".into()), &store);
        assert_eq!(api.error, "Invalid e-mail or password.");
    }
}
