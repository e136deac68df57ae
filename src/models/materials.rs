// src/models/materials.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

/// Etapas da solicitação. Só avançam, na ordem da declaração.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(type_name = "material_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    Requested,
    InSeparation,
    ReadyForPickup,
    Delivered,
}

impl MaterialStatus {
    pub fn label(self) -> &'static str {
        match self {
            MaterialStatus::Requested => "Para Separar",
            MaterialStatus::InSeparation => "Em Separação",
            MaterialStatus::ReadyForPickup => "Pronto para Entrega",
            MaterialStatus::Delivered => "Entregue",
        }
    }

    pub fn apply(self, transition: Transition) -> Result<MaterialStatus, AppError> {
        if self == transition.source() {
            Ok(transition.target())
        } else {
            Err(AppError::InvalidTransition { from: self.label() })
        }
    }
}

/// As três transições possíveis; cada uma parte de exatamente um status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartSeparation,
    MarkReady,
    Deliver,
}

impl Transition {
    pub fn source(self) -> MaterialStatus {
        match self {
            Transition::StartSeparation => MaterialStatus::Requested,
            Transition::MarkReady => MaterialStatus::InSeparation,
            Transition::Deliver => MaterialStatus::ReadyForPickup,
        }
    }

    pub fn target(self) -> MaterialStatus {
        match self {
            Transition::StartSeparation => MaterialStatus::InSeparation,
            Transition::MarkReady => MaterialStatus::ReadyForPickup,
            Transition::Deliver => MaterialStatus::Delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequest {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub material_type: String,
    pub items: Option<String>,
    pub status: MaterialStatus,
    pub requested_by: String,
    pub separator: Option<String>,
    pub deliverer: Option<String>,
    pub receiver: Option<String>,
    pub requested_at: NaiveDate,
    pub separation_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub file_url: Option<String>,
    #[serde(skip_serializing)]
    pub storage_path: Option<String>,
    pub download_count: i32,
    pub last_download_at: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

/// Campos de texto do formulário multipart de criação.
#[derive(Debug, Default, Validate)]
pub struct NewMaterialRequest {
    #[validate(required(message = "Selecione uma unidade."))]
    pub unit_id: Option<Uuid>,
    #[validate(length(min = 1, message = "O tipo de material é obrigatório."))]
    pub material_type: String,
    pub items: Option<String>,
    #[validate(length(min = 1, message = "O responsável pelo lançamento é obrigatório."))]
    pub requested_by: String,
    pub requested_at: Option<NaiveDate>,
}

/// Arquivo anexado já lido da requisição.
#[derive(Debug)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartSeparationPayload {
    #[validate(length(min = 1, message = "Por favor, informe o nome do separador."))]
    pub separator: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeliverPayload {
    #[validate(length(min = 1, message = "Informe o responsável pela entrega (Almoxarifado)."))]
    pub deliverer: String,
    #[validate(length(min = 1, message = "Informe quem recebeu (Unidade)."))]
    pub receiver: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRow {
    pub display_name: String,
    pub annotation: Option<String>,
    #[serde(flatten)]
    pub request: MaterialRequest,
}

/// Solicitações separadas por etapa, uma tabela por status.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialBoard {
    pub requested: Vec<MaterialRow>,
    pub in_separation: Vec<MaterialRow>,
    pub ready_for_pickup: Vec<MaterialRow>,
    pub delivered: Vec<MaterialRow>,
}

/// Contador de downloads do anexo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadState {
    pub count: i32,
    pub last_download_at: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl From<&MaterialRequest> for DownloadState {
    fn from(req: &MaterialRequest) -> Self {
        Self {
            count: req.download_count,
            last_download_at: req.last_download_at,
            blocked_until: req.blocked_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_pipeline() {
        let s = MaterialStatus::Requested;
        let s = s.apply(Transition::StartSeparation).unwrap();
        assert_eq!(s, MaterialStatus::InSeparation);
        let s = s.apply(Transition::MarkReady).unwrap();
        assert_eq!(s, MaterialStatus::ReadyForPickup);
        let s = s.apply(Transition::Deliver).unwrap();
        assert_eq!(s, MaterialStatus::Delivered);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let err = MaterialStatus::Requested.apply(Transition::MarkReady).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { from: "Para Separar" }));
        assert!(MaterialStatus::Requested.apply(Transition::Deliver).is_err());
        assert!(MaterialStatus::InSeparation.apply(Transition::Deliver).is_err());
    }

    #[test]
    fn delivered_is_terminal() {
        for t in [Transition::StartSeparation, Transition::MarkReady, Transition::Deliver] {
            assert!(MaterialStatus::Delivered.apply(t).is_err());
        }
    }

    #[test]
    fn going_backwards_is_rejected() {
        assert!(MaterialStatus::ReadyForPickup.apply(Transition::StartSeparation).is_err());
        assert!(MaterialStatus::ReadyForPickup.apply(Transition::MarkReady).is_err());
    }
}
