// src/models/units.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub unit_type: String,
    pub serves_water: bool,
    pub serves_gas: bool,
    pub serves_materials: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitPayload {
    #[validate(length(min = 1, message = "O nome da unidade é obrigatório."))]
    pub name: String,
    #[validate(length(min = 1, message = "O tipo da unidade é obrigatório."))]
    pub unit_type: String,
}

// Linhas "TIPO<TAB>NOME" coladas de planilha
#[derive(Debug, Deserialize, Validate)]
pub struct BulkUnitsPayload {
    #[validate(length(min = 1, message = "Cole ao menos uma linha."))]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUnitPayload {
    pub name: Option<String>,
    pub serves_water: Option<bool>,
    pub serves_gas: Option<bool>,
    pub serves_materials: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitFilter {
    pub name: Option<String>,
    pub unit_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddReport {
    pub added: usize,
    pub skipped: Vec<String>,
}

/// Quantidades removidas pela exclusão em cascata de uma unidade.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub container_movements: u64,
    pub material_requests: u64,
    pub social_movements: u64,
    pub attachments_removed: usize,
}
