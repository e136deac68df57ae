// src/models/social.rs
// Assistência social: cestas básicas e enxovais.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{common::format::fits_money_column, models::dashboard::ChartData};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "social_item", rename_all = "lowercase")]
pub enum SocialItem {
    #[serde(rename = "baskets")]
    Basket,
    #[serde(rename = "kits")]
    Kit,
}

impl SocialItem {
    pub fn label(self) -> &'static str {
        match self {
            SocialItem::Basket => "Cesta(s) Básica(s)",
            SocialItem::Kit => "Enxoval(is)",
        }
    }

    pub fn default_category(self) -> &'static str {
        match self {
            SocialItem::Basket => "alimentacao",
            SocialItem::Kit => "maternidade",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SocialMovement {
    pub id: Uuid,
    pub item: SocialItem,
    pub movement_date: NaiveDate,
    pub recipient: String,
    pub unit_id: Option<Uuid>,
    pub quantity: i32,
    pub measure_unit: Option<String>,
    pub category: String,
    pub notes: Option<String>,
    pub memo: Option<String>,
    pub cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub responsible: String,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SocialStockEntry {
    pub id: Uuid,
    pub item: SocialItem,
    pub quantity: i32,
    pub entry_date: NaiveDate,
    pub responsible: String,
    pub invoice: String,
    pub unit_cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Saída pronta para gravação (formulário ou importação).
#[derive(Debug, Clone, PartialEq)]
pub struct NewSocialMovement {
    pub item: SocialItem,
    pub movement_date: NaiveDate,
    pub recipient: String,
    pub unit_id: Option<Uuid>,
    pub quantity: i32,
    pub measure_unit: Option<String>,
    pub category: String,
    pub notes: Option<String>,
    pub memo: Option<String>,
    pub cost: Option<Decimal>,
    pub supplier: Option<String>,
    pub responsible: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SocialStock {
    pub inflows: i64,
    pub outflows: i64,
    pub current: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SocialEntryPayload {
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub quantity: i32,
    #[validate(required(message = "A data é obrigatória."))]
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "O responsável é obrigatório."))]
    pub responsible: String,
    pub invoice: Option<String>,
    #[validate(custom(function = "validate_unit_cost"))]
    pub unit_cost: Option<Decimal>,
    pub supplier: Option<String>,
}

fn validate_unit_cost(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O Custo Unitário da Cesta deve ser um valor positivo.".into());
        return Err(err);
    }
    if !fits_money_column(val) {
        let mut err = ValidationError::new("range");
        err.message = Some("O Custo Unitário da Cesta excede o valor máximo permitido.".into());
        return Err(err);
    }
    Ok(())
}

/// Destinatário: uma unidade cadastrada ou um nome livre.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Recipient {
    Unit { unit_id: Uuid },
    Custom { name: String },
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OutflowPayload {
    #[validate(required(message = "A data é obrigatória."))]
    pub date: Option<NaiveDate>,
    pub recipient: Recipient,
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub quantity: i32,
    pub measure_unit: Option<String>,
    #[validate(length(min = 1, message = "A categoria é obrigatória."))]
    pub category: String,
    pub notes: Option<String>,
    pub memo: Option<String>,
    #[validate(length(min = 1, message = "O responsável é obrigatório."))]
    pub responsible: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecipientPayload {
    #[validate(length(min = 1, message = "O nome do destinatário não pode ser vazio."))]
    pub recipient: String,
}

// --- IMPORTAÇÃO ---

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    Baskets,
    Kits,
}

impl ImportFormat {
    pub fn item(self) -> SocialItem {
        match self {
            ImportFormat::Baskets => SocialItem::Basket,
            ImportFormat::Kits => SocialItem::Kit,
        }
    }

    pub fn columns(self) -> usize {
        match self {
            ImportFormat::Baskets => 9,
            ImportFormat::Kits => 7,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImportPayload {
    pub format: ImportFormat,
    #[validate(length(min = 1, message = "Cole os dados da planilha na caixa de texto."))]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub message: String,
}

// --- RELATÓRIO ---

#[derive(Debug, Deserialize)]
pub struct CategoryReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: i64,
    pub movements: usize,
    pub categories: Vec<CategoryTotal>,
    pub top_category: Option<String>,
    pub top_share_percent: f64,
    pub chart: ChartData,
}
