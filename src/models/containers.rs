// src/models/containers.rs
// Galões de água e botijões de gás: estoque, razão de entregas/retornos e relatórios.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::common::error::Severity;
use crate::models::dashboard::ChartData;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "container_item", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContainerItem {
    Water,
    Gas,
}

impl ContainerItem {
    pub fn label(self) -> &'static str {
        match self {
            ContainerItem::Water => "Água",
            ContainerItem::Gas => "Gás",
        }
    }

    /// Substantivo usado nas mensagens, já com o plural entre parênteses.
    pub fn noun(self) -> &'static str {
        match self {
            ContainerItem::Water => "galão(ões)",
            ContainerItem::Gas => "botijão(ões)",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "container_movement_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Delivery,
    Return,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "stock_entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockEntryKind {
    Initial,
    Inflow,
}

// --- LINHAS DO BANCO ---

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMovement {
    pub id: Uuid,
    pub item_type: ContainerItem,
    pub unit_id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub kind: MovementKind,
    pub quantity: i32,
    pub movement_date: NaiveDate,
    pub unit_responsible: String,
    pub warehouse_responsible: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub id: Uuid,
    pub item_type: ContainerItem,
    pub kind: StockEntryKind,
    pub quantity: i32,
    pub entry_date: NaiveDate,
    pub responsible: String,
    pub invoice: String,
    pub recorded_at: DateTime<Utc>,
}

/// Linha a ser gravada no razão (uma perna da movimentação).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub item_type: ContainerItem,
    pub unit_id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub kind: MovementKind,
    pub quantity: i32,
    pub movement_date: NaiveDate,
    pub unit_responsible: String,
    pub warehouse_responsible: String,
}

// --- ESTOQUE ---

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitialStockPayload {
    #[validate(range(min = 0, message = "A quantidade não pode ser negativa."))]
    pub quantity: i32,
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "O responsável é obrigatório."))]
    pub responsible: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InflowPayload {
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub quantity: i32,
    #[validate(required(message = "A data é obrigatória."))]
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "O responsável é obrigatório."))]
    pub responsible: String,
    pub invoice: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub initial: i64,
    pub inflows: i64,
    pub deliveries: i64,
    pub returns: i64,
    pub current: i64,
    pub initial_defined: bool,
}

// --- MOVIMENTAÇÃO ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementRequestKind {
    Exchange,
    DeliveryOnly,
    ReturnOnly,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPayload {
    pub unit_id: Option<Uuid>,
    pub kind: MovementRequestKind,
    #[serde(default)]
    pub delivered: i32,
    #[serde(default)]
    pub returned: i32,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub unit_responsible: String,
    pub warehouse_responsible: Option<String>,
}

/// Movimentação validada, aguardando o nome do responsável do almoxarifado.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingMovement {
    pub item_type: ContainerItem,
    pub unit_id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub kind: MovementRequestKind,
    pub delivered: i32,
    pub returned: i32,
    pub date: NaiveDate,
    pub unit_responsible: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPrompt {
    pub title: String,
    pub prompt: String,
    pub confirm_label: String,
    pub pending: PendingMovement,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub message: String,
    pub movements: Vec<ContainerMovement>,
}

// --- SALDOS ---

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BalanceFilter {
    #[default]
    All,
    Owing,
    Credit,
    Settled,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub filter: BalanceFilter,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BalanceLabel {
    Owing,
    Credit,
    Settled,
}

impl BalanceLabel {
    pub fn of(balance: i64) -> Self {
        match balance {
            b if b > 0 => BalanceLabel::Owing,
            b if b < 0 => BalanceLabel::Credit,
            _ => BalanceLabel::Settled,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastMovement {
    pub movement_date: NaiveDate,
    pub kind: MovementKind,
    pub quantity: i32,
    pub unit_responsible: String,
    pub warehouse_responsible: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRow {
    pub unit_id: Uuid,
    pub unit_name: String,
    pub unit_type: String,
    pub delivered: i64,
    pub returned: i64,
    pub pending: i64,
    pub label: BalanceLabel,
    pub display: String,
    pub last_movement: Option<LastMovement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBalance {
    pub unit_id: Uuid,
    pub unit_name: String,
    pub balance: i64,
    pub label: BalanceLabel,
    pub level: Severity,
    pub message: String,
}

// --- PREVISÃO ---

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ForecastScope {
    Unit { unit_id: Uuid },
    UnitType { unit_type: String },
    All,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    pub scope: ForecastScope,
    #[serde(default)]
    pub excluded_unit_ids: Vec<Uuid>,
    #[validate(range(min = 1, message = "Informe um número de dias maior que zero."))]
    pub horizon_days: i64,
    #[validate(range(min = 0.0, max = 100.0, message = "A margem deve estar entre 0 e 100%."))]
    pub margin_percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub title: String,
    pub movements_considered: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub day_span: i64,
    pub total_delivered: i64,
    pub average_daily: f64,
    pub base_forecast: f64,
    pub margin_amount: f64,
    pub recommended_total: i64,
    pub short_history: bool,
    pub units_considered: Vec<String>,
    pub units_excluded: Vec<String>,
    pub chart: ChartData,
}

// --- ANÁLISE DE CONSUMO ---

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Unit,
    UnitType,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub grouping: Grouping,
    /// "todas", o id de uma unidade ou um tipo de unidade.
    #[serde(default = "all_filter")]
    pub filter: String,
    pub granularity: Granularity,
}

fn all_filter() -> String {
    "todas".to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub unit_name: String,
    pub total: i64,
    pub share_percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRanking {
    pub top: Vec<RankingEntry>,
    pub remaining_units: usize,
    pub total: i64,
    pub unit_count: usize,
    pub average_per_unit: f64,
    pub highest: Option<RankingEntry>,
    pub lowest: Option<RankingEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub filter_label: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub total_days: i64,
    pub total: i64,
    pub chart: ChartData,
    pub ranking: ConsumptionRanking,
}

// --- RELATÓRIO DE FORNECIMENTO ---

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub name: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyReport {
    pub item_type: ContainerItem,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: i64,
    pub by_unit: Vec<ReportRow>,
    pub by_responsible: Vec<ReportRow>,
}
