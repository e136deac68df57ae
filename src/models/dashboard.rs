// src/models/dashboard.rs

use serde::{Deserialize, Serialize};

use crate::models::materials::{MaterialRequest, MaterialStatus};

/// Série pronta para o gráfico do frontend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

// 1. Cards do topo, um por item
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub stock: i64,
    pub delivered_total: i64,
    pub returned_total: i64,
    pub delivered_last_30_days: i64,
    pub returned_last_30_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCounts {
    pub requested: usize,
    pub in_separation: usize,
    pub ready_for_pickup: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub water: ItemSummary,
    pub gas: ItemSummary,
    pub materials: MaterialCounts,
}

// 2. Lista de materiais pendentes
#[derive(Debug, Default, Deserialize)]
pub struct PendingMaterialsQuery {
    pub status: Option<MaterialStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMaterial {
    pub display_name: String,
    #[serde(flatten)]
    pub request: MaterialRequest,
}
