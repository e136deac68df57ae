// src/services/dashboard_service.rs

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use crate::{
    common::{
        error::AppError,
        format::{normalize_unit_type, today, unit_display_name},
    },
    db::{ContainerRepository, MaterialRepository},
    models::{
        containers::{ContainerItem, ContainerMovement, MovementKind},
        dashboard::{ChartData, DashboardSummary, Dataset, ItemSummary, MaterialCounts, PendingMaterial},
        materials::{MaterialRequest, MaterialStatus},
    },
    services::ledger,
};

const WINDOW_DAYS: i64 = 30;

/// Entregue/recebido nos últimos 30 dias, contando o dia de hoje.
fn recent_totals(movements: &[ContainerMovement], today: NaiveDate) -> (i64, i64) {
    let since = today - Duration::days(WINDOW_DAYS - 1);
    movements
        .iter()
        .filter(|m| m.movement_date >= since && m.movement_date <= today)
        .fold((0, 0), |(delivered, returned), m| match m.kind {
            MovementKind::Delivery => (delivered + i64::from(m.quantity), returned),
            MovementKind::Return => (delivered, returned + i64::from(m.quantity)),
        })
}

/// 30 buckets diários terminando em `today`.
pub fn daily_chart(movements: &[ContainerMovement], today: NaiveDate) -> ChartData {
    let first = today - Duration::days(WINDOW_DAYS - 1);
    let mut delivered = vec![0.0; WINDOW_DAYS as usize];
    let mut returned = vec![0.0; WINDOW_DAYS as usize];

    for m in movements {
        let offset = (m.movement_date - first).num_days();
        if !(0..WINDOW_DAYS).contains(&offset) {
            continue;
        }
        let slot = match m.kind {
            MovementKind::Delivery => &mut delivered[offset as usize],
            MovementKind::Return => &mut returned[offset as usize],
        };
        *slot += f64::from(m.quantity);
    }

    ChartData {
        labels: (0..WINDOW_DAYS).map(|i| (first + Duration::days(i)).format("%d/%m").to_string()).collect(),
        datasets: vec![
            Dataset { label: "Entregues".to_string(), data: delivered },
            Dataset { label: "Recebidos".to_string(), data: returned },
        ],
    }
}

fn material_counts(open: &[MaterialRequest]) -> MaterialCounts {
    let mut counts = MaterialCounts::default();
    for r in open {
        match r.status {
            MaterialStatus::Requested => counts.requested += 1,
            MaterialStatus::InSeparation => counts.in_separation += 1,
            MaterialStatus::ReadyForPickup => counts.ready_for_pickup += 1,
            MaterialStatus::Delivered => {}
        }
    }
    counts
}

#[derive(Clone)]
pub struct DashboardService {
    pool: PgPool,
    container_repo: ContainerRepository,
    material_repo: MaterialRepository,
}

impl DashboardService {
    pub fn new(pool: PgPool, container_repo: ContainerRepository, material_repo: MaterialRepository) -> Self {
        Self { pool, container_repo, material_repo }
    }

    async fn item_summary(&self, item: ContainerItem, today: NaiveDate) -> Result<ItemSummary, AppError> {
        let totals = self.container_repo.stock_totals(&self.pool, item).await?;
        let stock = ledger::stock_summary(totals);
        let movements = self.container_repo.list_movements(item).await?;
        let (delivered_last_30_days, returned_last_30_days) = recent_totals(&movements, today);

        Ok(ItemSummary {
            stock: stock.current,
            delivered_total: stock.deliveries,
            returned_total: stock.returns,
            delivered_last_30_days,
            returned_last_30_days,
        })
    }

    pub async fn summary(&self) -> Result<DashboardSummary, AppError> {
        let today = today();
        Ok(DashboardSummary {
            water: self.item_summary(ContainerItem::Water, today).await?,
            gas: self.item_summary(ContainerItem::Gas, today).await?,
            materials: material_counts(&self.material_repo.list_open(None).await?),
        })
    }

    pub async fn chart(&self, item: ContainerItem) -> Result<ChartData, AppError> {
        let movements = self.container_repo.list_movements(item).await?;
        Ok(daily_chart(&movements, today()))
    }

    /// Pendentes ordenados por etapa e depois pela data do pedido.
    pub async fn pending_materials(&self, status: Option<MaterialStatus>) -> Result<Vec<PendingMaterial>, AppError> {
        let mut open = self.material_repo.list_open(status).await?;
        open.sort_by_key(|r| (r.status, r.requested_at));

        Ok(open
            .into_iter()
            .map(|request| PendingMaterial {
                display_name: unit_display_name(&request.unit_name, &normalize_unit_type(&request.unit_type)),
                request,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::tests::{movement, unit};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn chart_has_thirty_daily_buckets() {
        let u = unit("Centro", "CRAS");
        let movements = vec![
            movement(&u, MovementKind::Delivery, 3, 31),
            movement(&u, MovementKind::Return, 2, 31),
            movement(&u, MovementKind::Delivery, 4, 2),
            // fora da janela
            movement(&u, MovementKind::Delivery, 9, 1),
        ];
        let chart = daily_chart(&movements, d(31));

        assert_eq!(chart.labels.len(), 30);
        assert_eq!(chart.labels[0], "02/03");
        assert_eq!(chart.labels[29], "31/03");
        assert_eq!(chart.datasets[0].data[29], 3.0);
        assert_eq!(chart.datasets[1].data[29], 2.0);
        assert_eq!(chart.datasets[0].data[0], 4.0);
        assert_eq!(chart.datasets[0].data.iter().sum::<f64>(), 7.0);
    }

    #[test]
    fn recent_totals_use_the_same_window() {
        let u = unit("Centro", "CRAS");
        let movements = vec![
            movement(&u, MovementKind::Delivery, 3, 20),
            movement(&u, MovementKind::Return, 1, 2),
            movement(&u, MovementKind::Return, 5, 1),
        ];
        assert_eq!(recent_totals(&movements, d(31)), (3, 1));
    }
}
