// src/services/container_service.rs

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{error::AppError, format::{capitalize_words, today}},
    db::{ContainerRepository, UnitRepository},
    models::{
        containers::{
            AnalysisRequest, AnalysisResult, BalanceFilter, BalanceRow, ContainerItem, ContainerMovement,
            ForecastRequest, ForecastResult, InflowPayload, InitialStockPayload, MovementPayload, MovementPrompt,
            MovementReceipt, PendingMovement, StockEntry, StockEntryKind, StockSummary, SupplyReport, UnitBalance,
        },
        units::Unit,
    },
    services::{
        forecast, ledger, report_service,
        sync::{Collection, SyncService},
    },
};

#[derive(Clone)]
pub struct ContainerService {
    pool: PgPool,
    repo: ContainerRepository,
    unit_repo: UnitRepository,
    sync: SyncService,
}

impl ContainerService {
    pub fn new(pool: PgPool, repo: ContainerRepository, unit_repo: UnitRepository, sync: SyncService) -> Self {
        Self { pool, repo, unit_repo, sync }
    }

    // --- ESTOQUE ---

    pub async fn stock(&self, item: ContainerItem) -> Result<StockSummary, AppError> {
        let totals = self.repo.stock_totals(&self.pool, item).await?;
        Ok(ledger::stock_summary(totals))
    }

    pub async fn list_entries(&self, item: ContainerItem) -> Result<Vec<StockEntry>, AppError> {
        self.repo.list_entries(item).await
    }

    /// Estoque inicial: só um por item. A segunda tentativa não altera nada.
    pub async fn set_initial_stock(
        &self,
        item: ContainerItem,
        payload: &InitialStockPayload,
    ) -> Result<StockEntry, AppError> {
        let mut tx = self.pool.begin().await?;
        self.repo.lock_item(&mut *tx, item).await?;

        let stock = ledger::stock_summary(self.repo.stock_totals(&mut *tx, item).await?);
        if stock.initial_defined {
            return Err(AppError::InitialStockAlreadyDefined);
        }

        let entry = self.repo
            .insert_entry(
                &mut *tx,
                item,
                StockEntryKind::Initial,
                payload.quantity,
                payload.date.unwrap_or_else(today),
                &capitalize_words(&payload.responsible),
                "N/A",
            )
            .await?;
        tx.commit().await?;

        tracing::info!("📦 Estoque inicial de {:?} definido: {} ({})", item, entry.quantity, entry.id);
        self.sync.refresh(Collection::container_stock(item)).await;
        Ok(entry)
    }

    pub async fn add_inflow(&self, item: ContainerItem, payload: &InflowPayload) -> Result<StockEntry, AppError> {
        let date = payload.date.ok_or_else(|| AppError::InvalidInput("A data é obrigatória.".into()))?;
        let invoice = payload
            .invoice
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A");

        let mut tx = self.pool.begin().await?;
        self.repo.lock_item(&mut *tx, item).await?;

        let stock = ledger::stock_summary(self.repo.stock_totals(&mut *tx, item).await?);
        if !stock.initial_defined {
            return Err(AppError::InitialStockUndefined);
        }

        let entry = self.repo
            .insert_entry(
                &mut *tx,
                item,
                StockEntryKind::Inflow,
                payload.quantity,
                date,
                &capitalize_words(&payload.responsible),
                invoice,
            )
            .await?;
        tx.commit().await?;

        tracing::info!("📦 Entrada de {:?}: +{} ({})", item, entry.quantity, entry.id);
        self.sync.refresh(Collection::container_stock(item)).await;
        Ok(entry)
    }

    pub async fn delete_entry(&self, item: ContainerItem, id: Uuid) -> Result<(), AppError> {
        if self.repo.delete_entry(item, id).await? == 0 {
            return Err(AppError::NotFound("stock_entry"));
        }
        tracing::info!("🗑️ Entrada de estoque {} removida ({:?})", id, item);
        self.sync.refresh(Collection::container_stock(item)).await;
        Ok(())
    }

    // --- MOVIMENTAÇÕES ---

    pub async fn list_movements(&self, item: ContainerItem) -> Result<Vec<ContainerMovement>, AppError> {
        self.repo.list_movements(item).await
    }

    async fn load_unit(&self, unit_id: Uuid) -> Result<Unit, AppError> {
        self.unit_repo
            .find_by_id(&self.pool, unit_id)
            .await?
            .ok_or(AppError::NotFound("unit"))
    }

    async fn stage(&self, item: ContainerItem, payload: &MovementPayload) -> Result<PendingMovement, AppError> {
        let (unit_id, _, _) = ledger::required_fields(payload)?;
        let unit = self.load_unit(unit_id).await?;
        ledger::stage_movement(item, payload, &unit)
    }

    /// Fase 1: roda todas as guardas e devolve o texto do modal de confirmação.
    pub async fn prepare_movement(
        &self,
        item: ContainerItem,
        payload: &MovementPayload,
    ) -> Result<MovementPrompt, AppError> {
        let pending = self.stage(item, payload).await?;
        ledger::check_stock(&self.stock(item).await?, pending.delivered)?;
        Ok(ledger::movement_prompt(pending))
    }

    /// Fase 2: grava as duas pernas na mesma transação, com o estoque travado.
    pub async fn commit_movement(
        &self,
        item: ContainerItem,
        payload: &MovementPayload,
    ) -> Result<MovementReceipt, AppError> {
        let pending = self.stage(item, payload).await?;
        let legs = ledger::movement_legs(&pending, payload.warehouse_responsible.as_deref())?;

        let mut tx = self.pool.begin().await?;
        self.repo.lock_item(&mut *tx, item).await?;

        let stock = ledger::stock_summary(self.repo.stock_totals(&mut *tx, item).await?);
        ledger::check_stock(&stock, pending.delivered)?;

        let mut movements = Vec::with_capacity(legs.len());
        for leg in &legs {
            movements.push(self.repo.insert_movement(&mut *tx, leg).await?);
        }
        tx.commit().await?;

        tracing::info!(
            "🚚 Movimentação de {:?} para {} ({}): entregue {}, recebido {}",
            item,
            pending.unit_name,
            pending.unit_id,
            pending.delivered,
            pending.returned
        );
        self.sync
            .refresh_many(&[Collection::container_movements(item), Collection::container_stock(item)])
            .await;

        Ok(MovementReceipt {
            message: ledger::receipt_message(item, pending.delivered, pending.returned),
            movements,
        })
    }

    pub async fn delete_movement(&self, item: ContainerItem, id: Uuid) -> Result<(), AppError> {
        if self.repo.delete_movement(item, id).await? == 0 {
            return Err(AppError::NotFound("movement"));
        }
        tracing::info!("🗑️ Movimentação {} removida ({:?})", id, item);
        self.sync.refresh(Collection::container_movements(item)).await;
        Ok(())
    }

    // --- SALDOS ---

    pub async fn balances(&self, item: ContainerItem, filter: BalanceFilter) -> Result<Vec<BalanceRow>, AppError> {
        let units = self.unit_repo.list_all().await?;
        let movements = self.repo.list_movements(item).await?;
        Ok(ledger::status_table(&units, &movements, filter))
    }

    pub async fn unit_balance(&self, item: ContainerItem, unit_id: Uuid) -> Result<UnitBalance, AppError> {
        let unit = self.load_unit(unit_id).await?;
        let movements = self.repo.list_movements(item).await?;
        Ok(ledger::unit_balance(item, &unit, &movements))
    }

    // --- PREVISÃO E ANÁLISE ---

    pub async fn forecast(&self, item: ContainerItem, request: &ForecastRequest) -> Result<ForecastResult, AppError> {
        let units = self.unit_repo.list_all().await?;
        let movements = self.repo.list_movements(item).await?;
        forecast::forecast(item, request, &units, &movements)
    }

    pub async fn analysis(&self, item: ContainerItem, request: &AnalysisRequest) -> Result<AnalysisResult, AppError> {
        let units = self.unit_repo.list_all().await?;
        let movements = self.repo.list_movements(item).await?;
        forecast::analysis(request, &units, &movements)
    }

    // --- RELATÓRIO ---

    pub async fn supply_report(&self, item: ContainerItem, from: NaiveDate, to: NaiveDate) -> Result<SupplyReport, AppError> {
        if from > to {
            return Err(AppError::InvalidInput("A data inicial deve ser anterior à data final.".into()));
        }
        let deliveries = self.repo.deliveries_between(item, from, to).await?;
        Ok(report_service::supply_report(item, from, to, &deliveries))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{
        db::{MaterialRepository, SocialRepository, UserRepository},
        models::containers::MovementRequestKind,
        services::sync::SnapshotHub,
    };

    fn service(pool: &PgPool) -> ContainerService {
        let sync = SyncService::new(
            Arc::new(SnapshotHub::new()),
            UnitRepository::new(pool.clone()),
            ContainerRepository::new(pool.clone()),
            MaterialRepository::new(pool.clone()),
            SocialRepository::new(pool.clone()),
            UserRepository::new(pool.clone()),
        );
        ContainerService::new(pool.clone(), ContainerRepository::new(pool.clone()), UnitRepository::new(pool.clone()), sync)
    }

    #[tokio::test]
    async fn missing_fields_fail_before_the_unit_lookup() {
        // Pool que nunca conecta: qualquer consulta falharia com erro de banco
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/almoxarifado_offline").unwrap();
        let service = service(&pool);

        let payload = MovementPayload {
            unit_id: Some(Uuid::new_v4()),
            kind: MovementRequestKind::DeliveryOnly,
            delivered: 1,
            returned: 0,
            date: Some(today()),
            unit_responsible: " ".into(),
            warehouse_responsible: None,
        };
        let err = service.prepare_movement(ContainerItem::Water, &payload).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(m) if m.starts_with("Dados inválidos")));
    }

    #[sqlx::test]
    #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
    async fn initial_stock_is_set_only_once(pool: PgPool) {
        let service = service(&pool);

        let inflow = InflowPayload { quantity: 5, date: Some(today()), responsible: "ana".into(), invoice: None };
        assert!(matches!(
            service.add_inflow(ContainerItem::Gas, &inflow).await,
            Err(AppError::InitialStockUndefined)
        ));

        let first = InitialStockPayload { quantity: 40, date: None, responsible: "ana".into() };
        let entry = service.set_initial_stock(ContainerItem::Gas, &first).await.unwrap();
        assert_eq!(entry.responsible, "Ana");
        assert_eq!(entry.invoice, "N/A");

        let second = InitialStockPayload { quantity: 99, date: None, responsible: "bia".into() };
        assert!(matches!(
            service.set_initial_stock(ContainerItem::Gas, &second).await,
            Err(AppError::InitialStockAlreadyDefined)
        ));

        let stock = service.stock(ContainerItem::Gas).await.unwrap();
        assert!(stock.initial_defined);
        assert_eq!(stock.initial, 40);
        assert_eq!(stock.current, 40);

        // o outro item continua sem estoque inicial
        assert!(!service.stock(ContainerItem::Water).await.unwrap().initial_defined);
    }
}
