// src/db/container_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::containers::{ContainerItem, ContainerMovement, NewMovement, StockEntry, StockEntryKind},
};

/// Somas brutas do estoque de um item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct StockTotals {
    pub initial: i64,
    pub inflows: i64,
    pub initial_entries: i64,
    pub deliveries: i64,
    pub returns: i64,
}

#[derive(Clone)]
pub struct ContainerRepository {
    pool: PgPool,
}

impl ContainerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leitura
    // ---

    pub async fn list_movements(&self, item: ContainerItem) -> Result<Vec<ContainerMovement>, AppError> {
        let rows = sqlx::query_as::<_, ContainerMovement>(
            "SELECT * FROM container_movements WHERE item_type = $1 ORDER BY recorded_at DESC",
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_entries(&self, item: ContainerItem) -> Result<Vec<StockEntry>, AppError> {
        let rows = sqlx::query_as::<_, StockEntry>(
            "SELECT * FROM container_stock_entries WHERE item_type = $1 ORDER BY recorded_at DESC",
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn stock_totals<'e, E>(&self, executor: E, item: ContainerItem) -> Result<StockTotals, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals = sqlx::query_as::<_, StockTotals>(
            r#"
            SELECT
                COALESCE((SELECT SUM(quantity) FROM container_stock_entries
                          WHERE item_type = $1 AND kind = 'initial'), 0)::BIGINT AS initial,
                COALESCE((SELECT SUM(quantity) FROM container_stock_entries
                          WHERE item_type = $1 AND kind = 'inflow'), 0)::BIGINT AS inflows,
                (SELECT COUNT(*) FROM container_stock_entries
                 WHERE item_type = $1 AND kind = 'initial')::BIGINT AS initial_entries,
                COALESCE((SELECT SUM(quantity) FROM container_movements
                          WHERE item_type = $1 AND kind = 'delivery'), 0)::BIGINT AS deliveries,
                COALESCE((SELECT SUM(quantity) FROM container_movements
                          WHERE item_type = $1 AND kind = 'return'), 0)::BIGINT AS returns
            "#,
        )
        .bind(item)
        .fetch_one(executor)
        .await?;
        Ok(totals)
    }

    /// Entregas no intervalo fechado [from, to].
    pub async fn deliveries_between(
        &self,
        item: ContainerItem,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ContainerMovement>, AppError> {
        let rows = sqlx::query_as::<_, ContainerMovement>(
            r#"
            SELECT * FROM container_movements
            WHERE item_type = $1 AND kind = 'delivery'
              AND movement_date BETWEEN $2 AND $3
            ORDER BY movement_date ASC
            "#,
        )
        .bind(item)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---
    // Escrita
    // ---

    /// Serializa as checagens de estoque de um item até o fim da transação.
    pub async fn lock_item<'e, E>(&self, executor: E, item: ContainerItem) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let key = match item {
            ContainerItem::Water => "container:water",
            ContainerItem::Gas => "container:gas",
        };
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn insert_movement<'e, E>(&self, executor: E, m: &NewMovement) -> Result<ContainerMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ContainerMovement>(
            r#"
            INSERT INTO container_movements (
                item_type, unit_id, unit_name, unit_type, kind, quantity,
                movement_date, unit_responsible, warehouse_responsible
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(m.item_type)
        .bind(m.unit_id)
        .bind(&m.unit_name)
        .bind(&m.unit_type)
        .bind(m.kind)
        .bind(m.quantity)
        .bind(m.movement_date)
        .bind(&m.unit_responsible)
        .bind(&m.warehouse_responsible)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_entry<'e, E>(
        &self,
        executor: E,
        item: ContainerItem,
        kind: StockEntryKind,
        quantity: i32,
        entry_date: NaiveDate,
        responsible: &str,
        invoice: &str,
    ) -> Result<StockEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StockEntry>(
            r#"
            INSERT INTO container_stock_entries (item_type, kind, quantity, entry_date, responsible, invoice)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(item)
        .bind(kind)
        .bind(quantity)
        .bind(entry_date)
        .bind(responsible)
        .bind(invoice)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            // Índice parcial: só um estoque inicial por item
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::InitialStockAlreadyDefined;
                }
            }
            e.into()
        })
    }

    pub async fn delete_movement(&self, item: ContainerItem, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM container_movements WHERE id = $1 AND item_type = $2")
            .bind(id)
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_entry(&self, item: ContainerItem, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM container_stock_entries WHERE id = $1 AND item_type = $2")
            .bind(id)
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_unit<'e, E>(&self, executor: E, unit_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM container_movements WHERE unit_id = $1")
            .bind(unit_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
