// src/db/social_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::social::{NewSocialMovement, SocialItem, SocialMovement, SocialStockEntry},
};

#[derive(Clone)]
pub struct SocialRepository {
    pool: PgPool,
}

impl SocialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // --- Funções de "Leitura" ---

    pub async fn list_movements(&self, item: SocialItem) -> Result<Vec<SocialMovement>, AppError> {
        let rows = sqlx::query_as::<_, SocialMovement>(
            "SELECT * FROM social_movements WHERE item = $1 ORDER BY movement_date DESC, recorded_at DESC",
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_entries(&self, item: SocialItem) -> Result<Vec<SocialStockEntry>, AppError> {
        let rows = sqlx::query_as::<_, SocialStockEntry>(
            "SELECT * FROM social_stock_entries WHERE item = $1 ORDER BY entry_date DESC, recorded_at DESC",
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// (entradas, saídas) do item.
    pub async fn stock_totals<'e, E>(&self, executor: E, item: SocialItem) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE((SELECT SUM(quantity) FROM social_stock_entries WHERE item = $1), 0)::BIGINT,
                COALESCE((SELECT SUM(quantity) FROM social_movements WHERE item = $1), 0)::BIGINT
            "#,
        )
        .bind(item)
        .fetch_one(executor)
        .await?;
        Ok(totals)
    }

    pub async fn outflows_between(
        &self,
        item: SocialItem,
        from: NaiveDate,
        to: NaiveDate,
        category: Option<&str>,
    ) -> Result<Vec<SocialMovement>, AppError> {
        let rows = sqlx::query_as::<_, SocialMovement>(
            r#"
            SELECT * FROM social_movements
            WHERE item = $1 AND movement_date BETWEEN $2 AND $3
              AND ($4::TEXT IS NULL OR category = $4)
            ORDER BY movement_date ASC
            "#,
        )
        .bind(item)
        .bind(from)
        .bind(to)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // --- Funções de "Escrita" ---

    pub async fn lock_item<'e, E>(&self, executor: E, item: SocialItem) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let key = match item {
            SocialItem::Basket => "social:basket",
            SocialItem::Kit => "social:kit",
        };
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn insert_movement<'e, E>(&self, executor: E, m: &NewSocialMovement) -> Result<SocialMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, SocialMovement>(
            r#"
            INSERT INTO social_movements (
                item, movement_date, recipient, unit_id, quantity, measure_unit,
                category, notes, memo, cost, supplier, responsible
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(m.item)
        .bind(m.movement_date)
        .bind(&m.recipient)
        .bind(m.unit_id)
        .bind(m.quantity)
        .bind(&m.measure_unit)
        .bind(&m.category)
        .bind(&m.notes)
        .bind(&m.memo)
        .bind(m.cost)
        .bind(&m.supplier)
        .bind(&m.responsible)
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_entry(
        &self,
        item: SocialItem,
        quantity: i32,
        entry_date: NaiveDate,
        responsible: &str,
        invoice: &str,
        unit_cost: Option<Decimal>,
        supplier: Option<&str>,
    ) -> Result<SocialStockEntry, AppError> {
        let row = sqlx::query_as::<_, SocialStockEntry>(
            r#"
            INSERT INTO social_stock_entries (item, quantity, entry_date, responsible, invoice, unit_cost, supplier)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(item)
        .bind(quantity)
        .bind(entry_date)
        .bind(responsible)
        .bind(invoice)
        .bind(unit_cost)
        .bind(supplier)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_recipient(
        &self,
        item: SocialItem,
        id: Uuid,
        recipient: &str,
    ) -> Result<Option<SocialMovement>, AppError> {
        let row = sqlx::query_as::<_, SocialMovement>(
            "UPDATE social_movements SET recipient = $3 WHERE id = $1 AND item = $2 RETURNING *",
        )
        .bind(id)
        .bind(item)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_movement(&self, item: SocialItem, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM social_movements WHERE id = $1 AND item = $2")
            .bind(id)
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_entry(&self, item: SocialItem, id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM social_stock_entries WHERE id = $1 AND item = $2")
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
        let result = sqlx::query("DELETE FROM social_movements WHERE unit_id = $1")
            .bind(unit_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
