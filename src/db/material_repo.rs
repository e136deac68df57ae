// src/db/material_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::materials::{DownloadState, MaterialRequest, MaterialStatus},
};

/// Dados já validados para inserir uma solicitação.
#[derive(Debug, Clone)]
pub struct MaterialInsert<'a> {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub unit_name: &'a str,
    pub unit_type: &'a str,
    pub material_type: &'a str,
    pub items: Option<&'a str>,
    pub requested_by: &'a str,
    pub requested_at: NaiveDate,
    pub file_url: Option<&'a str>,
    pub storage_path: Option<&'a str>,
}

#[derive(Clone)]
pub struct MaterialRepository {
    pool: PgPool,
}

impl MaterialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<MaterialRequest>, AppError> {
        let rows = sqlx::query_as::<_, MaterialRequest>(
            "SELECT * FROM material_requests ORDER BY requested_at DESC, recorded_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Solicitações ainda não entregues, da mais antiga para a mais nova.
    pub async fn list_open(&self, status: Option<MaterialStatus>) -> Result<Vec<MaterialRequest>, AppError> {
        let rows = sqlx::query_as::<_, MaterialRequest>(
            r#"
            SELECT * FROM material_requests
            WHERE status <> 'delivered'
              AND ($1::material_status IS NULL OR status = $1)
            ORDER BY requested_at ASC, recorded_at ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<MaterialRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, MaterialRequest>("SELECT * FROM material_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Igual a `find_by_id`, mas trava a linha até o fim da transação.
    pub async fn find_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<MaterialRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, MaterialRequest>(
            "SELECT * FROM material_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn create(&self, new: &MaterialInsert<'_>) -> Result<MaterialRequest, AppError> {
        let row = sqlx::query_as::<_, MaterialRequest>(
            r#"
            INSERT INTO material_requests (
                id, unit_id, unit_name, unit_type, material_type, items,
                status, requested_by, requested_at, file_url, storage_path
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'requested', $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.unit_id)
        .bind(new.unit_name)
        .bind(new.unit_type)
        .bind(new.material_type)
        .bind(new.items)
        .bind(new.requested_by)
        .bind(new.requested_at)
        .bind(new.file_url)
        .bind(new.storage_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ---
    // Transições: o WHERE status = ... garante que duas chamadas concorrentes
    // não avancem a mesma solicitação duas vezes.
    // ---

    pub async fn start_separation(&self, id: Uuid, separator: &str) -> Result<Option<MaterialRequest>, AppError> {
        let row = sqlx::query_as::<_, MaterialRequest>(
            r#"
            UPDATE material_requests
            SET status = 'in_separation', separator = $2, separation_started_at = NOW()
            WHERE id = $1 AND status = 'requested'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(separator)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn mark_ready(&self, id: Uuid) -> Result<Option<MaterialRequest>, AppError> {
        let row = sqlx::query_as::<_, MaterialRequest>(
            r#"
            UPDATE material_requests
            SET status = 'ready_for_pickup', ready_at = NOW()
            WHERE id = $1 AND status = 'in_separation'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Entrega também desvincula o anexo; o arquivo é apagado pelo serviço.
    pub async fn deliver(&self, id: Uuid, deliverer: &str, receiver: &str) -> Result<Option<MaterialRequest>, AppError> {
        let row = sqlx::query_as::<_, MaterialRequest>(
            r#"
            UPDATE material_requests
            SET status = 'delivered', deliverer = $2, receiver = $3, delivered_at = NOW(),
                file_url = NULL, storage_path = NULL
            WHERE id = $1 AND status = 'ready_for_pickup'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(deliverer)
        .bind(receiver)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn record_download<'e, E>(&self, executor: E, id: Uuid, state: &DownloadState) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE material_requests
            SET download_count = $2, last_download_at = $3, blocked_until = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(state.count)
        .bind(state.last_download_at)
        .bind(state.blocked_until)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Remove a solicitação e devolve o caminho do anexo, se havia um.
    pub async fn delete(&self, id: Uuid) -> Result<Option<Option<String>>, AppError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("DELETE FROM material_requests WHERE id = $1 RETURNING storage_path")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(path,)| path))
    }

    pub async fn delete_for_unit<'e, E>(&self, executor: E, unit_id: Uuid) -> Result<Vec<Option<String>>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows: Vec<(Option<String>,)> =
            sqlx::query_as("DELETE FROM material_requests WHERE unit_id = $1 RETURNING storage_path")
                .bind(unit_id)
                .fetch_all(executor)
                .await?;
        Ok(rows.into_iter().map(|(path,)| path).collect())
    }
}
