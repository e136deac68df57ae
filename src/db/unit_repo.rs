// src/db/unit_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::units::{Unit, UpdateUnitPayload},
};

#[derive(Clone)]
pub struct UnitRepository {
    pool: PgPool,
}

impl UnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Unit>, AppError> {
        let units = sqlx::query_as::<_, Unit>("SELECT * FROM units ORDER BY unit_type ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(units)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Unit>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let unit = sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(unit)
    }

    pub async fn create<'e, E>(&self, executor: E, name: &str, unit_type: &str) -> Result<Unit, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let unit = sqlx::query_as::<_, Unit>(
            "INSERT INTO units (name, unit_type) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(unit_type)
        .fetch_one(executor)
        .await?;
        Ok(unit)
    }

    // COALESCE mantém o valor atual quando o campo não veio no payload
    pub async fn update(&self, id: Uuid, changes: &UpdateUnitPayload) -> Result<Option<Unit>, AppError> {
        let unit = sqlx::query_as::<_, Unit>(
            r#"
            UPDATE units SET
                name = COALESCE($2, name),
                serves_water = COALESCE($3, serves_water),
                serves_gas = COALESCE($4, serves_gas),
                serves_materials = COALESCE($5, serves_materials)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.serves_water)
        .bind(changes.serves_gas)
        .bind(changes.serves_materials)
        .fetch_optional(&self.pool)
        .await?;
        Ok(unit)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM units WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
