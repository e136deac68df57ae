// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{ContainerRepository, MaterialRepository, SocialRepository, UnitRepository, UserRepository},
    services::{
        auth::AuthService,
        container_service::ContainerService,
        dashboard_service::DashboardService,
        material_service::MaterialService,
        report_service::ReportService,
        social_service::SocialService,
        storage::{BlobStore, LocalBlobStore},
        sync::{SnapshotHub, SyncService},
        unit_service::UnitService,
    },
};

/// Variáveis de ambiente lidas na inicialização (.env aceito).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub session_ttl_hours: i64,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub fonts_dir: PathBuf,
    pub max_attachment_bytes: u64,
    pub sync_wait: Duration,
    pub custom_token_secret: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw.parse().map_err(|e| anyhow::anyhow!("{} inválida ({}): {}", key, raw, e)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            max_connections: var_or("DATABASE_MAX_CONNECTIONS", 5)?,
            session_ttl_hours: var_or("SESSION_TTL_HOURS", 12)?,
            storage_dir: var_or("STORAGE_DIR", PathBuf::from("./storage"))?,
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000".to_string())?,
            fonts_dir: var_or("FONTS_DIR", PathBuf::from("./fonts"))?,
            max_attachment_bytes: var_or("MAX_ATTACHMENT_BYTES", 10 * 1024 * 1024)?,
            sync_wait: Duration::from_secs(var_or("SYNC_WAIT_SECS", 25)?),
            custom_token_secret: optional_var("CUSTOM_TOKEN_SECRET"),
            admin_email: optional_var("ADMIN_EMAIL"),
            admin_password: optional_var("ADMIN_PASSWORD"),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub i18n_store: I18nStore,
    pub sync_wait: Duration,
    pub sync: SyncService,
    pub auth_service: AuthService,
    pub unit_service: UnitService,
    pub container_service: ContainerService,
    pub material_service: MaterialService,
    pub social_service: SocialService,
    pub dashboard_service: DashboardService,
    pub report_service: ReportService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let unit_repo = UnitRepository::new(db_pool.clone());
        let container_repo = ContainerRepository::new(db_pool.clone());
        let material_repo = MaterialRepository::new(db_pool.clone());
        let social_repo = SocialRepository::new(db_pool.clone());

        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.storage_dir));
        let sync = SyncService::new(
            Arc::new(SnapshotHub::new()),
            unit_repo.clone(),
            container_repo.clone(),
            material_repo.clone(),
            social_repo.clone(),
            user_repo.clone(),
        );

        let auth_service = AuthService::new(
            user_repo,
            config.jwt_secret.clone(),
            config.custom_token_secret.clone(),
            config.session_ttl_hours,
        );
        let unit_service = UnitService::new(
            db_pool.clone(),
            unit_repo.clone(),
            container_repo.clone(),
            material_repo.clone(),
            social_repo.clone(),
            blobs.clone(),
            sync.clone(),
        );
        let container_service =
            ContainerService::new(db_pool.clone(), container_repo.clone(), unit_repo.clone(), sync.clone());
        let material_service = MaterialService::new(
            db_pool.clone(),
            material_repo.clone(),
            unit_repo.clone(),
            blobs,
            sync.clone(),
            config.max_attachment_bytes,
            config.public_base_url.clone(),
        );
        let social_service = SocialService::new(db_pool.clone(), social_repo, unit_repo, sync.clone());
        let dashboard_service = DashboardService::new(db_pool.clone(), container_repo, material_repo);

        Ok(Self {
            db_pool,
            i18n_store: I18nStore::new(),
            sync_wait: config.sync_wait,
            sync,
            auth_service,
            unit_service,
            container_service,
            material_service,
            social_service,
            dashboard_service,
            report_service: ReportService::new(&config.fonts_dir),
        })
    }
}
