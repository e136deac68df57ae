//src/main.rs

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::middleware::auth::auth_guard;
use crate::services::sync::Collection;

// Folga para os campos de texto do formulário multipart
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        app_state.auth_service.ensure_admin(email, password).await?;
    }

    // Primeira fotografia de cada coleção
    app_state.sync.refresh_many(&Collection::ALL).await;

    // Rotas públicas de sessão
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/anonymous", post(handlers::auth::anonymous))
        .route("/custom-token", post(handlers::auth::custom_token));

    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/"
               ,get(handlers::users::list_users)
               .post(handlers::users::create_user)
        )
        .route("/{id}/role", put(handlers::users::change_role));

    let unit_routes = Router::new()
        .route("/"
               ,get(handlers::units::list_units)
               .post(handlers::units::create_unit)
        )
        .route("/bulk", post(handlers::units::bulk_add_units))
        .route("/{id}"
               ,patch(handlers::units::update_unit)
               .delete(handlers::units::delete_unit)
        );

    let container_routes = Router::new()
        .route("/{item}/stock", get(handlers::containers::get_stock))
        .route("/{item}/stock/initial", post(handlers::containers::set_initial_stock))
        .route("/{item}/stock/inflow", post(handlers::containers::add_inflow))
        .route("/{item}/stock/entries", get(handlers::containers::list_entries))
        .route("/{item}/stock/entries/{id}", delete(handlers::containers::delete_entry))
        .route("/{item}/movements"
               ,get(handlers::containers::list_movements)
               .post(handlers::containers::commit_movement)
        )
        .route("/{item}/movements/prepare", post(handlers::containers::prepare_movement))
        .route("/{item}/movements/{id}", delete(handlers::containers::delete_movement))
        .route("/{item}/balances", get(handlers::containers::list_balances))
        .route("/{item}/balances/{unit_id}", get(handlers::containers::unit_balance))
        .route("/{item}/forecast", post(handlers::containers::forecast))
        .route("/{item}/analysis", post(handlers::containers::analysis))
        .route("/{item}/report", get(handlers::containers::supply_report))
        .route("/{item}/report.pdf", get(handlers::containers::supply_report_pdf));

    let max_body = (config.max_attachment_bytes + MULTIPART_OVERHEAD) as usize;
    let material_routes = Router::new()
        .route("/"
               ,get(handlers::materials::get_board)
               .post(handlers::materials::create_request)
        )
        .route("/{id}", delete(handlers::materials::delete_request))
        .route("/{id}/start-separation", post(handlers::materials::start_separation))
        .route("/{id}/ready", post(handlers::materials::mark_ready))
        .route("/{id}/deliver", post(handlers::materials::deliver))
        .route("/{id}/attachment", get(handlers::materials::download_attachment))
        .layer(DefaultBodyLimit::max(max_body));

    let social_routes = Router::new()
        .route("/import", post(handlers::social::import))
        .route("/{item}/stock", get(handlers::social::get_stock))
        .route("/{item}/stock/entries"
               ,get(handlers::social::list_entries)
               .post(handlers::social::add_entry)
        )
        .route("/{item}/stock/entries/{id}", delete(handlers::social::delete_entry))
        .route("/{item}/movements"
               ,get(handlers::social::list_movements)
               .post(handlers::social::register_outflow)
        )
        .route("/{item}/movements/{id}", delete(handlers::social::delete_movement))
        .route("/{item}/movements/{id}/recipient", patch(handlers::social::update_recipient))
        .route("/{item}/report", get(handlers::social::category_report));

    let dashboard_routes = Router::new()
        .route("/summary", get(handlers::dashboard::get_summary))
        .route("/chart/{item}", get(handlers::dashboard::get_chart))
        .route("/materials", get(handlers::dashboard::get_pending_materials));

    let sync_routes = Router::new()
        .route("/{collection}", get(handlers::sync::poll_collection));

    // Tudo abaixo de /api, exceto health e login, passa pelo auth_guard
    let protected = Router::new()
        .nest("/users", user_routes)
        .nest("/units", unit_routes)
        .nest("/containers", container_routes)
        .nest("/materials", material_routes)
        .nest("/social", social_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/sync", sync_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
