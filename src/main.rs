//! Outreach Backend
//!
//! A REST backend for student pairing and outreach team formation, with SQLite
//! persistence and on-disk mission materials.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod export;
mod models;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use storage::MaterialStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub store: Arc<MaterialStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Outreach Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Upload directory: {:?}", config.upload_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database and material store
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let store = Arc::new(MaterialStore::open(&config.upload_dir).await?);

    if config.create_admin {
        match &config.admin_password {
            Some(password) => {
                if repo.ensure_admin(&auth::hash_password(password)?).await? {
                    tracing::info!("Created bootstrap admin account 'admin'");
                }
            }
            None => tracing::warn!(
                "OUTREACH_CREATE_ADMIN is set but OUTREACH_ADMIN_PASSWORD is not. Skipping admin bootstrap."
            ),
        }
    }

    let state = AppState {
        repo,
        store,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    // Routes reachable without a session
    let public_routes = Router::new()
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login));

    let session_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/me", get(api::me))
        // Student
        .route("/student/dashboard", get(api::student_dashboard))
        .route("/student/team", get(api::my_team))
        .route("/requests", post(api::send_request))
        .route("/requests/{id}/accept", post(api::accept_request))
        .route("/requests/{id}", delete(api::decline_request))
        .route("/teams/{id}/material", get(api::download_material))
        // Admin
        .route("/admin/dashboard", get(api::admin_dashboard))
        .route("/admin/students", get(api::list_students))
        .route("/admin/users", post(api::enroll_user))
        .route("/admin/users/{id}", delete(api::delete_user))
        .route("/admin/users/{id}/reset-password", post(api::reset_password))
        .route("/admin/users/{id}/unpair", post(api::unpair_user))
        .route("/admin/pairs", get(api::list_pairs))
        .route("/admin/teams", get(api::list_teams).post(api::create_team))
        .route("/admin/teams/{id}", delete(api::disband_team))
        .route(
            "/admin/teams/{id}/mission",
            put(api::assign_mission).layer(upload_limit),
        )
        .route("/admin/export/students", get(api::export_students))
        .route("/admin/export/teams", get(api::export_teams))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth_layer,
        ));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(session_routes))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
