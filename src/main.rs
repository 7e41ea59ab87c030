mod allocator;
mod auth;
mod config;
mod error;
mod model;
mod routes;
mod shortener;
mod store;
mod validator;

use auth::auth;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{serve, Router};
use config::{Config, StoreBackend};
use dotenvy::dotenv;
use routes::{create_short_url, health, list_all, redirect, AppState};
use shortener::Shortener;
use std::path::Path;
use std::sync::Arc;
use store::memory::MemoryStore;
use store::postgres::PgStore;
use store::MappingStore;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use validator::UrlValidator;

const DEFAULT_TRACING_LEVEL: &str = "url_shortener=debug,tower_http=info";

#[tokio::main]
async fn main() {
    _ = dotenv();
    configure_tracing();
    let config = Config::from_env().expect("Reading configuration failed");
    let store = create_store(&config).await;
    let validator = UrlValidator::new(config.require_resolvable_host, config.scheme_case_sensitive);
    let state = AppState::new(
        Shortener::new(store, validator),
        config.encrypted_api_key.clone(),
    );
    let listener = create_listener(&config.server_address).await;
    let router = create_router(state, &config.public_dir);
    serve(listener, router)
        .await
        .expect("Server failed to start");
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_store(config: &Config) -> Arc<dyn MappingStore> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, mappings are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(
                &config.database_url,
                config.database_max_connections,
                config.database_timeout_ms,
            )
            .await
            .expect("Creating database connection pool failed");
            store
                .init_schema()
                .await
                .expect("Creating database schema failed");
            Arc::new(store)
        }
    }
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(&server_address)
        .await
        .expect("Creating tcp listener failed");
    tracing::info!("Listening on address: {}", server_address);
    listener
}

fn create_router(state: AppState, public_dir: &Path) -> Router {
    Router::new()
        .route("/api/shorturl", post(create_short_url))
        .route("/api/shorturl/:code", get(redirect))
        .route(
            "/api/all",
            get(list_all).route_layer(from_fn_with_state(state.clone(), auth)),
        )
        .route("/health", get(health))
        .fallback_service(ServeDir::new(public_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
