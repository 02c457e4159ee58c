mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod storage;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::ContentCache;
use crate::config::Config;
use crate::db::Database;
use crate::handlers::catalog;
use crate::models::NewLogEntry;
use crate::services::message::MAX_ATTACHMENTS;
use crate::services::{BookService, EngagementService, LogService, ProductService};
use crate::storage::{LocalStorage, StorageProvider};

/// Files accepted by a single media upload request
const MAX_FILES_PER_UPLOAD: u64 = 10;
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub storage: Arc<dyn StorageProvider>,
    pub cache: Arc<ContentCache>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectern=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lectern...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    tokio::fs::create_dir_all(&config.storage.local_path).await?;
    let storage: Arc<dyn StorageProvider> = Arc::new(LocalStorage::new(
        &config.storage.local_path,
        &config.storage.public_base_url,
    ));
    tracing::info!(
        "Storage backend {} at {}",
        storage.storage_type(),
        config.storage.local_path
    );

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        storage,
        cache: Arc::new(ContentCache::new(Duration::from_secs(config.cache.ttl_secs))),
    };

    spawn_log_pruner(db, config.clone());

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically drop log entries past the retention window
fn spawn_log_pruner(db: Database, config: Arc<Config>) {
    let every = Duration::from_secs(config.logs.prune_interval_hours.max(1) * 3600);
    let retention_days = config.logs.retention_days;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match LogService::prune_older_than(&db, retention_days).await {
                Ok(deleted) if deleted > 0 => {
                    LogService::record(
                        &db,
                        NewLogEntry::system("logs.prune")
                            .details(serde_json::json!({ "deleted": deleted })),
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Log pruning failed: {}", e),
            }
        }
    });
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = &state.config.uploads;
    let media_limit = uploads.max_video_bytes.max(uploads.max_image_bytes) * MAX_FILES_PER_UPLOAD
        + FORM_OVERHEAD_BYTES;
    let contact_limit = uploads.max_attachment_bytes * MAX_ATTACHMENTS as u64 + FORM_OVERHEAD_BYTES;

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh_token))
        .route("/blogs", get(handlers::blog::list_published))
        .route("/blogs/:slug", get(handlers::blog::get_published))
        .route("/tags", get(handlers::tag::list_tags))
        .route("/books", get(catalog::list_published::<BookService>))
        .route("/books/:slug", get(catalog::get_published::<BookService>))
        .route(
            "/engagements",
            get(catalog::list_published::<EngagementService>),
        )
        .route(
            "/engagements/:slug",
            get(catalog::get_published::<EngagementService>),
        )
        .route("/products", get(catalog::list_published::<ProductService>))
        .route(
            "/products/:slug",
            get(catalog::get_published::<ProductService>),
        )
        .route(
            "/contact",
            post(handlers::message::submit_contact)
                .layer(DefaultBodyLimit::max(contact_limit as usize)),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Admin routes
    let admin_routes = Router::new()
        // Blog
        .route(
            "/blogs",
            get(handlers::blog::list_all).post(handlers::blog::create_post),
        )
        .route(
            "/blogs/upload",
            post(handlers::blog::upload_media).layer(DefaultBodyLimit::max(media_limit as usize)),
        )
        .route(
            "/blogs/:id",
            get(handlers::blog::get_post)
                .put(handlers::blog::update_post)
                .patch(handlers::blog::publish_post)
                .delete(handlers::blog::delete_post),
        )
        .route(
            "/blogs/:id/media/reorder",
            put(handlers::blog::reorder_media),
        )
        .route(
            "/blogs/:id/media/:media_id",
            put(handlers::blog::update_media).delete(handlers::blog::delete_media),
        )
        // Catalog
        .merge(catalog_routes::<BookService>("/books"))
        .merge(catalog_routes::<EngagementService>("/engagements"))
        .merge(catalog_routes::<ProductService>("/products"))
        // Tags
        .route("/tags", get(handlers::tag::list_tags))
        .route(
            "/tags/:id",
            put(handlers::tag::update_tag).delete(handlers::tag::delete_tag),
        )
        // Messages
        .route("/messages", get(handlers::message::list_messages))
        .route(
            "/messages/:id",
            get(handlers::message::get_message).delete(handlers::message::delete_message),
        )
        .route(
            "/messages/:id/status",
            patch(handlers::message::update_status),
        )
        .route(
            "/messages/batch/status",
            post(handlers::message::batch_status),
        )
        .route(
            "/messages/batch/delete",
            post(handlers::message::batch_delete),
        )
        .route(
            "/messages/export",
            post(handlers::message::export_messages),
        )
        // Logs
        .route(
            "/logs",
            get(handlers::log::list_logs).delete(handlers::log::prune_logs),
        )
        // Users
        .route("/users", get(handlers::admin::list_users))
        .route("/users/:id/role", put(handlers::admin::update_user_role))
        .route(
            "/users/:id/status",
            put(handlers::admin::update_user_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_middleware,
        ));

    let media = ServeDir::new(&state.config.storage.local_path);

    Router::new()
        .nest(
            "/api",
            public_routes
                .merge(protected_routes)
                .nest("/admin", admin_routes),
        )
        .nest_service("/media", media)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Admin CRUD routes for one catalog type
fn catalog_routes<S: services::CatalogService>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(catalog::list_all::<S>).post(catalog::create_item::<S>))
        .route(
            &format!("{}/:id", base),
            get(catalog::get_item::<S>)
                .put(catalog::update_item::<S>)
                .patch(catalog::publish_item::<S>)
                .delete(catalog::delete_item::<S>),
        )
}
