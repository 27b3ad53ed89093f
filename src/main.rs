//! YelpCamp Backend
//!
//! Campground listings with geocoded locations, photo uploads and reviews,
//! backed by SQLite and cookie sessions.

mod api;
mod auth;
mod config;
mod db;
mod enrich;
mod errors;
mod middleware;
mod models;
mod policy;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    routing::{delete, get, post},
    Router, ServiceExt,
};
use tower::util::{MapRequest, MapRequestLayer};
use tower::Layer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;
use enrich::{
    CloudinaryStore, DiskMediaStore, Enricher, Geocoder, MapboxGeocoder, MediaStore,
    UnconfiguredGeocoder,
};

pub const SESSION_COOKIE: &str = "yelpcamp.sid";

/// Route the disk media store is served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Request body cap, sized for a handful of photos per form.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub enricher: Enricher,
    pub config: Arc<Config>,
}

/// The router behind the method-override rewrite.
pub type App = MapRequest<Router, fn(Request) -> Request>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config);

    tracing::info!("Starting YelpCamp Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let geocoder: Arc<dyn Geocoder> = match &config.mapbox_token {
        Some(token) => Arc::new(MapboxGeocoder::new(
            &config.geocoder_base_url,
            token.clone(),
            config.http_timeout,
        )?),
        None => {
            tracing::warn!(
                "No geocoding token configured (YELPCAMP_MAPBOX_TOKEN). Creating campgrounds will fail!"
            );
            Arc::new(UnconfiguredGeocoder)
        }
    };

    let media: Arc<dyn MediaStore> = match &config.cloudinary {
        Some(cloudinary) => Arc::new(CloudinaryStore::new(
            cloudinary.clone(),
            config.http_timeout,
        )?),
        None => {
            tracing::warn!(
                "No Cloudinary credentials configured. Storing uploads in {:?}",
                config.uploads_dir
            );
            Arc::new(DiskMediaStore::new(&config.uploads_dir, UPLOADS_ROUTE))
        }
    };

    let state = AppState {
        repo,
        enricher: Enricher::new(geocoder, media),
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// The full service. Method override has to run before routing, so it wraps
/// the router instead of being one of its layers.
pub fn app(state: AppState) -> App {
    let rewrite: fn(Request) -> Request = middleware::method_override;
    MapRequestLayer::new(rewrite).layer(create_router(state))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(7)));

    let uploads = ServeDir::new(&state.config.uploads_dir);

    Router::new()
        .route("/", get(api::home))
        // Campgrounds
        .route(
            "/campgrounds",
            get(api::list_campgrounds).post(api::create_campground),
        )
        .route("/campgrounds/new", get(api::new_campground_form))
        .route(
            "/campgrounds/{id}",
            get(api::show_campground)
                .put(api::update_campground)
                .delete(api::delete_campground),
        )
        .route("/campgrounds/{id}/edit", get(api::edit_campground_form))
        // Reviews
        .route("/campgrounds/{id}/reviews", post(api::create_review))
        .route(
            "/campgrounds/{id}/reviews/{review_id}",
            delete(api::delete_review),
        )
        // Users
        .route("/register", get(api::register_form).post(api::register))
        .route("/login", get(api::login_form).post(api::login))
        .route("/logout", get(api::logout))
        .route("/health", get(api::health_check))
        .nest_service(UPLOADS_ROUTE, uploads)
        .fallback(api::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::apply_session_effects))
        .layer(sessions)
        .layer(CatchPanicLayer::custom(middleware::handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
