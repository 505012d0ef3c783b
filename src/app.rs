use axum::{extract::OriginalUri, middleware::from_fn, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, StoreKind};
use crate::database::{DocumentStore, MemoryStore, PostgresStore, Repository, StoreError};
use crate::error::ApiError;
use crate::handlers;
use crate::hooks::HookPipeline;
use crate::middleware::request_time_middleware;
use crate::models::{TOUR_SCHEMA, USER_SCHEMA};
use crate::query::QueryDefaults;

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tours: Repository,
    pub users: Repository,
    pub query_defaults: QueryDefaults,
}

impl AppState {
    /// Repositories over `store` with the standard hook pipeline
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let hooks = Arc::new(HookPipeline::standard());
        Self {
            tours: Repository::new(store.clone(), &TOUR_SCHEMA, hooks.clone()),
            users: Repository::new(store.clone(), &USER_SCHEMA, hooks),
            store,
            query_defaults: QueryDefaults::default(),
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        Self {
            query_defaults: QueryDefaults::from(&config.query),
            ..Self::new(store)
        }
    }
}

/// Open the configured document store
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.database.store {
        StoreKind::Memory => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreKind::Postgres => {
            let url = config.database_url().ok_or(StoreError::ConfigMissing("DATABASE"))?;
            let store = PostgresStore::connect(&url, config.database.max_connections).await?;
            store.migrate(&[&TOUR_SCHEMA, &USER_SCHEMA]).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Full router; request logging and CORS follow the api config
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", api_routes())
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(from_fn(request_time_middleware)))
        .with_state(state);

    if config.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(tour_routes())
        .merge(user_routes())
}

fn tour_routes() -> Router<AppState> {
    use handlers::tours;

    Router::new()
        .route("/tours", get(tours::get_all).post(tours::create))
        .route("/tours/top-5-cheap", get(tours::top_five_cheap))
        .route("/tours/tour-stats", get(tours::stats))
        .route("/tours/monthly-plan/:year", get(tours::monthly_plan))
        .route(
            "/tours/:id",
            get(tours::get).patch(tours::update).delete(tours::delete),
        )
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/users", get(users::get_all).post(users::create))
        .route(
            "/users/:id",
            get(users::get).patch(users::update).delete(users::delete),
        )
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri))
}
