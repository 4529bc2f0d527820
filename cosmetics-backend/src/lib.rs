mod auth;
pub mod cache;
pub mod config;
mod error;
mod routes;
pub mod validation;

pub use error::{AppError, ErrorResponse};

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{MethodRouter, delete, get, post},
};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::cache::SnapshotCache;
use crate::config::Config;

pub struct AppState {
    pub db: cosmetics_db::Database,
    /// Snapshot backing `GET /`
    pub entries: SnapshotCache,
    api_token_hash: String,
}

impl AppState {
    pub fn new(db: cosmetics_db::Database, config: &Config) -> Self {
        Self {
            db,
            entries: SnapshotCache::new(config.entries_cache_ttl),
            api_token_hash: auth::hash_token(&config.api_token),
        }
    }

    /// An empty configured token never matches.
    pub(crate) fn token_matches(&self, token: &str) -> bool {
        !token.is_empty() && auth::hash_token(token) == self.api_token_hash
    }
}

/// Create the application router with the given database and configuration
pub fn create_app(db: cosmetics_db::Database, config: &Config) -> Router {
    let state = Arc::new(AppState::new(db, config));

    // Attach the token check to every method already on `router`. Methods
    // that aren't routed still get a plain 405.
    let authenticated = |router: MethodRouter<Arc<AppState>>| {
        router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
    };

    let api = Router::new()
        .route("/", get(routes::get_entries))
        .route(
            "/cosmetics",
            authenticated(
                post(routes::create_cosmetic_from_body)
                    .put(routes::upsert_cosmetic_from_body)
                    .patch(routes::update_cosmetic_from_body)
                    .delete(routes::delete_cosmetic_from_body),
            ),
        )
        .route("/cosmetics/ids", get(routes::list_cosmetic_ids))
        .route(
            "/cosmetics/{cosmetic_id}",
            get(routes::get_cosmetic).merge(authenticated(
                post(routes::create_cosmetic)
                    .put(routes::upsert_cosmetic)
                    .patch(routes::update_cosmetic)
                    .delete(routes::delete_cosmetic),
            )),
        )
        .route("/players/ids", get(routes::list_player_ids))
        .route(
            "/players/{uuid}",
            get(routes::get_player).merge(authenticated(delete(routes::delete_player))),
        )
        .route(
            "/players/{uuid}/data",
            get(routes::get_player_data).post(routes::set_player_data),
        )
        .route(
            "/players/{uuid}/cosmetics/{cosmetic_id}",
            post(routes::add_player_cosmetic).delete(routes::remove_player_cosmetic),
        );

    let api = if config.rate_limit_enabled() {
        match GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_period_ms)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
        {
            Some(governor) => api.layer(GovernorLayer::new(governor)),
            None => {
                tracing::warn!("invalid rate limit configuration, rate limiting disabled");
                api
            }
        }
    } else {
        api
    };

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .merge(api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(config.request_body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
