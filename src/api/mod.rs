use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::reference::ReferenceLookup;
use crate::services::{AccountAdministrator, Authenticator, CityRegistry, TokenService};
use crate::state::SharedState;

pub mod auth;
mod error;
mod location;
mod observability;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::RwLock;

const GREETING: &str = "Computer says, \"Hello.\"";

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn reference(&self) -> &dyn ReferenceLookup {
        self.shared.reference.as_ref()
    }

    #[must_use]
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.shared.authenticator.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.shared.tokens
    }

    #[must_use]
    pub fn accounts(&self) -> &dyn AccountAdministrator {
        self.shared.accounts.as_ref()
    }

    #[must_use]
    pub fn cities(&self) -> &dyn CityRegistry {
        self.shared.cities.as_ref()
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/", get(root))
        .route("/auth", post(auth::login))
        .route("/metrics", get(observability::get_metrics))
        .merge(create_protected_root(state.clone()))
        .nest("/geolocation", create_geolocation_router(state.clone()))
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers))
        .layer(middleware::from_fn(observability::track_requests))
}

async fn root() -> &'static str {
    GREETING
}

fn create_protected_root(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/protected", get(auth::protected))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token))
}

fn create_geolocation_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    const SUBDIVISION: &str = "/country/{country_alpha2}/subdivision/{subdivision_code}";

    let public = Router::new()
        .route("/country/", get(location::list_countries))
        .route("/country/{country_alpha2}", get(location::get_country))
        .route(
            "/country/{country_alpha2}/subdivision/",
            get(location::list_subdivisions),
        )
        .route(SUBDIVISION, get(location::get_subdivision))
        .route(&format!("{SUBDIVISION}/city/"), get(location::list_cities))
        .route(&format!("{SUBDIVISION}/city/{{id}}"), get(location::get_city));

    let protected = Router::new()
        .route(&format!("{SUBDIVISION}/city/"), post(location::create_city))
        .route(
            &format!("{SUBDIVISION}/city/{{id}}"),
            put(location::update_city).delete(location::delete_city),
        )
        .route("/account/password", put(auth::change_password))
        .route_layer(middleware::from_fn_with_state(state, auth::require_token));

    public.merge(protected)
}
