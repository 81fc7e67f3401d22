//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: job store, blob namespace, dispatcher, processor
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    routing::get,
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use reclaim_auth::{CallerResolver, Hs256TokenValidator};

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, StartupError};

/// Build the full HTTP router from configuration (used by `main.rs`).
pub async fn build_app(config: &Config) -> Result<Router, StartupError> {
    let services = services::build_services(config).await?;
    Ok(build_app_with_services(Arc::new(services), resolver(config)))
}

pub fn resolver(config: &Config) -> CallerResolver {
    CallerResolver::new(
        config.service_role_key.clone(),
        Arc::new(Hs256TokenValidator::new(config.jwt_secret.as_bytes())),
    )
}

/// Build the router around already-wired services.
pub fn build_app_with_services(services: Arc<AppServices>, resolver: CallerResolver) -> Router {
    let auth_state = middleware::AuthState { resolver };

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors()),
        )
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}
