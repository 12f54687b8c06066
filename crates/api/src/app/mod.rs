//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the store and the engines built on it
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/path parameters and their mapping to service arguments
//! - `errors.rs`: the `{success, data}` / `{success, error}` envelope

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use millerp_infra::InMemoryWarehouseStore;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
pub fn build_app(store: Arc<InMemoryWarehouseStore>) -> Router {
    let services = Arc::new(services::AppServices::new(store));

    // Protected routes: require an actor.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
