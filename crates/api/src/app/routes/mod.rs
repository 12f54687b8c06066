use axum::Router;

pub mod inbound;
pub mod journal;
pub mod outbound;
pub mod stock;
pub mod system;

/// Router for all actor-attributed endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/outbound", outbound::router())
        .nest("/inbound", inbound::router())
        .nest("/stock", stock::router())
        .nest("/journal", journal::router())
}
