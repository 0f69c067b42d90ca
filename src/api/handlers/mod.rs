//! REST endpoint handlers organized by resource.

pub mod realtime;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all REST routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(system::routes())
        .merge(realtime::routes())
}
