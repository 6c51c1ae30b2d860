pub mod admin;
pub mod audience;
pub mod callbacks;
pub mod campaigns;
pub mod health;
pub mod templates;

use axum::Router;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(campaigns::router(state.clone()))
        .merge(audience::router(state.clone()))
        .merge(templates::router(state.clone()))
        .merge(callbacks::router(state.clone()))
        .merge(admin::router(state))
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}
