use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod password;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
