use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/cell/cycle", post(handlers::cycle_cell_form))
        .route("/cell/clear", post(handlers::clear_cell_form))
        .route("/month/clear", post(handlers::clear_month_form))
        .route("/month/navigate", post(handlers::navigate_form))
        .route("/cloud/save", post(handlers::cloud_save_form))
        .route("/cloud/load", post(handlers::cloud_load_form))
        .route("/title", post(handlers::set_title_form))
        .route("/habits", post(handlers::add_habit_form))
        .route("/habits/:id", post(handlers::update_habit_form))
        .route("/habits/:id/remove", post(handlers::remove_habit_form))
        .route("/auth/link", post(handlers::send_sign_in_link_form))
        .route("/auth/sign-out", post(handlers::sign_out_form))
        .route("/api/month", get(handlers::get_month))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/title", put(handlers::set_title))
        .route("/api/cells", post(handlers::set_cell))
        .route("/api/cells/cycle", post(handlers::cycle_cell))
        .route("/api/month/clear", post(handlers::clear_month))
        .route("/api/habits", post(handlers::add_habit))
        .route(
            "/api/habits/:id",
            patch(handlers::update_habit).delete(handlers::remove_habit),
        )
        .route("/api/navigate", post(handlers::navigate))
        .route("/api/export", get(handlers::export_month))
        .route("/api/import", post(handlers::import_month))
        .route("/api/cloud/save", post(handlers::cloud_save))
        .route("/api/cloud/load", post(handlers::cloud_load))
        .route("/api/auth", get(handlers::get_auth))
        .route("/api/auth/link", post(handlers::send_sign_in_link))
        .route("/api/auth/session", post(handlers::complete_sign_in))
        .route("/api/auth/sign-out", post(handlers::sign_out))
        .with_state(state)
}
