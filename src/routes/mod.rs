use axum::http::StatusCode;

pub mod health;
pub mod facilities;
pub mod clients;
pub mod wage_rules;
pub mod attendance;
pub mod work_logs;
pub mod payroll_runs;

// Common error mappers
pub fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("internal error: {e}"))
}

pub fn not_found(what: &str, id: i64) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} {id} not found"))
}
