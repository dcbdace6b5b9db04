// src/main.rs

use std::env;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::{Pool, Postgres};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod db;
mod models;
mod payroll;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize DB pool
    let pool = db::connect().await?;
    let state = AppState { pool };

    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Root API router
    let api = Router::new()
        // health
        .route("/health", get(routes::health::health))
        // facilities
        .route(
            "/api/v1/facilities",
            post(routes::facilities::create_facility).get(routes::facilities::list_facilities),
        )
        .route(
            "/api/v1/facilities/:id",
            get(routes::facilities::get_facility).patch(routes::facilities::patch_facility),
        )
        // clients
        .route(
            "/api/v1/facilities/:facility_id/clients",
            post(routes::clients::create_client).get(routes::clients::list_clients_by_facility),
        )
        .route(
            "/api/v1/clients/:id",
            get(routes::clients::get_client).patch(routes::clients::patch_client),
        )
        // wage rules
        .route(
            "/api/v1/facilities/:facility_id/wage-rules",
            post(routes::wage_rules::create_wage_rule).get(routes::wage_rules::list_wage_rules),
        )
        .route(
            "/api/v1/wage-rules/:id",
            get(routes::wage_rules::get_wage_rule)
                .patch(routes::wage_rules::patch_wage_rule)
                .delete(routes::wage_rules::delete_wage_rule),
        )
        // attendance (pushed by the attendance workflow)
        .route(
            "/api/v1/clients/:client_id/attendance/bulk",
            put(routes::attendance::bulk_upsert_attendance),
        )
        .route(
            "/api/v1/clients/:client_id/attendance",
            get(routes::attendance::list_attendance),
        )
        // work logs
        .route(
            "/api/v1/work-logs/bulk",
            post(routes::work_logs::bulk_upsert_work_logs),
        )
        .route("/api/v1/work-logs", get(routes::work_logs::list_work_logs))
        .route("/api/v1/work-logs/:id", delete(routes::work_logs::delete_work_log))
        // payroll runs (+ lifecycle actions)
        .route(
            "/api/v1/payroll-runs",
            post(routes::payroll_runs::create_run).get(routes::payroll_runs::list_runs),
        )
        .route("/api/v1/payroll-runs/:id", get(routes::payroll_runs::get_run))
        .route(
            "/api/v1/payroll-runs/:id/confirm",
            post(routes::payroll_runs::confirm_run),
        )
        .route("/api/v1/payroll-runs/:id/pay", post(routes::payroll_runs::pay_run))
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Port (axum 0.7 style)
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080); // default 8080

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("API listening on http://127.0.0.1:{port}");

    axum::serve(listener, api.into_make_service()).await?;
    Ok(())
}
