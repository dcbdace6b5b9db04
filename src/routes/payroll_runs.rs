// src/routes/payroll_runs.rs
//
// Thin HTTP layer over the payroll engine: create a run for a month, read it
// back with lines and summary, and drive the draft → confirmed → paid
// lifecycle.

use axum::http::StatusCode;
use axum::{extract::{Path, Query, State}, Json};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::payroll::error::PayrollError;
use crate::payroll::run::{PayrollEngine, PayrollRun, RunDetail, RunListEntry};
use crate::payroll::store::PgPayrollStore;
use crate::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRunBody {
    pub facility_id: i64,
    /// Target month as "YYYY-MM".
    pub period: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ConfirmBody {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQ {
    pub facility_id: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn engine(state: &AppState) -> PayrollEngine<PgPayrollStore> {
    PayrollEngine::new(PgPayrollStore::new(state.pool.clone()))
}

fn parse_period(s: &str) -> Result<(i32, u32), String> {
    let first = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| format!("invalid period '{s}', expected YYYY-MM"))?;
    Ok((first.year(), first.month()))
}

fn payroll_error(e: PayrollError) -> (StatusCode, String) {
    let status = match &e {
        PayrollError::RunNotFound(_) => StatusCode::NOT_FOUND,
        PayrollError::InvalidPeriod { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PayrollError::InvalidTransition { .. } => StatusCode::CONFLICT,
        PayrollError::DuplicateActiveRun { .. } => StatusCode::CONFLICT,
        PayrollError::Store(_) => {
            tracing::error!(error = %e, "payroll store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/payroll-runs
pub async fn create_run(
    State(state): State<AppState>,
    Json(b): Json<CreateRunBody>,
) -> Result<Json<RunDetail>, (StatusCode, String)> {
    let (year, month) =
        parse_period(&b.period).map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let detail = engine(&state)
        .create_run(b.facility_id, year, month, b.notes)
        .await
        .map_err(payroll_error)?;
    Ok(Json(detail))
}

/// GET /api/v1/payroll-runs?facility_id=
pub async fn list_runs(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<RunListEntry>>, (StatusCode, String)> {
    let entries = engine(&state).list_runs(q.facility_id).await.map_err(payroll_error)?;
    Ok(Json(entries))
}

/// GET /api/v1/payroll-runs/:id
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RunDetail>, (StatusCode, String)> {
    let detail = engine(&state).get_run(id).await.map_err(payroll_error)?;
    Ok(Json(detail))
}

/// POST /api/v1/payroll-runs/:id/confirm
pub async fn confirm_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<ConfirmBody>>,
) -> Result<Json<PayrollRun>, (StatusCode, String)> {
    let notes = body.and_then(|Json(b)| b.notes);
    let run = engine(&state).confirm_run(id, notes).await.map_err(payroll_error)?;
    Ok(Json(run))
}

/// POST /api/v1/payroll-runs/:id/pay
pub async fn pay_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PayrollRun>, (StatusCode, String)> {
    let run = engine(&state).mark_paid(id).await.map_err(payroll_error)?;
    Ok(Json(run))
}
