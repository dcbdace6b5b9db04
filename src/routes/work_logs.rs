// src/routes/work_logs.rs
//
// Staff-entered piece-work records. Rows stay editable until a confirmed
// payroll line covers them; after that the figures are part of historical pay.

use axum::http::StatusCode;
use axum::{extract::{Path, Query, State}, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{query, query_as, query_scalar, PgPool};
use crate::{AppState, models::{UpsertCount, WorkLog}};
use super::{internal_error, not_found};

#[derive(Deserialize)]
pub struct WorkLogItem {
    pub client_id: i64,
    pub day: NaiveDate,
    pub work_type: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQ {
    pub client_id: i64,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// True once a confirmed or paid run has a line for this client whose period
/// covers the day.
async fn covered_by_confirmed_line(
    pool: &PgPool,
    client_id: i64,
    day: NaiveDate,
) -> Result<bool, sqlx::Error> {
    query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM public.payroll_lines l
            JOIN public.payroll_runs r ON r.payroll_run_id = l.payroll_run_id
            WHERE l.client_id=$1
              AND r.status IN ('confirmed','paid')
              AND $2 BETWEEN r.period_start AND r.period_end
        )
        "#,
    )
    .bind(client_id)
    .bind(day)
    .fetch_one(pool)
    .await
}

pub async fn bulk_upsert_work_logs(
    State(state): State<AppState>,
    Json(items): Json<Vec<WorkLogItem>>,
) -> Result<Json<UpsertCount>, (StatusCode, String)> {
    for it in &items {
        if it.work_type.trim().is_empty() {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("work_type must not be empty (client {}, {})", it.client_id, it.day),
            ));
        }
        if it.quantity.is_some_and(|q| q < Decimal::ZERO) {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("quantity must not be negative (client {}, {})", it.client_id, it.day),
            ));
        }
        if covered_by_confirmed_line(&state.pool, it.client_id, it.day)
            .await
            .map_err(internal_error)?
        {
            return Err((
                StatusCode::CONFLICT,
                format!(
                    "client {} on {} is covered by a confirmed payroll run",
                    it.client_id, it.day
                ),
            ));
        }
    }

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    for it in &items {
        query(
            r#"
            INSERT INTO public.work_logs(client_id, day, work_type, quantity, unit)
            VALUES ($1,$2,$3,$4,$5)
            ON CONFLICT (client_id, day, work_type)
            DO UPDATE SET quantity = EXCLUDED.quantity,
                          unit = EXCLUDED.unit
            "#
        )
        .bind(it.client_id)
        .bind(it.day)
        .bind(it.work_type.trim())
        .bind(it.quantity)
        .bind(&it.unit)
        .execute(&mut *tx).await.map_err(internal_error)?;
    }
    tx.commit().await.map_err(internal_error)?;
    Ok(Json(UpsertCount { upserted: items.len() }))
}

pub async fn list_work_logs(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<WorkLog>>, (StatusCode, String)> {
    let rows = query_as::<_, WorkLog>(
        r#"
        SELECT * FROM public.work_logs
        WHERE client_id=$1
          AND ($2::date IS NULL OR day >= $2)
          AND ($3::date IS NULL OR day <= $3)
        ORDER BY day, work_type
        "#
    )
    .bind(q.client_id).bind(q.from).bind(q.to)
    .fetch_all(&state.pool).await.map_err(internal_error)?;
    Ok(Json(rows))
}

pub async fn delete_work_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let log = query_as::<_, WorkLog>(r#"SELECT * FROM public.work_logs WHERE work_log_id=$1"#)
        .bind(id)
        .fetch_optional(&state.pool).await.map_err(internal_error)?
        .ok_or_else(|| not_found("work log", id))?;

    if covered_by_confirmed_line(&state.pool, log.client_id, log.day)
        .await
        .map_err(internal_error)?
    {
        return Err((
            StatusCode::CONFLICT,
            format!("work log {id} is covered by a confirmed payroll run"),
        ));
    }

    let res = query(r#"DELETE FROM public.work_logs WHERE work_log_id=$1"#)
        .bind(id).execute(&state.pool).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}
