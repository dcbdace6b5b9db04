// src/routes/attendance.rs
//
// Ingestion point for the attendance workflow: it pushes finalized
// confirmations here, one row per client and day.

use axum::{extract::{Path, Query, State}, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{query, query_as};
use crate::{AppState, models::{AttendanceConfirmation, UpsertCount}};
use crate::payroll::aggregate::AttendanceStatus;
use super::internal_error;

#[derive(Deserialize)]
pub struct AttendanceItem {
    pub day: NaiveDate,
    pub status: String,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct RangeQ {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub async fn bulk_upsert_attendance(
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
    Json(items): Json<Vec<AttendanceItem>>,
) -> Result<Json<UpsertCount>, (axum::http::StatusCode, String)> {
    for it in &items {
        if AttendanceStatus::parse(&it.status).is_none() {
            return Err((
                axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "unknown status '{}' for {}; expected present|absent|late|early_leave|half_day|no_show",
                    it.status, it.day
                ),
            ));
        }
    }

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    for it in &items {
        query(
            r#"
            INSERT INTO public.attendance_confirmations(client_id, day, status, check_in, check_out)
            VALUES ($1,$2,$3,$4,$5)
            ON CONFLICT (client_id, day)
            DO UPDATE SET status = EXCLUDED.status,
                          check_in = EXCLUDED.check_in,
                          check_out = EXCLUDED.check_out
            "#
        )
        .bind(client_id).bind(it.day).bind(&it.status).bind(it.check_in).bind(it.check_out)
        .execute(&mut *tx).await.map_err(internal_error)?;
    }
    tx.commit().await.map_err(internal_error)?;
    Ok(Json(UpsertCount { upserted: items.len() }))
}

pub async fn list_attendance(
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
    Query(q): Query<RangeQ>,
) -> Result<Json<Vec<AttendanceConfirmation>>, (axum::http::StatusCode, String)> {
    let rows = query_as::<_, AttendanceConfirmation>(
        r#"
        SELECT * FROM public.attendance_confirmations
        WHERE client_id=$1
          AND ($2::date IS NULL OR day >= $2)
          AND ($3::date IS NULL OR day <= $3)
        ORDER BY day
        "#
    )
    .bind(client_id).bind(q.from).bind(q.to)
    .fetch_all(&state.pool).await.map_err(internal_error)?;
    Ok(Json(rows))
}
