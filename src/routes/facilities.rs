// src/routes/facilities.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::Deserialize;
use sqlx::query_as;
use crate::AppState;
use crate::models::Facility;
use super::{internal_error, not_found};

#[derive(Deserialize)]
pub struct ListQ {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateFacilityBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct PatchFacilityBody {
    pub name: Option<String>,
}

pub async fn list_facilities(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Facility>>, (axum::http::StatusCode, String)> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let offset = q.offset.unwrap_or(0).max(0);
    let rows = query_as::<_, Facility>(
        r#"SELECT * FROM public.facilities ORDER BY facility_id LIMIT $1 OFFSET $2"#
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool).await.map_err(internal_error)?;
    Ok(Json(rows))
}

pub async fn get_facility(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Facility>, (axum::http::StatusCode, String)> {
    let row = query_as::<_, Facility>(
        r#"SELECT * FROM public.facilities WHERE facility_id = $1"#
    )
    .bind(id)
    .fetch_optional(&state.pool).await.map_err(internal_error)?
    .ok_or_else(|| not_found("facility", id))?;
    Ok(Json(row))
}

pub async fn create_facility(
    State(state): State<AppState>,
    Json(body): Json<CreateFacilityBody>,
) -> Result<Json<Facility>, (axum::http::StatusCode, String)> {
    if body.name.trim().is_empty() {
        return Err((axum::http::StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty".into()));
    }
    let row = query_as::<_, Facility>(
        r#"
        INSERT INTO public.facilities(name)
        VALUES ($1)
        RETURNING facility_id, name, created_at, updated_at
        "#
    )
    .bind(body.name.trim())
    .fetch_one(&state.pool).await.map_err(internal_error)?;
    Ok(Json(row))
}

pub async fn patch_facility(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<PatchFacilityBody>,
) -> Result<Json<Facility>, (axum::http::StatusCode, String)> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err((axum::http::StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty".into()));
    }
    let row = query_as::<_, Facility>(
        r#"
        UPDATE public.facilities SET
            name = COALESCE($2, name),
            updated_at = now()
        WHERE facility_id = $1
        RETURNING facility_id, name, created_at, updated_at
        "#
    )
    .bind(id)
    .bind(body.name)
    .fetch_optional(&state.pool).await.map_err(internal_error)?
    .ok_or_else(|| not_found("facility", id))?;
    Ok(Json(row))
}
