// src/routes/clients.rs

use axum::{extract::{Path, State}, Json};
use serde::Deserialize;
use sqlx::query_as;
use crate::{AppState, models::Client};
use super::{internal_error, not_found};

#[derive(Deserialize)]
pub struct CreateClientBody {
    pub code: String,
    pub full_name: String,
    pub kana: Option<String>,
    pub enabled: Option<bool>,
}

pub async fn create_client(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
    Json(b): Json<CreateClientBody>,
) -> Result<Json<Client>, (axum::http::StatusCode, String)> {
    if b.code.trim().is_empty() || b.full_name.trim().is_empty() {
        return Err((
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            "code and full_name must not be empty".into(),
        ));
    }
    let row = query_as::<_, Client>(
        r#"
        INSERT INTO public.clients(facility_id, code, full_name, kana, enabled)
        VALUES ($1,$2,$3,$4, COALESCE($5, TRUE))
        RETURNING client_id, facility_id, code, full_name, kana, enabled, created_at
        "#
    )
    .bind(facility_id).bind(b.code).bind(b.full_name).bind(b.kana).bind(b.enabled)
    .fetch_one(&state.pool).await.map_err(internal_error)?;
    Ok(Json(row))
}

pub async fn list_clients_by_facility(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
) -> Result<Json<Vec<Client>>, (axum::http::StatusCode, String)> {
    let rows = query_as::<_, Client>(
        r#"SELECT * FROM public.clients WHERE facility_id=$1 ORDER BY code"#)
        .bind(facility_id).fetch_all(&state.pool).await.map_err(internal_error)?;
    Ok(Json(rows))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Client>, (axum::http::StatusCode, String)> {
    let row = query_as::<_, Client>(r#"SELECT * FROM public.clients WHERE client_id=$1"#)
        .bind(id)
        .fetch_optional(&state.pool).await.map_err(internal_error)?
        .ok_or_else(|| not_found("client", id))?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct PatchClientBody {
    pub code: Option<String>,
    pub full_name: Option<String>,
    pub kana: Option<String>,
    pub enabled: Option<bool>,
}

pub async fn patch_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<PatchClientBody>,
) -> Result<Json<Client>, (axum::http::StatusCode, String)> {
    let row = query_as::<_, Client>(
        r#"
        UPDATE public.clients SET
          code = COALESCE($2, code),
          full_name = COALESCE($3, full_name),
          kana = COALESCE($4, kana),
          enabled = COALESCE($5, enabled)
        WHERE client_id = $1
        RETURNING client_id, facility_id, code, full_name, kana, enabled, created_at
        "#
    )
    .bind(id).bind(b.code).bind(b.full_name).bind(b.kana).bind(b.enabled)
    .fetch_optional(&state.pool).await.map_err(internal_error)?
    .ok_or_else(|| not_found("client", id))?;
    Ok(Json(row))
}
