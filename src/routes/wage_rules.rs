// src/routes/wage_rules.rs

use axum::http::StatusCode;
use axum::{extract::{Path, Query, State}, Json};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{query, query_as, query_scalar, PgPool};

use crate::payroll::rules::{CalculationType, DeductionEntry, PieceRateEntry, RuleDraft};
use crate::{AppState, models::WageRuleRow};
use super::{internal_error, not_found};

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response models
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateWageRuleBody {
    pub client_id: Option<i64>,
    pub name: String,
    pub calculation_type: CalculationType,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    #[serde(default)]
    pub piece_rates: Vec<PieceRateEntry>,
    #[serde(default)]
    pub deductions: Vec<DeductionEntry>,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct PatchWageRuleBody {
    pub name: Option<String>,
    pub calculation_type: Option<CalculationType>,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub piece_rates: Option<Vec<PieceRateEntry>>,
    pub deductions: Option<Vec<DeductionEntry>>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct ListQ { pub client_id: Option<i64> }

fn unprocessable<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

/// A rule referenced by a confirmed or paid run must not change; edits would
/// retroactively alter historical pay.
async fn rule_locked(pool: &PgPool, wage_rule_id: i64) -> Result<bool, sqlx::Error> {
    query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM public.payroll_lines l
            JOIN public.payroll_runs r ON r.payroll_run_id = l.payroll_run_id
            WHERE l.wage_rule_id=$1 AND r.status IN ('confirmed','paid')
        )
        "#,
    )
    .bind(wage_rule_id)
    .fetch_one(pool)
    .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn create_wage_rule(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
    Json(b): Json<CreateWageRuleBody>,
) -> Result<Json<WageRuleRow>, (StatusCode, String)> {
    let draft = RuleDraft {
        client_id: b.client_id,
        name: b.name,
        calculation_type: b.calculation_type,
        hourly_rate: b.hourly_rate,
        daily_rate: b.daily_rate,
        piece_rates: b.piece_rates,
        deductions: b.deductions,
        valid_from: b.valid_from,
        valid_until: b.valid_until,
        is_default: b.client_id.is_none(),
    };
    draft.validate().map_err(unprocessable)?;

    let piece_rates = serde_json::to_value(&draft.piece_rates).map_err(internal_error)?;
    let deductions = serde_json::to_value(&draft.deductions).map_err(internal_error)?;
    let row = query_as::<_, WageRuleRow>(
        r#"
        INSERT INTO public.wage_rules
            (facility_id, client_id, name, calculation_type, hourly_rate, daily_rate,
             piece_rates, deductions, valid_from, valid_until, is_default)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING *
        "#,
    )
    .bind(facility_id)
    .bind(draft.client_id)
    .bind(&draft.name)
    .bind(draft.calculation_type.as_str())
    .bind(draft.hourly_rate)
    .bind(draft.daily_rate)
    .bind(piece_rates)
    .bind(deductions)
    .bind(draft.valid_from)
    .bind(draft.valid_until)
    .bind(draft.is_default)
    .fetch_one(&state.pool).await.map_err(internal_error)?;
    Ok(Json(row))
}

pub async fn list_wage_rules(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<WageRuleRow>>, (StatusCode, String)> {
    let rows = if let Some(client_id) = q.client_id {
        query_as::<_, WageRuleRow>(
            r#"
            SELECT * FROM public.wage_rules
            WHERE facility_id=$1 AND client_id=$2
            ORDER BY valid_from DESC, wage_rule_id DESC
            "#,
        )
        .bind(facility_id)
        .bind(client_id)
        .fetch_all(&state.pool).await.map_err(internal_error)?
    } else {
        query_as::<_, WageRuleRow>(
            r#"
            SELECT * FROM public.wage_rules
            WHERE facility_id=$1
            ORDER BY client_id NULLS FIRST, valid_from DESC, wage_rule_id DESC
            "#,
        )
        .bind(facility_id)
        .fetch_all(&state.pool).await.map_err(internal_error)?
    };
    Ok(Json(rows))
}

pub async fn get_wage_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WageRuleRow>, (StatusCode, String)> {
    let row = query_as::<_, WageRuleRow>(
        r#"SELECT * FROM public.wage_rules WHERE wage_rule_id=$1"#,
    )
    .bind(id)
    .fetch_optional(&state.pool).await.map_err(internal_error)?
    .ok_or_else(|| not_found("wage rule", id))?;
    Ok(Json(row))
}

pub async fn patch_wage_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<PatchWageRuleBody>,
) -> Result<Json<WageRuleRow>, (StatusCode, String)> {
    let row = query_as::<_, WageRuleRow>(
        r#"SELECT * FROM public.wage_rules WHERE wage_rule_id=$1"#,
    )
    .bind(id)
    .fetch_optional(&state.pool).await.map_err(internal_error)?
    .ok_or_else(|| not_found("wage rule", id))?;

    if rule_locked(&state.pool, id).await.map_err(internal_error)? {
        return Err((
            StatusCode::CONFLICT,
            format!("wage rule {id} is referenced by a confirmed payroll run"),
        ));
    }

    let calculation_type = match b.calculation_type {
        Some(t) => t,
        None => CalculationType::parse(&row.calculation_type).ok_or_else(|| {
            unprocessable(format!(
                "stored calculation_type '{}' is unknown; include calculation_type in the patch",
                row.calculation_type
            ))
        })?,
    };
    // the whole merged rule is re-validated, not just the changed fields
    let draft = RuleDraft {
        client_id: row.client_id,
        name: b.name.unwrap_or(row.name),
        calculation_type,
        hourly_rate: b.hourly_rate.or(row.hourly_rate),
        daily_rate: b.daily_rate.or(row.daily_rate),
        piece_rates: match b.piece_rates {
            Some(list) => list,
            None => serde_json::from_value(row.piece_rates).unwrap_or_default(),
        },
        deductions: match b.deductions {
            Some(list) => list,
            None => serde_json::from_value(row.deductions).unwrap_or_default(),
        },
        valid_from: b.valid_from.unwrap_or(row.valid_from),
        valid_until: b.valid_until.or(row.valid_until),
        is_default: row.client_id.is_none(),
    };
    draft.validate().map_err(unprocessable)?;

    let piece_rates = serde_json::to_value(&draft.piece_rates).map_err(internal_error)?;
    let deductions = serde_json::to_value(&draft.deductions).map_err(internal_error)?;
    let updated = query_as::<_, WageRuleRow>(
        r#"
        UPDATE public.wage_rules SET
          name = $2,
          calculation_type = $3,
          hourly_rate = $4,
          daily_rate = $5,
          piece_rates = $6,
          deductions = $7,
          valid_from = $8,
          valid_until = $9,
          updated_at = now()
        WHERE wage_rule_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&draft.name)
    .bind(draft.calculation_type.as_str())
    .bind(draft.hourly_rate)
    .bind(draft.daily_rate)
    .bind(piece_rates)
    .bind(deductions)
    .bind(draft.valid_from)
    .bind(draft.valid_until)
    .fetch_one(&state.pool).await.map_err(internal_error)?;
    Ok(Json(updated))
}

pub async fn delete_wage_rule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if rule_locked(&state.pool, id).await.map_err(internal_error)? {
        return Err((
            StatusCode::CONFLICT,
            format!("wage rule {id} is referenced by a confirmed payroll run"),
        ));
    }
    let res = query(r#"DELETE FROM public.wage_rules WHERE wage_rule_id=$1"#)
        .bind(id).execute(&state.pool).await.map_err(internal_error)?;
    Ok(Json(serde_json::json!({"deleted": res.rows_affected() > 0})))
}
