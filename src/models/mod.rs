// src/models/mod.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ───────────────────────────────────────
// Core tenancy
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Facility {
    pub facility_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub client_id: i64,
    pub facility_id: i64,
    pub code: String,
    pub full_name: String,
    pub kana: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Engine inputs: attendance & work logs
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceConfirmation {
    pub attendance_confirmation_id: i64,
    pub client_id: i64,
    pub day: NaiveDate,
    pub status: String,           // present|absent|late|early_leave|half_day|no_show
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkLog {
    pub work_log_id: i64,
    pub client_id: i64,
    pub day: NaiveDate,
    pub work_type: String,        // free-text label, e.g. "封入作業"
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
}

// ───────────────────────────────────────
// Wage rules
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WageRuleRow {
    pub wage_rule_id: i64,
    pub facility_id: i64,
    pub client_id: Option<i64>,   // NULL = facility-wide default
    pub name: String,
    pub calculation_type: String, // hourly|daily|piece_rate|mixed
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub piece_rates: serde_json::Value, // jsonb: [{work_type, unit_price}]
    pub deductions: serde_json::Value,  // jsonb: [{label, kind, amount}]
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>, // NULL = open-ended
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Payroll runs & lines
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollRunRow {
    pub payroll_run_id: i64,
    pub facility_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: String,           // calculating|draft|confirmed|paid
    pub notes: Option<String>,
    pub warnings: serde_json::Value, // jsonb: [RunWarning]
    pub confirmed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollLineRow {
    pub payroll_line_id: i64,
    pub payroll_run_id: i64,
    pub client_id: i64,
    pub wage_rule_id: i64,
    pub work_days: i32,
    pub total_minutes: i32,
    pub base_amount: i64,         // yen
    pub piece_amount: i64,
    pub deductions_total: i64,
    pub net_amount: i64,          // max(0, base + piece − deductions)
    pub breakdown: serde_json::Value, // jsonb, opaque audit detail
}

// ───────────────────────────────────────
// DTOs helpful for endpoints
// ───────────────────────────────────────
#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertCount { pub upserted: usize }
