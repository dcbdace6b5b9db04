// src/payroll/store/pg.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{query, query_as, query_scalar, PgPool};

use crate::models::{AttendanceConfirmation, PayrollLineRow, PayrollRunRow, WageRuleRow, WorkLog};
use crate::payroll::calc::PayrollLineDraft;
use crate::payroll::error::StoreError;
use crate::payroll::run::{NewPayrollRun, RunStatus};

use super::PayrollStore;

/// `PayrollStore` backed by the application's Postgres pool.
#[derive(Clone)]
pub struct PgPayrollStore {
    pool: PgPool,
}

impl PgPayrollStore {
    pub fn new(pool: PgPool) -> Self {
        PgPayrollStore { pool }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl PayrollStore for PgPayrollStore {
    async fn load_rule_snapshot(&self, facility_id: i64) -> Result<Vec<WageRuleRow>, StoreError> {
        let rows = query_as::<_, WageRuleRow>(
            r#"SELECT * FROM public.wage_rules WHERE facility_id=$1 ORDER BY wage_rule_id"#,
        )
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn clients_with_attendance(
        &self,
        facility_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<i64>, StoreError> {
        let ids = query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT a.client_id
            FROM public.attendance_confirmations a
            JOIN public.clients c ON c.client_id = a.client_id
            WHERE c.facility_id=$1 AND a.day BETWEEN $2 AND $3
            ORDER BY a.client_id
            "#,
        )
        .bind(facility_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_confirmations(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<AttendanceConfirmation>, StoreError> {
        let rows = query_as::<_, AttendanceConfirmation>(
            r#"
            SELECT * FROM public.attendance_confirmations
            WHERE client_id=$1 AND day BETWEEN $2 AND $3
            ORDER BY day
            "#,
        )
        .bind(client_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_work_logs(
        &self,
        client_id: i64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<WorkLog>, StoreError> {
        let rows = query_as::<_, WorkLog>(
            r#"
            SELECT * FROM public.work_logs
            WHERE client_id=$1 AND day BETWEEN $2 AND $3
            ORDER BY day, work_type
            "#,
        )
        .bind(client_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_run_with_lines(
        &self,
        run: &NewPayrollRun,
        lines: &[PayrollLineDraft],
    ) -> Result<(PayrollRunRow, Vec<PayrollLineRow>), StoreError> {
        let warnings =
            serde_json::to_value(&run.warnings).map_err(|e| StoreError::Decode(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        // idx_payroll_runs_active (facility_id, period_start) over non-paid
        // rows turns a concurrent duplicate into a 23505 here
        let run_row = query_as::<_, PayrollRunRow>(
            r#"
            INSERT INTO public.payroll_runs
                (facility_id, period_start, period_end, status, notes, warnings)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(run.facility_id)
        .bind(run.period_start)
        .bind(run.period_end)
        .bind(run.status.as_str())
        .bind(&run.notes)
        .bind(warnings)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateActiveRun {
                    facility_id: run.facility_id,
                    period_start: run.period_start,
                }
            } else {
                StoreError::Database(e)
            }
        })?;

        let mut line_rows = Vec::with_capacity(lines.len());
        for line in lines {
            let breakdown = serde_json::to_value(&line.breakdown)
                .map_err(|e| StoreError::Decode(e.to_string()))?;
            let row = query_as::<_, PayrollLineRow>(
                r#"
                INSERT INTO public.payroll_lines
                    (payroll_run_id, client_id, wage_rule_id, work_days, total_minutes,
                     base_amount, piece_amount, deductions_total, net_amount, breakdown)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
                "#,
            )
            .bind(run_row.payroll_run_id)
            .bind(line.client_id)
            .bind(line.wage_rule_id)
            .bind(line.work_days)
            .bind(line.total_minutes)
            .bind(line.base_amount)
            .bind(line.piece_amount)
            .bind(line.deductions_total)
            .bind(line.net_amount)
            .bind(breakdown)
            .fetch_one(&mut *tx)
            .await?;
            line_rows.push(row);
        }

        tx.commit().await?;
        Ok((run_row, line_rows))
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<PayrollRunRow>, StoreError> {
        let row = query_as::<_, PayrollRunRow>(
            r#"SELECT * FROM public.payroll_runs WHERE payroll_run_id=$1"#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_lines(&self, run_id: i64) -> Result<Vec<PayrollLineRow>, StoreError> {
        let rows = query_as::<_, PayrollLineRow>(
            r#"SELECT * FROM public.payroll_lines WHERE payroll_run_id=$1 ORDER BY client_id"#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_runs(&self, facility_id: i64) -> Result<Vec<PayrollRunRow>, StoreError> {
        let rows = query_as::<_, PayrollRunRow>(
            r#"
            SELECT * FROM public.payroll_runs
            WHERE facility_id=$1
            ORDER BY period_start DESC, payroll_run_id DESC
            "#,
        )
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn advance_run_status(
        &self,
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = query(
            r#"
            UPDATE public.payroll_runs
            SET status=$3,
                notes=COALESCE($4, notes),
                confirmed_at=CASE WHEN $3='confirmed' THEN $5 ELSE confirmed_at END,
                paid_at=CASE WHEN $3='paid' THEN $5 ELSE paid_at END
            WHERE payroll_run_id=$1 AND status=$2
            "#,
        )
        .bind(run_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(notes)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
