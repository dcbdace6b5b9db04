// src/payroll/calc.rs
//
// Pure per-client compensation math. Everything here works on a resolved
// rule plus the month's aggregates; no IO, no clock.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::aggregate::AttendanceSummary;
use super::rules::{CalculationType, DeductionKind, WageRule};

/// Rounds to whole yen, halves away from zero. Every displayed component is
/// rounded independently so the printed breakdown always sums to the line.
pub fn round_yen(amount: Decimal) -> i64 {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        // yen amounts fit comfortably in i64; saturate on pathological input
        .unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaseDetail {
    Hourly { rate: Decimal, minutes: i32 },
    Daily { rate: Decimal, days: i32 },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceItem {
    pub work_type: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: i64,
}

/// Logged work the resolved rule has no price for. Kept visible so staff can
/// fix the rule instead of silently paying zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedWork {
    pub work_type: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionItem {
    pub label: String,
    pub kind: DeductionKind,
    /// The configured value: yen for fixed, percent for percentage.
    pub value: Decimal,
    /// Yen actually withheld.
    pub amount: i64,
}

/// Per-line audit trail, stored alongside the amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineBreakdown {
    pub calculation_type: CalculationType,
    pub base: BaseDetail,
    pub piece_items: Vec<PieceItem>,
    pub unmatched_work: Vec<UnmatchedWork>,
    pub deduction_items: Vec<DeductionItem>,
}

/// One client's calculated pay, ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollLineDraft {
    pub client_id: i64,
    pub wage_rule_id: i64,
    pub work_days: i32,
    pub total_minutes: i32,
    pub base_amount: i64,
    pub piece_amount: i64,
    pub deductions_total: i64,
    pub net_amount: i64,
    pub breakdown: LineBreakdown,
}

pub fn calculate(
    client_id: i64,
    rule: &WageRule,
    attendance: AttendanceSummary,
    work_totals: &BTreeMap<String, Decimal>,
) -> PayrollLineDraft {
    let (base_amount, base) = base_pay(rule, attendance);
    let (piece_amount, piece_items, unmatched_work) = piece_pay(rule, work_totals);

    let subtotal = base_amount + piece_amount;
    let (deductions_total, deduction_items) = apply_deductions(rule, subtotal);

    PayrollLineDraft {
        client_id,
        wage_rule_id: rule.wage_rule_id,
        work_days: attendance.work_days,
        total_minutes: attendance.total_minutes,
        base_amount,
        piece_amount,
        deductions_total,
        net_amount: (subtotal - deductions_total).max(0),
        breakdown: LineBreakdown {
            calculation_type: rule.calculation_type,
            base,
            piece_items,
            unmatched_work,
            deduction_items,
        },
    }
}

fn base_pay(rule: &WageRule, attendance: AttendanceSummary) -> (i64, BaseDetail) {
    match rule.calculation_type {
        CalculationType::Hourly => hourly_base(rule, attendance),
        CalculationType::Daily => daily_base(rule, attendance),
        // a mixed rule carrying both rates pays the hourly one
        CalculationType::Mixed if rule.hourly_rate.is_some() => hourly_base(rule, attendance),
        CalculationType::Mixed => daily_base(rule, attendance),
        CalculationType::PieceRate => (0, BaseDetail::None),
    }
}

fn hourly_base(rule: &WageRule, attendance: AttendanceSummary) -> (i64, BaseDetail) {
    let Some(rate) = rule.hourly_rate else { return (0, BaseDetail::None) };
    let amount = round_yen(rate * Decimal::from(attendance.total_minutes) / Decimal::from(60));
    (amount, BaseDetail::Hourly { rate, minutes: attendance.total_minutes })
}

fn daily_base(rule: &WageRule, attendance: AttendanceSummary) -> (i64, BaseDetail) {
    let Some(rate) = rule.daily_rate else { return (0, BaseDetail::None) };
    let amount = round_yen(rate * Decimal::from(attendance.work_days));
    (amount, BaseDetail::Daily { rate, days: attendance.work_days })
}

fn piece_pay(
    rule: &WageRule,
    work_totals: &BTreeMap<String, Decimal>,
) -> (i64, Vec<PieceItem>, Vec<UnmatchedWork>) {
    // hourly and daily rules pay attendance only; logged work is informational
    if !matches!(rule.calculation_type, CalculationType::PieceRate | CalculationType::Mixed) {
        return (0, Vec::new(), Vec::new());
    }

    let mut total = 0i64;
    let mut items = Vec::new();
    let mut unmatched = Vec::new();

    for (work_type, quantity) in work_totals {
        match rule.piece_rates.iter().find(|p| &p.work_type == work_type) {
            Some(p) => {
                let amount = round_yen(p.unit_price * *quantity);
                total += amount;
                items.push(PieceItem {
                    work_type: work_type.clone(),
                    quantity: *quantity,
                    unit_price: p.unit_price,
                    amount,
                });
            }
            None => unmatched.push(UnmatchedWork {
                work_type: work_type.clone(),
                quantity: *quantity,
            }),
        }
    }

    (total, items, unmatched)
}

/// Each deduction applies to the same pre-deduction subtotal; they never
/// compound on each other.
fn apply_deductions(rule: &WageRule, subtotal: i64) -> (i64, Vec<DeductionItem>) {
    let mut total = 0i64;
    let mut items = Vec::new();

    for d in &rule.deductions {
        let amount = match d.kind {
            DeductionKind::Fixed => round_yen(d.amount),
            DeductionKind::Percentage => {
                round_yen(d.amount * Decimal::from(subtotal) / Decimal::from(100))
            }
        };
        total += amount;
        items.push(DeductionItem { label: d.label.clone(), kind: d.kind, value: d.amount, amount });
    }

    (total, items)
}
