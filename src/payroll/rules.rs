// src/payroll/rules.rs
//
// Wage rules: typed piece-rate/deduction entries, write-boundary validation,
// decoding of rows into an immutable per-run snapshot, and date-scoped
// resolution (client-specific override beats the facility-wide default).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::WageRuleRow;

use super::run::RunWarning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    Hourly,
    Daily,
    PieceRate,
    Mixed,
}

impl CalculationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationType::Hourly => "hourly",
            CalculationType::Daily => "daily",
            CalculationType::PieceRate => "piece_rate",
            CalculationType::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hourly" => Some(CalculationType::Hourly),
            "daily" => Some(CalculationType::Daily),
            "piece_rate" => Some(CalculationType::PieceRate),
            "mixed" => Some(CalculationType::Mixed),
            _ => None,
        }
    }
}

/// One per-unit price, keyed by the staff-entered work-type label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceRateEntry {
    pub work_type: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionKind {
    Fixed,
    Percentage,
}

/// For `fixed` the amount is yen; for `percentage` it is the percent value
/// applied to the pre-deduction subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionEntry {
    pub label: String,
    pub kind: DeductionKind,
    pub amount: Decimal,
}

/// A wage rule with its JSONB lists already decoded.
#[derive(Debug, Clone, Serialize)]
pub struct WageRule {
    pub wage_rule_id: i64,
    pub facility_id: i64,
    pub client_id: Option<i64>,
    pub name: String,
    pub calculation_type: CalculationType,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub piece_rates: Vec<PieceRateEntry>,
    pub deductions: Vec<DeductionEntry>,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub is_default: bool,
}

// ───────────────────────────────────────
// Write-boundary validation
// ───────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum RuleValidationError {
    #[error("hourly rule requires a positive hourly_rate")]
    MissingHourlyRate,
    #[error("daily rule requires a positive daily_rate")]
    MissingDailyRate,
    #[error("mixed rule requires a positive hourly or daily rate and at least one piece rate")]
    IncompleteMixedRule,
    #[error("piece rate work_type must not be empty")]
    EmptyWorkType,
    #[error("duplicate piece rate work_type '{0}'")]
    DuplicateWorkType(String),
    #[error("piece rate for '{0}' must not be negative")]
    NegativeUnitPrice(String),
    #[error("deduction label must not be empty")]
    EmptyDeductionLabel,
    #[error("deduction '{0}' must not be negative")]
    NegativeDeduction(String),
    #[error("percentage deduction '{0}' must be between 0 and 100")]
    PercentageOutOfRange(String),
    #[error("valid_until must not precede valid_from")]
    InvalidValidityWindow,
}

/// What staff submit when creating or editing a rule; validated before it
/// ever reaches the store.
#[derive(Debug, Clone)]
pub struct RuleDraft {
    pub client_id: Option<i64>,
    pub name: String,
    pub calculation_type: CalculationType,
    pub hourly_rate: Option<Decimal>,
    pub daily_rate: Option<Decimal>,
    pub piece_rates: Vec<PieceRateEntry>,
    pub deductions: Vec<DeductionEntry>,
    pub valid_from: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub is_default: bool,
}

impl RuleDraft {
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        let positive = |r: Option<Decimal>| r.map_or(false, |v| v > Decimal::ZERO);

        match self.calculation_type {
            CalculationType::Hourly if !positive(self.hourly_rate) => {
                return Err(RuleValidationError::MissingHourlyRate)
            }
            CalculationType::Daily if !positive(self.daily_rate) => {
                return Err(RuleValidationError::MissingDailyRate)
            }
            CalculationType::Mixed
                if (!positive(self.hourly_rate) && !positive(self.daily_rate))
                    || self.piece_rates.is_empty() =>
            {
                return Err(RuleValidationError::IncompleteMixedRule)
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.piece_rates {
            if entry.work_type.trim().is_empty() {
                return Err(RuleValidationError::EmptyWorkType);
            }
            if !seen.insert(entry.work_type.as_str()) {
                return Err(RuleValidationError::DuplicateWorkType(entry.work_type.clone()));
            }
            if entry.unit_price < Decimal::ZERO {
                return Err(RuleValidationError::NegativeUnitPrice(entry.work_type.clone()));
            }
        }

        for d in &self.deductions {
            if d.label.trim().is_empty() {
                return Err(RuleValidationError::EmptyDeductionLabel);
            }
            if d.amount < Decimal::ZERO {
                return Err(RuleValidationError::NegativeDeduction(d.label.clone()));
            }
            if d.kind == DeductionKind::Percentage && d.amount > Decimal::from(100) {
                return Err(RuleValidationError::PercentageOutOfRange(d.label.clone()));
            }
        }

        if let Some(until) = self.valid_until {
            if until < self.valid_from {
                return Err(RuleValidationError::InvalidValidityWindow);
            }
        }
        Ok(())
    }
}

// ───────────────────────────────────────
// Snapshot decode
// ───────────────────────────────────────

/// The facility's rules as read once at the start of a payroll run, plus any
/// data-quality warnings produced while decoding them.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    pub rules: Vec<WageRule>,
    pub warnings: Vec<RunWarning>,
}

/// Decodes stored rows into typed rules. Rows written through the API are
/// always well-formed; legacy or hand-edited rows degrade instead of failing:
/// an unreadable list becomes empty and an unknown calculation type drops the
/// rule, each leaving a warning for staff.
pub fn decode_rule_rows(rows: Vec<WageRuleRow>) -> RuleSnapshot {
    let mut snapshot = RuleSnapshot::default();

    for row in rows {
        let calculation_type = match CalculationType::parse(&row.calculation_type) {
            Some(t) => t,
            None => {
                snapshot.warnings.push(RunWarning::MalformedRuleData {
                    wage_rule_id: row.wage_rule_id,
                    field: "calculation_type".into(),
                    detail: format!("unknown value '{}'", row.calculation_type),
                });
                continue;
            }
        };

        let piece_rates = match serde_json::from_value::<Vec<PieceRateEntry>>(row.piece_rates) {
            Ok(list) => list,
            Err(e) => {
                snapshot.warnings.push(RunWarning::MalformedRuleData {
                    wage_rule_id: row.wage_rule_id,
                    field: "piece_rates".into(),
                    detail: e.to_string(),
                });
                Vec::new()
            }
        };

        let deductions = match serde_json::from_value::<Vec<DeductionEntry>>(row.deductions) {
            Ok(list) => list,
            Err(e) => {
                snapshot.warnings.push(RunWarning::MalformedRuleData {
                    wage_rule_id: row.wage_rule_id,
                    field: "deductions".into(),
                    detail: e.to_string(),
                });
                Vec::new()
            }
        };

        snapshot.rules.push(WageRule {
            wage_rule_id: row.wage_rule_id,
            facility_id: row.facility_id,
            client_id: row.client_id,
            name: row.name,
            calculation_type,
            hourly_rate: row.hourly_rate,
            daily_rate: row.daily_rate,
            piece_rates,
            deductions,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_default: row.is_default,
        });
    }

    snapshot
}

// ───────────────────────────────────────
// Resolution
// ───────────────────────────────────────

/// Picks the single rule governing `client_id` on `on`.
///
/// Validity first (`valid_from <= on <= valid_until`, open-ended when
/// `valid_until` is null), then scope: a client-specific rule beats the
/// facility-wide default. Within a scope the latest `valid_from` wins and a
/// remaining tie goes to the highest rule id.
pub fn resolve_rule<'a>(rules: &'a [WageRule], client_id: i64, on: NaiveDate) -> Option<&'a WageRule> {
    let in_window =
        |r: &&WageRule| r.valid_from <= on && r.valid_until.map_or(true, |until| until >= on);
    let latest = |r: &&WageRule| (r.valid_from, r.wage_rule_id);

    rules
        .iter()
        .filter(in_window)
        .filter(|r| r.client_id == Some(client_id))
        .max_by_key(latest)
        .or_else(|| {
            rules
                .iter()
                .filter(in_window)
                .filter(|r| r.client_id.is_none())
                .max_by_key(latest)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(id: i64, client_id: Option<i64>, from: NaiveDate, until: Option<NaiveDate>) -> WageRule {
        WageRule {
            wage_rule_id: id,
            facility_id: 1,
            client_id,
            name: format!("rule-{id}"),
            calculation_type: CalculationType::Hourly,
            hourly_rate: Some(dec!(1000)),
            daily_rate: None,
            piece_rates: vec![],
            deductions: vec![],
            valid_from: from,
            valid_until: until,
            is_default: client_id.is_none(),
        }
    }

    fn draft(calculation_type: CalculationType) -> RuleDraft {
        RuleDraft {
            client_id: None,
            name: "test".into(),
            calculation_type,
            hourly_rate: None,
            daily_rate: None,
            piece_rates: vec![],
            deductions: vec![],
            valid_from: ymd(2025, 4, 1),
            valid_until: None,
            is_default: true,
        }
    }

    #[test]
    fn client_specific_beats_facility_default() {
        let rules = vec![
            rule(1, None, ymd(2025, 1, 1), None),
            rule(2, Some(42), ymd(2025, 1, 1), None),
        ];
        let picked = resolve_rule(&rules, 42, ymd(2025, 4, 30)).unwrap();
        assert_eq!(picked.wage_rule_id, 2);
    }

    #[test]
    fn latest_valid_from_wins_within_scope() {
        let rules = vec![
            rule(1, Some(42), ymd(2025, 1, 1), None),
            rule(2, Some(42), ymd(2025, 3, 1), None),
        ];
        let picked = resolve_rule(&rules, 42, ymd(2025, 4, 30)).unwrap();
        assert_eq!(picked.wage_rule_id, 2);
    }

    #[test]
    fn same_valid_from_prefers_newest_rule() {
        let rules = vec![
            rule(7, None, ymd(2025, 1, 1), None),
            rule(9, None, ymd(2025, 1, 1), None),
        ];
        let picked = resolve_rule(&rules, 42, ymd(2025, 4, 30)).unwrap();
        assert_eq!(picked.wage_rule_id, 9);
    }

    #[test]
    fn validity_window_is_inclusive() {
        let rules = vec![rule(1, None, ymd(2025, 4, 1), Some(ymd(2025, 4, 30)))];
        assert!(resolve_rule(&rules, 42, ymd(2025, 4, 1)).is_some());
        assert!(resolve_rule(&rules, 42, ymd(2025, 4, 30)).is_some());
        assert!(resolve_rule(&rules, 42, ymd(2025, 3, 31)).is_none());
        assert!(resolve_rule(&rules, 42, ymd(2025, 5, 1)).is_none());
    }

    #[test]
    fn expired_client_rule_falls_back_to_default() {
        let rules = vec![
            rule(1, None, ymd(2025, 1, 1), None),
            rule(2, Some(42), ymd(2025, 1, 1), Some(ymd(2025, 2, 28))),
        ];
        let picked = resolve_rule(&rules, 42, ymd(2025, 4, 30)).unwrap();
        assert_eq!(picked.wage_rule_id, 1);
    }

    #[test]
    fn other_clients_rules_never_match() {
        let rules = vec![rule(1, Some(7), ymd(2025, 1, 1), None)];
        assert!(resolve_rule(&rules, 42, ymd(2025, 4, 30)).is_none());
    }

    #[test]
    fn decode_keeps_well_formed_rows() {
        let row = WageRuleRow {
            wage_rule_id: 1,
            facility_id: 1,
            client_id: None,
            name: "既定".into(),
            calculation_type: "piece_rate".into(),
            hourly_rate: None,
            daily_rate: None,
            piece_rates: json!([{"work_type": "封入作業", "unit_price": "5"}]),
            deductions: json!([{"label": "昼食代", "kind": "fixed", "amount": "500"}]),
            valid_from: ymd(2025, 1, 1),
            valid_until: None,
            is_default: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let snapshot = decode_rule_rows(vec![row]);
        assert!(snapshot.warnings.is_empty());
        assert_eq!(snapshot.rules.len(), 1);
        let r = &snapshot.rules[0];
        assert_eq!(r.piece_rates[0].unit_price, dec!(5));
        assert_eq!(r.deductions[0].kind, DeductionKind::Fixed);
        assert_eq!(r.deductions[0].amount, dec!(500));
    }

    #[test]
    fn decode_degrades_malformed_lists_to_empty() {
        let row = WageRuleRow {
            wage_rule_id: 3,
            facility_id: 1,
            client_id: None,
            name: "壊れた".into(),
            calculation_type: "hourly".into(),
            hourly_rate: Some(dec!(900)),
            daily_rate: None,
            piece_rates: json!({"not": "a list"}),
            deductions: json!("garbage"),
            valid_from: ymd(2025, 1, 1),
            valid_until: None,
            is_default: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let snapshot = decode_rule_rows(vec![row]);
        assert_eq!(snapshot.rules.len(), 1);
        assert!(snapshot.rules[0].piece_rates.is_empty());
        assert!(snapshot.rules[0].deductions.is_empty());
        assert_eq!(snapshot.warnings.len(), 2);
    }

    #[test]
    fn decode_skips_unknown_calculation_type() {
        let row = WageRuleRow {
            wage_rule_id: 4,
            facility_id: 1,
            client_id: None,
            name: "不明".into(),
            calculation_type: "commission".into(),
            hourly_rate: None,
            daily_rate: None,
            piece_rates: json!([]),
            deductions: json!([]),
            valid_from: ymd(2025, 1, 1),
            valid_until: None,
            is_default: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let snapshot = decode_rule_rows(vec![row]);
        assert!(snapshot.rules.is_empty());
        assert_eq!(snapshot.warnings.len(), 1);
        match &snapshot.warnings[0] {
            RunWarning::MalformedRuleData { wage_rule_id, field, .. } => {
                assert_eq!(*wage_rule_id, 4);
                assert_eq!(field, "calculation_type");
            }
            other => panic!("expected MalformedRuleData, got {other:?}"),
        }
    }

    #[test]
    fn hourly_draft_requires_positive_rate() {
        let mut d = draft(CalculationType::Hourly);
        assert_eq!(d.validate(), Err(RuleValidationError::MissingHourlyRate));
        d.hourly_rate = Some(dec!(0));
        assert_eq!(d.validate(), Err(RuleValidationError::MissingHourlyRate));
        d.hourly_rate = Some(dec!(1000));
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn mixed_draft_requires_rate_and_piece_rates() {
        let mut d = draft(CalculationType::Mixed);
        d.hourly_rate = Some(dec!(1200));
        assert_eq!(d.validate(), Err(RuleValidationError::IncompleteMixedRule));
        d.piece_rates = vec![PieceRateEntry { work_type: "梱包".into(), unit_price: dec!(10) }];
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn duplicate_work_types_rejected() {
        let mut d = draft(CalculationType::PieceRate);
        d.piece_rates = vec![
            PieceRateEntry { work_type: "封入作業".into(), unit_price: dec!(5) },
            PieceRateEntry { work_type: "封入作業".into(), unit_price: dec!(6) },
        ];
        assert_eq!(
            d.validate(),
            Err(RuleValidationError::DuplicateWorkType("封入作業".into()))
        );
    }

    #[test]
    fn percentage_deduction_bounded() {
        let mut d = draft(CalculationType::Daily);
        d.daily_rate = Some(dec!(3000));
        d.deductions = vec![DeductionEntry {
            label: "利用料".into(),
            kind: DeductionKind::Percentage,
            amount: dec!(150),
        }];
        assert_eq!(
            d.validate(),
            Err(RuleValidationError::PercentageOutOfRange("利用料".into()))
        );
    }

    #[test]
    fn validity_window_must_not_invert() {
        let mut d = draft(CalculationType::Daily);
        d.daily_rate = Some(dec!(3000));
        d.valid_until = Some(ymd(2025, 3, 1));
        assert_eq!(d.validate(), Err(RuleValidationError::InvalidValidityWindow));
    }
}
