//! Caller-side validation.
//!
//! The replay engine accepts anything structurally sound and clamps the rest.
//! These checks encode the limits an interactive caller enforces before it
//! creates a plan or appends to its log.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MortgageReplayError;
use crate::loan::LoanInput;
use crate::operation::{Operation, OperationKind};
use crate::plan::PlanInput;
use crate::replay::{build_schedule, PaymentRecord};
use crate::types::{Money, Percent};
use crate::MortgageReplayResult;

pub const MAX_PRINCIPAL: Money = dec!(100_000_000);
pub const MAX_RATE_PERCENT: Percent = dec!(50);
pub const MAX_TERM_MONTHS: u32 = 600;

/// Principal a payment override must retire on top of the period's interest.
pub const MIN_OVERRIDE_PRINCIPAL: Money = dec!(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every rule the loan terms break. Empty means valid.
pub fn validate_loan_input(input: &LoanInput) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if input.principal <= Decimal::ZERO || input.principal > MAX_PRINCIPAL {
        errors.push(ValidationError::new(
            "principal",
            format!("Principal must be in (0, {MAX_PRINCIPAL}]"),
        ));
    }
    if input.annual_rate_percent <= Decimal::ZERO || input.annual_rate_percent > MAX_RATE_PERCENT {
        errors.push(ValidationError::new(
            "annual_rate_percent",
            format!("Annual rate must be in (0, {MAX_RATE_PERCENT}]%"),
        ));
    }
    if input.term_months == 0 || input.term_months > MAX_TERM_MONTHS {
        errors.push(ValidationError::new(
            "term_months",
            format!("Term must be between 1 and {MAX_TERM_MONTHS} months"),
        ));
    }

    errors
}

pub fn ensure_valid_loan(input: &LoanInput) -> MortgageReplayResult<()> {
    let errors = validate_loan_input(input);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MortgageReplayError::Validation(errors))
    }
}

/// Check a prospective operation against the schedule it would be applied to
/// and the log that produced it. A period holds at most one operation of
/// each kind.
pub fn validate_operation(
    schedule: &[PaymentRecord],
    operations: &[Operation],
    period: u32,
    kind: &OperationKind,
) -> MortgageReplayResult<()> {
    let row = schedule
        .iter()
        .find(|r| r.period == period)
        .ok_or(MortgageReplayError::PeriodOutOfRange {
            period,
            max: schedule.len() as u32,
        })?;

    let invalid = |reason: String| MortgageReplayError::InvalidOperation {
        kind: kind.label().to_string(),
        reason,
    };

    if let Some(existing) = operations
        .iter()
        .find(|op| op.period == period && op.kind.label() == kind.label())
    {
        return Err(invalid(format!(
            "period {period} already has a {} ({})",
            kind.label(),
            existing.id
        )));
    }

    match kind {
        OperationKind::RateAdjustment { new_rate_percent } => {
            if *new_rate_percent <= Decimal::ZERO || *new_rate_percent > MAX_RATE_PERCENT {
                return Err(invalid(format!(
                    "rate must be in (0, {MAX_RATE_PERCENT}]%, got {new_rate_percent}%"
                )));
            }
        }
        OperationKind::PaymentAdjustment { new_payment } => {
            let floor = row.interest + MIN_OVERRIDE_PRINCIPAL;
            if *new_payment < floor {
                return Err(invalid(format!(
                    "payment {new_payment} must be at least {floor} (period {period} interest {} plus {MIN_OVERRIDE_PRINCIPAL})",
                    row.interest
                )));
            }
        }
        OperationKind::Prepayment { amount, .. } => {
            if *amount <= Decimal::ZERO || *amount > row.remaining_balance {
                return Err(invalid(format!(
                    "amount must be in (0, {}], got {amount}",
                    row.remaining_balance
                )));
            }
        }
    }

    Ok(())
}

/// Every rule a persisted plan breaks. Each operation is checked against the
/// schedule produced by the operations logged before it, as it would have
/// been when it was appended.
pub fn validate_plan(input: &PlanInput) -> Vec<ValidationError> {
    let mut errors = validate_loan_input(&input.loan);
    if !errors.is_empty() {
        return errors;
    }

    for (i, op) in input.operations.iter().enumerate() {
        let schedule = build_schedule(&input.loan, &input.operations[..i]);
        let prior = &input.operations[..i];
        if let Err(e) = validate_operation(&schedule, prior, op.period, &op.kind) {
            errors.push(ValidationError::new(
                &format!("operations[{}]", op.id),
                e.to_string(),
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::PaymentType;
    use crate::operation::PrepaymentMode;
    use crate::summary::MonthlyPaymentPolicy;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn loan() -> LoanInput {
        LoanInput {
            principal: dec!(300_000),
            annual_rate_percent: dec!(4.9),
            term_months: 240,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            payment_type: PaymentType::EqualPayment,
        }
    }

    #[test]
    fn test_valid_loan_has_no_errors() {
        assert!(validate_loan_input(&loan()).is_empty());
        assert!(ensure_valid_loan(&loan()).is_ok());
    }

    #[test]
    fn test_collects_every_broken_rule() {
        let mut input = loan();
        input.principal = dec!(200_000_000);
        input.annual_rate_percent = dec!(60);
        input.term_months = 0;
        let errors = validate_loan_input(&input);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["principal", "annual_rate_percent", "term_months"]);
        assert!(matches!(
            ensure_valid_loan(&input),
            Err(MortgageReplayError::Validation(ref e)) if e.len() == 3
        ));
    }

    #[test]
    fn test_operation_period_must_exist() {
        let schedule = build_schedule(&loan(), &[]);
        let kind = OperationKind::RateAdjustment {
            new_rate_percent: dec!(4),
        };
        assert!(matches!(
            validate_operation(&schedule, &[], 241, &kind),
            Err(MortgageReplayError::PeriodOutOfRange { period: 241, max: 240 })
        ));
        assert!(validate_operation(&schedule, &[], 240, &kind).is_ok());
    }

    #[test]
    fn test_rate_bounds() {
        let schedule = build_schedule(&loan(), &[]);
        let too_high = OperationKind::RateAdjustment {
            new_rate_percent: dec!(50.5),
        };
        let zero = OperationKind::RateAdjustment {
            new_rate_percent: Decimal::ZERO,
        };
        assert!(validate_operation(&schedule, &[], 1, &too_high).is_err());
        assert!(validate_operation(&schedule, &[], 1, &zero).is_err());
    }

    #[test]
    fn test_payment_override_must_cover_interest() {
        let schedule = build_schedule(&loan(), &[]);
        let interest = schedule[0].interest;
        let short = OperationKind::PaymentAdjustment {
            new_payment: interest,
        };
        let enough = OperationKind::PaymentAdjustment {
            new_payment: interest + dec!(1),
        };
        assert!(validate_operation(&schedule, &[], 1, &short).is_err());
        assert!(validate_operation(&schedule, &[], 1, &enough).is_ok());
    }

    #[test]
    fn test_prepayment_bounded_by_remaining_balance() {
        let schedule = build_schedule(&loan(), &[]);
        let balance = schedule[11].remaining_balance;
        let over = OperationKind::Prepayment {
            amount: balance + dec!(0.01),
            mode: PrepaymentMode::ReduceTerm,
        };
        let all = OperationKind::Prepayment {
            amount: balance,
            mode: PrepaymentMode::ReduceTerm,
        };
        assert!(validate_operation(&schedule, &[], 12, &over).is_err());
        assert!(validate_operation(&schedule, &[], 12, &all).is_ok());
    }

    #[test]
    fn test_plan_operations_checked_against_prior_log() {
        let stamp = Utc.timestamp_opt(0, 0).unwrap();
        let payoff = Operation::new(
            "op-1",
            12,
            OperationKind::Prepayment {
                amount: dec!(1_000_000),
                mode: PrepaymentMode::ReduceTerm,
            },
            stamp,
        );
        let late = Operation::new(
            "op-2",
            13,
            OperationKind::RateAdjustment {
                new_rate_percent: dec!(4),
            },
            stamp,
        );
        let input = PlanInput {
            loan: loan(),
            operations: vec![payoff, late],
            monthly_payment_policy: MonthlyPaymentPolicy::Representative,
        };
        let errors = validate_plan(&input);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        // op-1 exceeds the balance; the payoff it causes removes period 13.
        assert_eq!(fields, vec!["operations[op-1]", "operations[op-2]"]);
    }

    #[test]
    fn test_one_operation_of_each_kind_per_period() {
        let stamp = Utc.timestamp_opt(0, 0).unwrap();
        let prepay = OperationKind::Prepayment {
            amount: dec!(10_000),
            mode: PrepaymentMode::ReduceTerm,
        };
        let logged = vec![Operation::new("op-1", 12, prepay.clone(), stamp)];
        let schedule = build_schedule(&loan(), &logged);

        assert!(matches!(
            validate_operation(&schedule, &logged, 12, &prepay),
            Err(MortgageReplayError::InvalidOperation { ref reason, .. }) if reason.contains("op-1")
        ));
        // Other kinds and other periods are unaffected.
        let rate = OperationKind::RateAdjustment {
            new_rate_percent: dec!(4),
        };
        assert!(validate_operation(&schedule, &logged, 12, &rate).is_ok());
        assert!(validate_operation(&schedule, &logged, 13, &prepay).is_ok());

        let input = PlanInput {
            loan: loan(),
            operations: vec![
                logged[0].clone(),
                Operation::new("op-2", 12, prepay, stamp),
            ],
            monthly_payment_policy: MonthlyPaymentPolicy::Representative,
        };
        let fields: Vec<String> = validate_plan(&input).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["operations[op-2]".to_string()]);
    }
}
