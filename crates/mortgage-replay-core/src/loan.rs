use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::MONTHS_PER_YEAR;
use crate::error::MortgageReplayError;
use crate::types::{Money, Percent};
use crate::MortgageReplayResult;

/// Amortisation style of the loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    /// Level instalment (annuity); the principal/interest split shifts over time.
    #[default]
    EqualPayment,
    /// Fixed principal per period; total instalment declines with interest.
    EqualPrincipal,
}

/// Original loan terms. Immutable once the plan is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInput {
    /// Amount borrowed.
    pub principal: Money,
    /// Annual nominal rate in percent (4.5 = 4.5%).
    pub annual_rate_percent: Percent,
    /// Contractual term in months; also the hard cap on schedule length.
    pub term_months: u32,
    /// Due date of the first instalment.
    pub start_date: NaiveDate,
    pub payment_type: PaymentType,
}

impl LoanInput {
    pub fn from_years(
        principal: Money,
        annual_rate_percent: Percent,
        years: u32,
        start_date: NaiveDate,
        payment_type: PaymentType,
    ) -> Self {
        LoanInput {
            principal,
            annual_rate_percent,
            term_months: years.saturating_mul(MONTHS_PER_YEAR),
            start_date,
            payment_type,
        }
    }

    /// Check the structural contract the replay engine relies on.
    ///
    /// This is narrower than caller-side validation: it only rejects terms
    /// the engine cannot amortise at all.
    pub fn check(&self) -> MortgageReplayResult<()> {
        if self.principal <= Decimal::ZERO {
            return Err(MortgageReplayError::InvalidInput {
                field: "principal".into(),
                reason: "Principal must be positive".into(),
            });
        }
        if self.annual_rate_percent <= Decimal::ZERO || self.annual_rate_percent > dec!(100) {
            return Err(MortgageReplayError::InvalidInput {
                field: "annual_rate_percent".into(),
                reason: "Annual rate must be in (0, 100]".into(),
            });
        }
        if self.term_months == 0 {
            return Err(MortgageReplayError::InvalidInput {
                field: "term_months".into(),
                reason: "Term must be at least one month".into(),
            });
        }
        Ok(())
    }

    pub fn is_well_formed(&self) -> bool {
        self.check().is_ok()
    }
}
