use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::summary::Summary;
use crate::types::{Money, Percent};

/// How a partial prepayment is absorbed by the remaining schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrepaymentMode {
    /// Keep the instalment, shorten the remaining term.
    ReduceTerm,
    /// Keep the remaining term, lower the instalment.
    ReducePayment,
}

impl fmt::Display for PrepaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepaymentMode::ReduceTerm => write!(f, "reduce term"),
            PrepaymentMode::ReducePayment => write!(f, "reduce payment"),
        }
    }
}

/// What an operation does, with the parameters that kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperationKind {
    /// New annual rate, effective from the period after the target.
    RateAdjustment { new_rate_percent: Percent },
    /// One-off instalment for the target period only.
    PaymentAdjustment { new_payment: Money },
    /// Extra principal paid after the target period's instalment.
    Prepayment { amount: Money, mode: PrepaymentMode },
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::RateAdjustment { .. } => "rate-adjustment",
            OperationKind::PaymentAdjustment { .. } => "payment-adjustment",
            OperationKind::Prepayment { .. } => "prepayment",
        }
    }

    pub fn prepayment_amount(&self) -> Option<Money> {
        match self {
            OperationKind::Prepayment { amount, .. } => Some(*amount),
            _ => None,
        }
    }
}

/// An entry in the operation log.
///
/// Never edited once appended; deleting or reverting removes entries. The
/// summaries are an audit read-model captured when the entry was created and
/// are never consulted by the replay engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    /// 1-based period the operation targets.
    pub period: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_summary: Option<Summary>,
}

impl Operation {
    pub fn new(
        id: impl Into<String>,
        period: u32,
        kind: OperationKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Operation {
            id: id.into(),
            period,
            timestamp,
            kind,
            payment_date: None,
            before_summary: None,
            after_summary: None,
        }
    }

    pub fn description(&self) -> String {
        match &self.kind {
            OperationKind::RateAdjustment { new_rate_percent } => {
                format!("Period {}: rate adjusted to {}%", self.period, new_rate_percent)
            }
            OperationKind::PaymentAdjustment { new_payment } => {
                format!("Period {}: payment set to {}", self.period, new_payment)
            }
            OperationKind::Prepayment { amount, mode } => {
                format!("Period {}: prepaid {} ({})", self.period, amount, mode)
            }
        }
    }
}
