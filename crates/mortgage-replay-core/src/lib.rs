//! Mortgage amortisation replay.
//!
//! A schedule is never stored: it is rebuilt from the original loan terms
//! plus an append-only operation log (rate adjustments, payment overrides,
//! prepayments) every time the log changes.

pub mod amortization;
pub mod error;
pub mod loan;
pub mod operation;
pub mod plan;
pub mod replay;
pub mod summary;
pub mod types;
pub mod validation;

#[cfg(feature = "ledger")]
pub mod ledger;

pub use error::MortgageReplayError;
pub use loan::{LoanInput, PaymentType};
pub use operation::{Operation, OperationKind, PrepaymentMode};
pub use replay::{replay, AdjustmentKind, PaymentRecord, Schedule};
pub use summary::{summarize, MonthlyPaymentPolicy, Summary};
pub use types::*;

/// Standard result type for all mortgage-replay operations
pub type MortgageReplayResult<T> = Result<T, MortgageReplayError>;
