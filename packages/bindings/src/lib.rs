use chrono::{DateTime, Utc};
use mortgage_replay_core::ledger::MortgagePlan;
use mortgage_replay_core::operation::{Operation, OperationKind};
use mortgage_replay_core::plan::{self, PlanInput};
use mortgage_replay_core::replay::Schedule;
use mortgage_replay_core::summary::Summary;
use mortgage_replay_core::validation::{self, ValidationError};
use mortgage_replay_core::LoanInput;
use napi::Result as NapiResult;
use napi_derive::napi;
use serde::{Deserialize, Serialize};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Plan state handed back to the host after every log mutation. The host
/// persists `plan`; `schedule` and `summary` are derived from it.
#[derive(Serialize)]
struct PlanState<T: Serialize> {
    change: T,
    plan: PlanInput,
    schedule: Schedule,
    summary: Summary,
}

impl<T: Serialize> PlanState<T> {
    fn of(session: &MortgagePlan, change: T) -> Self {
        PlanState {
            change,
            plan: session.to_input(),
            schedule: session.schedule().clone(),
            summary: session.summary().clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

#[napi]
pub fn replay_plan(input_json: String) -> NapiResult<String> {
    let input: PlanInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = plan::analyze_plan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn summarize_plan(input_json: String) -> NapiResult<String> {
    let input: PlanInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = plan::analyze_plan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.result.summary).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Operation log
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ApplyBindingInput {
    plan: PlanInput,
    period: u32,
    operation: OperationKind,
    /// Defaults to the time of the call.
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct OperationIdBindingInput {
    plan: PlanInput,
    id: String,
}

#[napi]
pub fn apply_operation(input_json: String) -> NapiResult<String> {
    let input: ApplyBindingInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut session = MortgagePlan::from_input(input.plan).map_err(to_napi_error)?;
    let operation: Operation = session
        .apply(
            input.period,
            input.operation,
            input.timestamp.unwrap_or_else(Utc::now),
        )
        .map_err(to_napi_error)?
        .clone();
    serde_json::to_string(&PlanState::of(&session, operation)).map_err(to_napi_error)
}

#[napi]
pub fn delete_operation(input_json: String) -> NapiResult<String> {
    let input: OperationIdBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut session = MortgagePlan::from_input(input.plan).map_err(to_napi_error)?;
    let removed = session.delete(&input.id).map_err(to_napi_error)?;
    serde_json::to_string(&PlanState::of(&session, vec![removed])).map_err(to_napi_error)
}

#[napi]
pub fn revert_to_operation(input_json: String) -> NapiResult<String> {
    let input: OperationIdBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut session = MortgagePlan::from_input(input.plan).map_err(to_napi_error)?;
    let removed = session.revert_to(&input.id).map_err(to_napi_error)?;
    serde_json::to_string(&PlanState::of(&session, removed)).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ValidationOutput {
    valid: bool,
    errors: Vec<ValidationError>,
}

/// Accepts either bare loan terms or a whole plan; a plan also has every
/// logged operation checked.
#[napi]
pub fn validate_loan(input_json: String) -> NapiResult<String> {
    let errors = match serde_json::from_str::<PlanInput>(&input_json) {
        Ok(input) => validation::validate_plan(&input),
        Err(_) => {
            let loan: LoanInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
            validation::validate_loan_input(&loan)
        }
    };
    let output = ValidationOutput {
        valid: errors.is_empty(),
        errors,
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}
