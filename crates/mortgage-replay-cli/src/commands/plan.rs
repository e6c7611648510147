use chrono::Utc;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use mortgage_replay_core::ledger::MortgagePlan;
use mortgage_replay_core::operation::{OperationKind, PrepaymentMode};
use mortgage_replay_core::plan::{self, PlanInput};
use mortgage_replay_core::summary::MonthlyPaymentPolicy;
use mortgage_replay_core::validation;
use mortgage_replay_core::MortgageReplayResult;

use crate::input;

/// Where the plan comes from, shared by every plan command.
#[derive(Args)]
pub struct PlanArgs {
    /// Path to the plan file (JSON, or YAML with a .yaml/.yml extension).
    /// Read from stdin when omitted.
    #[arg(long)]
    pub input: Option<String>,

    /// Override the plan's monthly payment policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,
}

#[derive(Args)]
pub struct RateAdjustArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Period after which the new rate applies
    #[arg(long)]
    pub period: u32,

    /// New annual rate in percent (e.g. 3.9)
    #[arg(long)]
    pub rate: Decimal,

    /// Persist the updated plan back to --input
    #[arg(long)]
    pub write: bool,
}

#[derive(Args)]
pub struct AdjustPaymentArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Period whose instalment is replaced
    #[arg(long)]
    pub period: u32,

    /// Instalment to pay for that period
    #[arg(long)]
    pub payment: Decimal,

    /// Persist the updated plan back to --input
    #[arg(long)]
    pub write: bool,
}

#[derive(Args)]
pub struct PrepayArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Period at the end of which the lump sum is paid
    #[arg(long)]
    pub period: u32,

    /// Lump sum applied to principal
    #[arg(long)]
    pub amount: Decimal,

    /// Keep the instalment and shorten the term, or keep the term and lower the instalment
    #[arg(long, value_enum, default_value = "reduce-term")]
    pub mode: ModeArg,

    /// Persist the updated plan back to --input
    #[arg(long)]
    pub write: bool,
}

#[derive(Args)]
pub struct OperationIdArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Operation id (e.g. op-3)
    #[arg(long)]
    pub id: String,

    /// Persist the updated plan back to --input
    #[arg(long)]
    pub write: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Representative,
    FirstRow,
    LastRow,
}

impl From<PolicyArg> for MonthlyPaymentPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Representative => MonthlyPaymentPolicy::Representative,
            PolicyArg::FirstRow => MonthlyPaymentPolicy::FirstRow,
            PolicyArg::LastRow => MonthlyPaymentPolicy::LastRow,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    ReduceTerm,
    ReducePayment,
}

impl From<ModeArg> for PrepaymentMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::ReduceTerm => PrepaymentMode::ReduceTerm,
            ModeArg::ReducePayment => PrepaymentMode::ReducePayment,
        }
    }
}

fn load_plan(args: &PlanArgs) -> Result<PlanInput, Box<dyn std::error::Error>> {
    let mut plan: PlanInput = if let Some(ref path) = args.input {
        input::file::read_plan(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <plan.json|plan.yaml> or stdin required".into());
    };
    if let Some(policy) = args.policy {
        plan.monthly_payment_policy = policy.into();
    }
    Ok(plan)
}

/// Load the plan, apply one log mutation, replay, and optionally persist.
fn mutate<F>(args: &PlanArgs, write: bool, change: F) -> Result<Value, Box<dyn std::error::Error>>
where
    F: FnOnce(&mut MortgagePlan) -> MortgageReplayResult<Value>,
{
    if write && args.input.is_none() {
        return Err("--write requires --input".into());
    }

    let mut session = MortgagePlan::from_input(load_plan(args)?)?;
    let changed = change(&mut session)?;
    let persisted = session.to_input();

    if write {
        if let Some(ref path) = args.input {
            input::file::write_plan(path, &persisted)?;
            log::info!("plan written to {}", path);
        }
    }

    Ok(json!({
        "result": {
            "change": changed,
            "summary": session.summary(),
            "plan": persisted,
        }
    }))
}

pub fn run_schedule(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_plan(&args)?;
    let result = plan::analyze_plan(&input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_summary(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_plan(&args)?;
    let result = plan::analyze_plan(&input)?;
    let mut value = serde_json::to_value(result)?;
    // Same envelope, without the per-period rows.
    let summary = value
        .get_mut("result")
        .and_then(|r| r.get_mut("summary"))
        .map(Value::take);
    if let (Some(summary), Some(obj)) = (summary, value.as_object_mut()) {
        obj.insert("result".into(), summary);
    }
    Ok(value)
}

pub fn run_history(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let session = MortgagePlan::from_input(load_plan(&args)?)?;
    Ok(json!({
        "result": {
            "history": session.history(),
            "timeline": session.timeline(),
        }
    }))
}

pub fn run_rate_adjust(args: RateAdjustArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let kind = OperationKind::RateAdjustment {
        new_rate_percent: args.rate,
    };
    mutate(&args.plan, args.write, |session| {
        let op = session.apply(args.period, kind, Utc::now())?;
        Ok(serde_json::to_value(op)?)
    })
}

pub fn run_adjust_payment(args: AdjustPaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let kind = OperationKind::PaymentAdjustment {
        new_payment: args.payment,
    };
    mutate(&args.plan, args.write, |session| {
        let op = session.apply(args.period, kind, Utc::now())?;
        Ok(serde_json::to_value(op)?)
    })
}

pub fn run_prepay(args: PrepayArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let kind = OperationKind::Prepayment {
        amount: args.amount,
        mode: args.mode.into(),
    };
    mutate(&args.plan, args.write, |session| {
        let op = session.apply(args.period, kind, Utc::now())?;
        Ok(serde_json::to_value(op)?)
    })
}

pub fn run_delete_op(args: OperationIdArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let id = args.id.clone();
    mutate(&args.plan, args.write, move |session| {
        let removed = session.delete(&id)?;
        Ok(json!({ "removed": [removed] }))
    })
}

pub fn run_revert(args: OperationIdArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let id = args.id.clone();
    mutate(&args.plan, args.write, move |session| {
        let removed = session.revert_to(&id)?;
        Ok(json!({ "removed": removed }))
    })
}

pub fn run_validate(args: PlanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = load_plan(&args)?;
    let errors = validation::validate_plan(&input);
    Ok(json!({
        "result": {
            "valid": errors.is_empty(),
            "errors": errors,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_arg_maps_to_core_policy() {
        assert_eq!(
            MonthlyPaymentPolicy::from(PolicyArg::FirstRow),
            MonthlyPaymentPolicy::FirstRow
        );
        assert_eq!(
            MonthlyPaymentPolicy::from(PolicyArg::Representative),
            MonthlyPaymentPolicy::default()
        );
    }

    #[test]
    fn test_mode_arg_maps_to_core_mode() {
        assert_eq!(
            PrepaymentMode::from(ModeArg::ReducePayment),
            PrepaymentMode::ReducePayment
        );
    }

    #[test]
    fn test_write_without_input_is_rejected() {
        let args = PlanArgs {
            input: None,
            policy: None,
        };
        let err = mutate(&args, true, |_| Ok(Value::Null)).unwrap_err();
        assert_eq!(err.to_string(), "--write requires --input");
    }
}
