use clap::Args;
use serde_json::Value;

use cre_underwriting_core::scenarios::stress;

use crate::commands::parse_deal;
use crate::input;

/// Arguments for the stress scenario run
#[derive(Args)]
pub struct StressArgs {
    /// Path to a JSON/YAML deal document; an attached
    /// `stress_scenario_bundle` replaces the default scenarios
    #[arg(long)]
    pub input: Option<String>,

    /// Print the scenario bundle instead of running it
    #[arg(long)]
    pub bundle_only: bool,
}

pub fn run_stress(args: StressArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let value = input::read_document(args.input.as_deref())?
        .ok_or("--input <deal.json> or stdin required for stress scenarios")?;
    let (assumptions, options) = parse_deal(value)?;

    if args.bundle_only {
        let with_bundle = stress::with_stress_scenario_bundle(&assumptions);
        return Ok(serde_json::to_value(with_bundle.stress_scenario_bundle)?);
    }

    let result = stress::run_stress_scenarios(&assumptions, &options)?;
    Ok(serde_json::to_value(result)?)
}
