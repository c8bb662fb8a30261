use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use cre_underwriting_core::time_value::{self, IrrOptions, IrrSolution};
use cre_underwriting_core::types::{with_metadata, Money};

use crate::input;

/// Arguments for the IRR solver
#[derive(Args)]
pub struct IrrArgs {
    /// Path to a JSON/YAML file with `{ "cash_flows": [...] }`
    #[arg(long)]
    pub input: Option<String>,

    /// Annual cash flows, period 0 first (comma-separated, e.g. "-100,10,110")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Starting guess as a decimal rate
    #[arg(long)]
    pub guess: Option<Decimal>,

    /// Newton-Raphson iteration cap
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Absolute NPV tolerance
    #[arg(long)]
    pub tolerance: Option<Decimal>,
}

#[derive(Deserialize)]
struct IrrDocument {
    cash_flows: Vec<Money>,
}

#[derive(Serialize)]
struct IrrOutput {
    irr: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solution: Option<IrrSolution>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let cash_flows = match args.cash_flows {
        Some(flows) => flows,
        None => match input::read_document(args.input.as_deref())? {
            Some(value) => serde_json::from_value::<IrrDocument>(value)?.cash_flows,
            None => return Err("--cash-flows is required (or provide --input / stdin)".into()),
        },
    };

    let defaults = IrrOptions::default();
    let options = IrrOptions {
        guess: args.guess.unwrap_or(defaults.guess),
        max_iterations: args.max_iterations.unwrap_or(defaults.max_iterations),
        tolerance: args.tolerance.unwrap_or(defaults.tolerance),
    };

    let solution = time_value::solve_irr(&cash_flows, &options);
    let mut warnings = Vec::new();
    match &solution {
        None => warnings.push("Cash flows have no sign change; IRR undefined".to_string()),
        Some(s) if !s.converged => warnings.push(format!(
            "IRR did not converge after {} iterations; rate is a best-effort estimate",
            s.iterations
        )),
        Some(_) => {}
    }

    let output = IrrOutput {
        irr: solution.map(|s| s.rate),
        solution,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    let result = with_metadata(
        "Internal Rate of Return (Newton-Raphson with bisection fallback)",
        &options,
        warnings,
        elapsed,
        output,
    );
    Ok(serde_json::to_value(result)?)
}
