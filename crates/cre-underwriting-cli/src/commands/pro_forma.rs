use clap::Args;
use serde_json::Value;

use cre_underwriting_core::real_estate::pro_forma;

use crate::commands::parse_deal;
use crate::input;

/// Arguments for the acquisition pro forma
#[derive(Args)]
pub struct ProFormaArgs {
    /// Path to a JSON/YAML deal document (assumptions, optional capital
    /// sources and development budget)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the hold period in years
    #[arg(long)]
    pub hold_years: Option<u32>,
}

pub fn run_pro_forma(args: ProFormaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let value = input::read_document(args.input.as_deref())?
        .ok_or("--input <deal.json> or stdin required for the pro forma")?;
    let (mut assumptions, options) = parse_deal(value)?;
    if let Some(hold_years) = args.hold_years {
        assumptions.acquisition.hold_years = hold_years;
    }

    let result = pro_forma::compute_pro_forma(&assumptions, &options)?;
    Ok(serde_json::to_value(result)?)
}
