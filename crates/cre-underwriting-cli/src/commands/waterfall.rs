use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use cre_underwriting_core::pe::waterfall::{self, WaterfallStructure};
use cre_underwriting_core::real_estate::pro_forma;

use crate::commands::parse_deal;
use crate::input;

/// Arguments for the LP/GP waterfall
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to a JSON/YAML document with `structure` and the deal
    /// `assumptions`
    #[arg(long)]
    pub input: Option<String>,

    /// Size total equity from the pro forma instead of the structure
    #[arg(long)]
    pub equity_from_pro_forma: bool,
}

#[derive(Deserialize)]
struct WaterfallDocument {
    structure: WaterfallStructure,
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let value = input::read_document(args.input.as_deref())?
        .ok_or("--input <waterfall.json> or stdin required for the waterfall")?;

    let WaterfallDocument { mut structure } = serde_json::from_value(value.clone())?;
    let (assumptions, options) = parse_deal(value)?;

    let pro_forma = pro_forma::compute_pro_forma(&assumptions, &options)?;
    if args.equity_from_pro_forma {
        structure.total_equity = pro_forma.result.financing.equity_required;
    }

    let mut result = waterfall::compute_waterfall(&structure, &pro_forma.result)?;
    // Surface pro forma warnings alongside the waterfall's own
    let mut warnings = pro_forma.warnings;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;

    Ok(serde_json::to_value(result)?)
}
