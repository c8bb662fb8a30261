use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cre_underwriting_core::scenarios::sensitivity::{
    self, SensitivityAxis, SensitivityMetric, SensitivityRequest,
};

use crate::commands::parse_deal;
use crate::input;

/// Arguments for a two-axis sensitivity grid
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to a JSON/YAML deal document
    #[arg(long)]
    pub input: Option<String>,

    /// Row axis: exit_cap_rate, rent_growth, purchase_price, rent_per_sf,
    /// vacancy, ltv, interest_rate, buildable_sf
    #[arg(long, default_value = "exit_cap_rate")]
    pub row_axis: SensitivityAxis,

    /// Column axis (same choices as --row-axis)
    #[arg(long, default_value = "rent_growth")]
    pub col_axis: SensitivityAxis,

    /// Metric: levered_irr, unlevered_irr, equity_multiple, cash_on_cash_year1
    #[arg(long, default_value = "levered_irr")]
    pub metric: SensitivityMetric,

    /// Custom row offsets (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub row_offsets: Option<Vec<Decimal>>,

    /// Custom column offsets (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub col_offsets: Option<Vec<Decimal>>,
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let value = input::read_document(args.input.as_deref())?
        .ok_or("--input <deal.json> or stdin required for sensitivity analysis")?;
    let (assumptions, options) = parse_deal(value)?;

    let request = SensitivityRequest {
        row_axis: args.row_axis,
        col_axis: args.col_axis,
        metric: args.metric,
        row_offsets: args.row_offsets,
        col_offsets: args.col_offsets,
        options,
    };

    let result = sensitivity::build_sensitivity_grid(&assumptions, &request)?;
    Ok(serde_json::to_value(result)?)
}
