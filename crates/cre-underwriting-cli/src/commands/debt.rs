use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use cre_underwriting_core::real_estate::debt_sizing::{self, DebtSizingInput, LoanType};

use crate::input;

/// Arguments for lender debt sizing
#[derive(Args)]
pub struct SizeDebtArgs {
    /// Path to a JSON/YAML file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Stabilised annual NOI
    #[arg(long)]
    pub noi: Option<Decimal>,

    /// Appraised property value
    #[arg(long)]
    pub property_value: Option<Decimal>,

    /// Loan type: permanent, construction, bridge
    #[arg(long, default_value = "permanent")]
    pub loan_type: LoanType,

    /// Interest rate in percent
    #[arg(long, default_value_t = dec!(6))]
    pub interest_rate_pct: Decimal,

    /// Amortisation period in years
    #[arg(long, default_value_t = 25)]
    pub amortization_years: u32,
}

pub fn run_size_debt(args: SizeDebtArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sizing_input: DebtSizingInput = if let Some(ref path) = args.input {
        input::file::read_typed(path)?
    } else if let (Some(noi), Some(property_value)) = (args.noi, args.property_value) {
        DebtSizingInput {
            noi,
            property_value,
            loan_type: args.loan_type,
            interest_rate_pct: args.interest_rate_pct,
            amortization_years: args.amortization_years,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--noi and --property-value are required (or provide --input)".into());
    };

    let result = debt_sizing::size_debt(&sizing_input)?;
    Ok(serde_json::to_value(result)?)
}
