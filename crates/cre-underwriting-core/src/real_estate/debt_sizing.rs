use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Instant;

use crate::error::UnderwritingError;
use crate::real_estate::financing::{monthly_payment, principal_for_payment};
use crate::types::*;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    #[default]
    Permanent,
    Construction,
    Bridge,
}

impl LoanType {
    /// Lender constraints for this loan type.
    pub fn constraints(self) -> LenderConstraints {
        match self {
            LoanType::Permanent => LenderConstraints {
                max_ltv: dec!(0.75),
                min_dscr: dec!(1.25),
                min_debt_yield: dec!(0.08),
            },
            LoanType::Construction => LenderConstraints {
                max_ltv: dec!(0.65),
                min_dscr: dec!(1.20),
                min_debt_yield: dec!(0.10),
            },
            LoanType::Bridge => LenderConstraints {
                max_ltv: dec!(0.70),
                min_dscr: dec!(1.15),
                min_debt_yield: dec!(0.09),
            },
        }
    }
}

impl FromStr for LoanType {
    type Err = UnderwritingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permanent" => Ok(LoanType::Permanent),
            "construction" => Ok(LoanType::Construction),
            "bridge" => Ok(LoanType::Bridge),
            other => Err(UnderwritingError::InvalidInput {
                field: "loan_type".into(),
                reason: format!("Unknown loan type '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LenderConstraints {
    pub max_ltv: Rate,
    pub min_dscr: Multiple,
    pub min_debt_yield: Rate,
}

fn default_interest_rate_pct() -> Percent {
    dec!(6)
}

fn default_amortization_years() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtSizingInput {
    pub noi: Money,
    pub property_value: Money,
    #[serde(default)]
    pub loan_type: LoanType,
    #[serde(default = "default_interest_rate_pct")]
    pub interest_rate_pct: Percent,
    #[serde(default = "default_amortization_years")]
    pub amortization_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtSizingOutput {
    pub loan_type: LoanType,
    pub constraints: LenderConstraints,
    pub max_by_ltv: Money,
    pub max_by_dscr: Money,
    pub max_by_debt_yield: Money,
    /// "max_ltv", "min_dscr" or "min_debt_yield"
    pub binding_constraint: String,
    pub recommended_loan_amount: Money,
    pub recommended_ltv: Rate,
    pub annual_debt_service: Money,
    /// `None` when the recommended loan is zero
    pub recommended_dscr: Option<Multiple>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Size the largest loan a lender would make under LTV, DSCR and debt-yield
/// tests, and report which one binds.
pub fn size_debt(input: &DebtSizingInput) -> UnderwritingResult<ComputationOutput<DebtSizingOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let constraints = input.loan_type.constraints();
    let monthly_rate = pct_to_rate(input.interest_rate_pct) / dec!(12);
    let months = input.amortization_years * 12;

    // -- By LTV ---------------------------------------------------------------
    let max_by_ltv = input.property_value * constraints.max_ltv;

    // -- By DSCR --------------------------------------------------------------
    // Largest level payment that keeps NOI / debt service at the minimum
    let max_monthly_payment = input.noi / constraints.min_dscr / dec!(12);
    let max_by_dscr = principal_for_payment(max_monthly_payment, monthly_rate, months)?;

    // -- By debt yield --------------------------------------------------------
    let max_by_debt_yield = input.noi / constraints.min_debt_yield;

    // -- Binding constraint ---------------------------------------------------
    let candidates = [
        ("max_ltv", max_by_ltv),
        ("min_dscr", max_by_dscr),
        ("min_debt_yield", max_by_debt_yield),
    ];
    let (binding_name, recommended) = candidates
        .iter()
        .copied()
        .min_by_key(|(_, v)| *v)
        .unwrap_or(("max_ltv", max_by_ltv));

    let annual_debt_service = monthly_payment(recommended, monthly_rate, months)? * dec!(12);
    let recommended_dscr = if annual_debt_service.is_zero() {
        None
    } else {
        Some(input.noi / annual_debt_service)
    };

    if recommended.is_zero() {
        warnings.push("NOI supports no debt under the selected loan type".into());
    }

    let output = DebtSizingOutput {
        loan_type: input.loan_type,
        constraints,
        max_by_ltv,
        max_by_dscr,
        max_by_debt_yield,
        binding_constraint: binding_name.to_string(),
        recommended_loan_amount: recommended,
        recommended_ltv: recommended / input.property_value,
        annual_debt_service,
        recommended_dscr,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "interest_rate_pct": input.interest_rate_pct.to_string(),
        "amortization_years": input.amortization_years,
        "payment": "level monthly",
    });

    Ok(with_metadata(
        "Debt Sizing (LTV / DSCR / debt yield)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &DebtSizingInput) -> UnderwritingResult<()> {
    if input.property_value <= Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "property_value".into(),
            reason: "Property value must be positive".into(),
        });
    }
    if input.noi < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "noi".into(),
            reason: "NOI cannot be negative".into(),
        });
    }
    if input.interest_rate_pct < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "interest_rate_pct".into(),
            reason: "Interest rate cannot be negative".into(),
        });
    }
    if input.amortization_years == 0 {
        return Err(UnderwritingError::InvalidInput {
            field: "amortization_years".into(),
            reason: "Amortisation period must be at least 1 year".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
