use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cre_underwriting_core::pe::waterfall::WaterfallStructure;
use cre_underwriting_core::real_estate::assumptions::{Assumptions, ProFormaOptions};
use cre_underwriting_core::scenarios::sensitivity::SensitivityRequest;
use cre_underwriting_core::time_value::{IrrOptions, IrrSolution};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// `{ assumptions, options? }`
#[derive(Deserialize)]
struct DealInput {
    assumptions: Assumptions,
    #[serde(default)]
    options: ProFormaOptions,
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IrrInput {
    cash_flows: Vec<Decimal>,
    #[serde(default)]
    options: Option<IrrOptions>,
}

#[derive(Serialize)]
struct IrrOutput {
    irr: Option<Decimal>,
    solution: Option<IrrSolution>,
}

#[napi]
pub fn compute_irr(input_json: String) -> NapiResult<String> {
    let input: IrrInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let options = input.options.unwrap_or_default();
    let solution = cre_underwriting_core::time_value::solve_irr(&input.cash_flows, &options);
    let output = IrrOutput {
        irr: solution.map(|s| s.rate),
        solution,
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Real estate
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_pro_forma(input_json: String) -> NapiResult<String> {
    let input: DealInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cre_underwriting_core::real_estate::compute_pro_forma(&input.assumptions, &input.options)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn size_debt(input_json: String) -> NapiResult<String> {
    let input: cre_underwriting_core::real_estate::debt_sizing::DebtSizingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        cre_underwriting_core::real_estate::debt_sizing::size_debt(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Equity waterfall
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WaterfallInput {
    structure: WaterfallStructure,
    assumptions: Assumptions,
    #[serde(default)]
    options: ProFormaOptions,
}

#[napi]
pub fn compute_waterfall(input_json: String) -> NapiResult<String> {
    let input: WaterfallInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let pro_forma = cre_underwriting_core::real_estate::compute_pro_forma(
        &input.assumptions,
        &input.options,
    )
    .map_err(to_napi_error)?;
    let mut output =
        cre_underwriting_core::pe::waterfall::compute_waterfall(&input.structure, &pro_forma.result)
            .map_err(to_napi_error)?;
    output.warnings.extend(pro_forma.warnings);
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SensitivityInput {
    assumptions: Assumptions,
    request: SensitivityRequest,
}

#[napi]
pub fn sensitivity_grid(input_json: String) -> NapiResult<String> {
    let input: SensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cre_underwriting_core::scenarios::sensitivity::build_sensitivity_grid(
        &input.assumptions,
        &input.request,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn stress_scenarios(input_json: String) -> NapiResult<String> {
    let input: DealInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cre_underwriting_core::scenarios::stress::run_stress_scenarios(
        &input.assumptions,
        &input.options,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn stress_scenario_bundle(assumptions_json: String) -> NapiResult<String> {
    let assumptions: Assumptions =
        serde_json::from_str(&assumptions_json).map_err(to_napi_error)?;
    let bundle = cre_underwriting_core::scenarios::stress::build_stress_scenario_bundle(&assumptions);
    serde_json::to_string(&bundle).map_err(to_napi_error)
}
