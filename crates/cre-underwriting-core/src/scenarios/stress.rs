use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::UnderwritingError;
use crate::real_estate::assumptions::{Assumptions, ProFormaOptions};
use crate::real_estate::pro_forma::project_pro_forma;
use crate::scenarios::sensitivity::SensitivityAxis;
use crate::types::*;
use crate::UnderwritingResult;

/// A named perturbation of the deal assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub id: String,
    pub name: String,
    pub probability_pct: Percent,
    pub assumptions: Assumptions,
}

/// Ordered set of stress scenarios. Probabilities are not required to sum
/// to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressScenarioBundle {
    pub scenarios: Vec<StressScenario>,
}

impl StressScenarioBundle {
    pub fn total_probability_pct(&self) -> Percent {
        self.scenarios.iter().map(|s| s.probability_pct).sum()
    }
}

/// Headline metrics from one scenario's pro forma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenarioEntry {
    pub id: String,
    pub name: String,
    pub probability_pct: Percent,
    pub levered_irr: Option<Rate>,
    pub equity_multiple: Option<Multiple>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityWeightedMetrics {
    pub levered_irr: Option<Rate>,
    pub equity_multiple: Option<Multiple>,
    /// Raw sum of scenario probabilities
    pub total_probability_pct: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResults {
    pub scenarios: Vec<StressScenarioEntry>,
    pub probability_weighted: ProbabilityWeightedMetrics,
}

// ---------------------------------------------------------------------------
// Bundle construction
// ---------------------------------------------------------------------------

/// Shift one axis by `offset` percentage points (or percent, for relative axes).
fn shifted(assumptions: &Assumptions, axis: SensitivityAxis, offset: Decimal) -> Assumptions {
    axis.apply_offset(assumptions, offset)
}

fn scenario(id: &str, name: &str, probability_pct: Decimal, assumptions: Assumptions) -> StressScenario {
    StressScenario {
        id: id.into(),
        name: name.into(),
        probability_pct,
        assumptions,
    }
}

/// Base, downside, upside and severe-downside variants of `assumptions`.
pub fn build_stress_scenario_bundle(assumptions: &Assumptions) -> StressScenarioBundle {
    let mut base = assumptions.clone();
    base.stress_scenario_bundle = None;

    let downside = shifted(&base, SensitivityAxis::RentGrowth, dec!(-1));
    let downside = shifted(&downside, SensitivityAxis::Vacancy, dec!(3));
    let downside = shifted(&downside, SensitivityAxis::ExitCapRate, dec!(0.5));

    let upside = shifted(&base, SensitivityAxis::RentGrowth, dec!(1));
    let vacancy = (upside.income.vacancy_pct - Decimal::ONE).max(Decimal::ZERO);
    let upside = SensitivityAxis::Vacancy.with_value(&upside, vacancy);
    let upside = shifted(&upside, SensitivityAxis::ExitCapRate, dec!(-0.25));

    let severe = shifted(&base, SensitivityAxis::RentGrowth, dec!(-2));
    let severe = shifted(&severe, SensitivityAxis::Vacancy, dec!(7));
    let severe = shifted(&severe, SensitivityAxis::ExitCapRate, dec!(1));
    let severe = shifted(&severe, SensitivityAxis::InterestRate, dec!(1.5));

    StressScenarioBundle {
        scenarios: vec![
            scenario("base", "Base Case", dec!(50), base),
            scenario("downside", "Downside", dec!(25), downside),
            scenario("upside", "Upside", dec!(15), upside),
            scenario("severe_downside", "Severe Downside", dec!(10), severe),
        ],
    }
}

/// Copy of `assumptions` carrying a stress bundle. An existing bundle is kept.
pub fn with_stress_scenario_bundle(assumptions: &Assumptions) -> Assumptions {
    let mut next = assumptions.clone();
    if next.stress_scenario_bundle.is_none() {
        next.stress_scenario_bundle = Some(build_stress_scenario_bundle(assumptions));
    }
    next
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Run the pro forma under every scenario of the attached bundle (or the
/// default bundle) and weight the results by probability.
pub fn run_stress_scenarios(
    assumptions: &Assumptions,
    options: &ProFormaOptions,
) -> UnderwritingResult<ComputationOutput<StressTestResults>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let bundle = match &assumptions.stress_scenario_bundle {
        Some(bundle) => bundle.clone(),
        None => build_stress_scenario_bundle(assumptions),
    };
    if bundle.scenarios.is_empty() {
        return Err(UnderwritingError::InsufficientData(
            "Stress scenario bundle has no scenarios".into(),
        ));
    }

    for s in &bundle.scenarios {
        if s.probability_pct < Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: format!("scenario:{} probability_pct", s.id),
                reason: "Probability cannot be negative".into(),
            });
        }
    }

    let mut entries = Vec::with_capacity(bundle.scenarios.len());
    for s in &bundle.scenarios {
        let mut scenario_warnings = Vec::new();
        let entry = match project_pro_forma(&s.assumptions, options, &mut scenario_warnings) {
            Ok(result) => StressScenarioEntry {
                id: s.id.clone(),
                name: s.name.clone(),
                probability_pct: s.probability_pct,
                levered_irr: result.metrics.levered_irr,
                equity_multiple: result.metrics.equity_multiple,
            },
            Err(e) => {
                warn!(scenario = %s.id, error = %e, "stress scenario failed");
                warnings.push(format!("Scenario '{}' failed: {e}", s.name));
                StressScenarioEntry {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    probability_pct: s.probability_pct,
                    levered_irr: None,
                    equity_multiple: None,
                }
            }
        };
        entries.push(entry);
    }

    let probability_weighted = compute_probability_weighted_metrics(&entries);
    if probability_weighted.total_probability_pct != Decimal::ONE_HUNDRED {
        warnings.push(format!(
            "Scenario probabilities sum to {}%, not 100%",
            probability_weighted.total_probability_pct
        ));
    }

    debug!(
        scenarios = entries.len(),
        weighted_irr = ?probability_weighted.levered_irr,
        "stress scenarios evaluated"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Probability-Weighted Stress Scenarios",
        &serde_json::json!({
            "num_scenarios": entries.len(),
            "bundle": if assumptions.stress_scenario_bundle.is_some() { "attached" } else { "default" },
            "weighting": "sum(probability_pct / 100 * value) over scenarios with a value",
        }),
        warnings,
        elapsed,
        StressTestResults {
            scenarios: entries,
            probability_weighted,
        },
    ))
}

/// Probability-weighted expectation per metric. Scenarios without a value
/// for a metric are skipped for that metric; no re-normalisation.
pub fn compute_probability_weighted_metrics(
    entries: &[StressScenarioEntry],
) -> ProbabilityWeightedMetrics {
    let weighted = |value: fn(&StressScenarioEntry) -> Option<Decimal>| {
        entries
            .iter()
            .filter_map(|e| value(e).map(|v| pct_to_rate(e.probability_pct) * v))
            .reduce(|acc, v| acc + v)
    };

    ProbabilityWeightedMetrics {
        levered_irr: weighted(|e| e.levered_irr),
        equity_multiple: weighted(|e| e.equity_multiple),
        total_probability_pct: entries.iter().map(|e| e.probability_pct).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_assumptions() -> Assumptions {
        let mut a = Assumptions::default();
        a.acquisition.purchase_price = dec!(8000000);
        a.income.rent_per_sf = dec!(32);
        a.buildable_sf = dec!(25000);
        a.expenses.operating_expenses_per_sf = dec!(7);
        a.exit.exit_cap_rate_pct = dec!(6.25);
        a
    }

    fn entry(id: &str, probability_pct: Decimal, irr: Option<Decimal>, multiple: Option<Decimal>) -> StressScenarioEntry {
        StressScenarioEntry {
            id: id.into(),
            name: id.into(),
            probability_pct,
            levered_irr: irr,
            equity_multiple: multiple,
        }
    }

    #[test]
    fn test_bundle_shape() {
        let a = sample_assumptions();
        let bundle = build_stress_scenario_bundle(&a);
        let ids: Vec<&str> = bundle.scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["base", "downside", "upside", "severe_downside"]);
        assert_eq!(bundle.total_probability_pct(), dec!(100));
        assert_eq!(bundle.scenarios[0].assumptions, a);
    }

    #[test]
    fn test_bundle_perturbations() {
        let a = sample_assumptions();
        let bundle = build_stress_scenario_bundle(&a);

        let downside = &bundle.scenarios[1].assumptions;
        assert_eq!(downside.income.rent_growth_pct, dec!(2));
        assert_eq!(downside.income.vacancy_pct, dec!(8));
        assert_eq!(downside.exit.exit_cap_rate_pct, dec!(6.75));

        let upside = &bundle.scenarios[2].assumptions;
        assert_eq!(upside.income.rent_growth_pct, dec!(4));
        assert_eq!(upside.income.vacancy_pct, dec!(4));
        assert_eq!(upside.exit.exit_cap_rate_pct, dec!(6.00));

        let severe = &bundle.scenarios[3].assumptions;
        assert_eq!(severe.income.vacancy_pct, dec!(12));
        assert_eq!(severe.exit.exit_cap_rate_pct, dec!(7.25));
        assert_eq!(severe.financing.interest_rate_pct, dec!(8.0));
    }

    #[test]
    fn test_upside_vacancy_floors_at_zero() {
        let mut a = sample_assumptions();
        a.income.vacancy_pct = dec!(0.5);
        let bundle = build_stress_scenario_bundle(&a);
        assert_eq!(bundle.scenarios[2].assumptions.income.vacancy_pct, Decimal::ZERO);
    }

    #[test]
    fn test_with_bundle_keeps_existing() {
        let a = sample_assumptions();
        let attached = with_stress_scenario_bundle(&a);
        assert!(attached.stress_scenario_bundle.is_some());
        assert!(a.stress_scenario_bundle.is_none());

        let mut custom = a.clone();
        custom.stress_scenario_bundle = Some(StressScenarioBundle {
            scenarios: vec![scenario("only", "Only", dec!(100), a.clone())],
        });
        let kept = with_stress_scenario_bundle(&custom);
        assert_eq!(kept.stress_scenario_bundle, custom.stress_scenario_bundle);
    }

    #[test]
    fn test_weighted_metrics_skip_missing_values() {
        let entries = vec![
            entry("a", dec!(50), Some(dec!(0.10)), Some(dec!(2))),
            entry("b", dec!(30), None, Some(dec!(1))),
            entry("c", dec!(20), Some(dec!(0.05)), None),
        ];
        let m = compute_probability_weighted_metrics(&entries);
        assert_eq!(m.levered_irr, Some(dec!(0.06)));
        assert_eq!(m.equity_multiple, Some(dec!(1.3)));
        assert_eq!(m.total_probability_pct, dec!(100));
    }

    #[test]
    fn test_weighted_metrics_all_missing() {
        let entries = vec![entry("a", dec!(60), None, None)];
        let m = compute_probability_weighted_metrics(&entries);
        assert_eq!(m.levered_irr, None);
        assert_eq!(m.equity_multiple, None);
        assert_eq!(compute_probability_weighted_metrics(&[]).levered_irr, None);
    }

    #[test]
    fn test_run_orders_scenarios_by_severity() {
        let out = run_stress_scenarios(&sample_assumptions(), &ProFormaOptions::default())
            .unwrap()
            .result;
        let irr = |i: usize| out.scenarios[i].levered_irr.unwrap();
        // upside > base > downside > severe
        assert!(irr(2) > irr(0));
        assert!(irr(0) > irr(1));
        assert!(irr(1) > irr(3));
        assert!(out.probability_weighted.levered_irr.is_some());
    }

    #[test]
    fn test_failing_scenario_yields_none() {
        let a = sample_assumptions();
        let mut broken = a.clone();
        broken.exit.exit_cap_rate_pct = dec!(-1);
        let mut attached = a.clone();
        attached.stress_scenario_bundle = Some(StressScenarioBundle {
            scenarios: vec![
                scenario("ok", "Ok", dec!(60), a.clone()),
                scenario("broken", "Broken", dec!(20), broken),
            ],
        });

        let result = run_stress_scenarios(&attached, &ProFormaOptions::default()).unwrap();
        let out = &result.result;
        assert_eq!(out.scenarios[1].levered_irr, None);
        assert!(result.warnings.iter().any(|w| w.contains("Broken")));
        assert!(result.warnings.iter().any(|w| w.contains("80%")));
        assert_eq!(out.probability_weighted.total_probability_pct, dec!(80));
        assert_eq!(
            out.probability_weighted.levered_irr,
            out.scenarios[0].levered_irr.map(|v| dec!(0.6) * v)
        );
    }

    #[test]
    fn test_empty_bundle_rejected() {
        let mut a = sample_assumptions();
        a.stress_scenario_bundle = Some(StressScenarioBundle::default());
        assert!(run_stress_scenarios(&a, &ProFormaOptions::default()).is_err());
    }
}
