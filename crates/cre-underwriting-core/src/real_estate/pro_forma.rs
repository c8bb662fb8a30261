use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::real_estate::assumptions::{Assumptions, ProFormaOptions};
use crate::real_estate::financing::LoanTerms;
use crate::real_estate::sources_uses::{build_sources_uses, SourcesAndUses};
use crate::time_value::compute_irr;
use crate::types::*;
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One projected hold year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualCashFlow {
    pub year: u32,
    pub gross_potential_rent: Money,
    pub effective_gross_income: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    /// NOI less debt service; excludes exit proceeds
    pub levered_cash_flow: Money,
    pub cumulative_cash_flow: Money,
    pub cash_on_cash: Rate,
    /// NOI / debt service; `None` without debt
    pub dscr: Option<Multiple>,
}

/// Sale at the end of the hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitAnalysis {
    pub exit_year: u32,
    pub exit_noi: Money,
    pub exit_cap_rate_pct: Percent,
    pub gross_exit_value: Money,
    pub selling_costs: Money,
    pub loan_payoff: Money,
    /// Sale proceeds before loan repayment
    pub unlevered_net_proceeds: Money,
    /// Sale proceeds to equity
    pub net_proceeds: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancingSummary {
    pub loan_amount: Money,
    pub equity_required: Money,
    pub interest_rate_pct: Percent,
    pub amortization_years: u32,
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
    pub loan_balance_at_exit: Money,
}

/// Summary return metrics. `None` means not computable for this deal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    pub levered_irr: Option<Rate>,
    pub unlevered_irr: Option<Rate>,
    pub equity_multiple: Option<Multiple>,
    pub cash_on_cash_year1: Option<Rate>,
    pub average_cash_on_cash: Option<Rate>,
    pub dscr_year1: Option<Multiple>,
    pub debt_yield_year1: Option<Rate>,
}

/// Investment committee screen on headline returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    Conditional,
    #[default]
    Pass,
}

impl Recommendation {
    pub fn description(self) -> &'static str {
        match self {
            Recommendation::Proceed => "Returns exceed targets with adequate debt coverage",
            Recommendation::Conditional => {
                "Returns meet minimum thresholds; consider risk factors"
            }
            Recommendation::Pass => "Returns below investment criteria",
        }
    }
}

/// Complete pro forma output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProFormaResult {
    pub sources_and_uses: SourcesAndUses,
    pub financing: FinancingSummary,
    pub annual_cash_flows: Vec<AnnualCashFlow>,
    pub exit_analysis: ExitAnalysis,
    /// [-equity, cf_1, ..., cf_n + net_proceeds]
    pub levered_cash_flows: Vec<Money>,
    /// [-total_uses, noi_1, ..., noi_n + unlevered_net_proceeds]
    pub unlevered_cash_flows: Vec<Money>,
    pub metrics: ReturnMetrics,
    pub recommendation: Recommendation,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project an acquisition: sources & uses, annual cash flows, exit and returns.
///
/// Pure function of its inputs. Structural problems (no hold period, zero
/// exit cap) are errors; metrics that cannot be computed are `None`.
pub fn compute_pro_forma(
    assumptions: &Assumptions,
    options: &ProFormaOptions,
) -> UnderwritingResult<ComputationOutput<ProFormaResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let result = project_pro_forma(assumptions, options, &mut warnings)?;

    debug!(
        hold_years = assumptions.acquisition.hold_years,
        levered_irr = ?result.metrics.levered_irr,
        warnings = warnings.len(),
        "pro forma computed"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Acquisition Pro Forma (annual projection, direct-cap exit)",
        &serde_json::json!({
            "assumptions": assumptions,
            "options": options,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Envelope-free projection used by the grid and stress runners.
pub(crate) fn project_pro_forma(
    assumptions: &Assumptions,
    options: &ProFormaOptions,
    warnings: &mut Vec<String>,
) -> UnderwritingResult<ProFormaResult> {
    validate_assumptions(assumptions)?;

    let sources_and_uses = build_sources_uses(assumptions, options)?;
    if !sources_and_uses.is_balanced() {
        warnings.push(format!(
            "Capital stack unbalanced: sources minus uses = {}",
            sources_and_uses.uses_delta
        ));
    }

    let financing = &assumptions.financing;
    let loan = LoanTerms::new(
        sources_and_uses.debt_sources,
        financing.interest_rate_pct,
        financing.amortization_years,
    )?;
    let equity_required = sources_and_uses.equity_sources;
    if equity_required <= Decimal::ZERO {
        warnings.push("Equity required is zero or negative; equity returns not computable".into());
    }

    // --- Annual projection ---
    let annual_cash_flows = project_annual_cash_flows(assumptions, &loan, equity_required);

    // --- Exit ---
    let hold_years = assumptions.acquisition.hold_years;
    let exit_noi = annual_cash_flows
        .last()
        .map(|cf| cf.noi)
        .unwrap_or(Decimal::ZERO);
    let exit_cap_rate_pct = assumptions.exit.exit_cap_rate_pct;
    let gross_exit_value = exit_noi / pct_to_rate(exit_cap_rate_pct);
    let selling_costs = gross_exit_value * pct_to_rate(assumptions.exit.selling_costs_pct);
    let loan_payoff = loan.balance_after_years(hold_years);
    let unlevered_net_proceeds = gross_exit_value - selling_costs;
    let exit_analysis = ExitAnalysis {
        exit_year: hold_years,
        exit_noi,
        exit_cap_rate_pct,
        gross_exit_value,
        selling_costs,
        loan_payoff,
        unlevered_net_proceeds,
        net_proceeds: unlevered_net_proceeds - loan_payoff,
    };

    // --- Return series ---
    let n = annual_cash_flows.len();
    let mut levered_cash_flows = Vec::with_capacity(n + 1);
    let mut unlevered_cash_flows = Vec::with_capacity(n + 1);
    levered_cash_flows.push(-equity_required);
    unlevered_cash_flows.push(-sources_and_uses.total_uses);
    for (i, cf) in annual_cash_flows.iter().enumerate() {
        if i == n - 1 {
            levered_cash_flows.push(cf.levered_cash_flow + exit_analysis.net_proceeds);
            unlevered_cash_flows.push(cf.noi + exit_analysis.unlevered_net_proceeds);
        } else {
            levered_cash_flows.push(cf.levered_cash_flow);
            unlevered_cash_flows.push(cf.noi);
        }
    }

    let metrics = compute_metrics(
        &annual_cash_flows,
        &levered_cash_flows,
        &unlevered_cash_flows,
        equity_required,
        loan.loan_amount,
    );

    if metrics.levered_irr.is_none() {
        warnings.push("Levered IRR not computable: equity cash flows have no sign change".into());
    }
    if let Some(dscr) = metrics.dscr_year1 {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "Year 1 DSCR of {:.2}x is below the 1.20x lender covenant",
                dscr
            ));
        }
    }

    let recommendation = recommend(&metrics);

    Ok(ProFormaResult {
        sources_and_uses,
        financing: FinancingSummary {
            loan_amount: loan.loan_amount,
            equity_required,
            interest_rate_pct: loan.interest_rate_pct,
            amortization_years: loan.amortization_years,
            monthly_payment: loan.monthly_payment,
            annual_debt_service: loan.annual_debt_service,
            loan_balance_at_exit: loan_payoff,
        },
        annual_cash_flows,
        exit_analysis,
        levered_cash_flows,
        unlevered_cash_flows,
        metrics,
        recommendation,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_assumptions(assumptions: &Assumptions) -> UnderwritingResult<()> {
    if assumptions.acquisition.hold_years < 1 {
        return Err(UnderwritingError::InvalidInput {
            field: "acquisition.hold_years".into(),
            reason: "Hold period must be at least 1 year".into(),
        });
    }

    if assumptions.exit.exit_cap_rate_pct <= Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "exit.exit_cap_rate_pct".into(),
            reason: "Exit cap rate must be positive".into(),
        });
    }

    if assumptions.buildable_sf < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "buildable_sf".into(),
            reason: "Buildable square footage cannot be negative".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn project_annual_cash_flows(
    assumptions: &Assumptions,
    loan: &LoanTerms,
    equity_required: Money,
) -> Vec<AnnualCashFlow> {
    let income = &assumptions.income;
    let expenses = &assumptions.expenses;
    let sf = assumptions.buildable_sf;

    let rent_growth = Decimal::ONE + pct_to_rate(income.rent_growth_pct);
    let expense_growth = Decimal::ONE + pct_to_rate(expenses.expense_growth_pct);
    let income_loss = pct_to_rate(income.vacancy_pct) + pct_to_rate(income.collection_loss_pct);
    let debt_service = loan.annual_debt_service;

    let hold_years = assumptions.acquisition.hold_years;
    let mut rows = Vec::with_capacity(hold_years as usize);
    let mut rent_factor = Decimal::ONE;
    let mut expense_factor = Decimal::ONE;
    let mut cumulative_cash_flow = Decimal::ZERO;

    for year in 1..=hold_years {
        if year > 1 {
            rent_factor *= rent_growth;
            expense_factor *= expense_growth;
        }

        let gross_potential_rent = income.rent_per_sf * sf * rent_factor;
        let effective_gross_income = gross_potential_rent * (Decimal::ONE - income_loss)
            + income.other_income * rent_factor;
        let operating_expenses = expenses.operating_expenses_per_sf * sf * expense_factor
            + effective_gross_income * pct_to_rate(expenses.management_fee_pct);
        let noi = effective_gross_income - operating_expenses;

        let levered_cash_flow = noi - debt_service;
        cumulative_cash_flow += levered_cash_flow;

        let cash_on_cash = if equity_required.is_zero() {
            Decimal::ZERO
        } else {
            levered_cash_flow / equity_required
        };
        let dscr = if debt_service.is_zero() {
            None
        } else {
            Some(noi / debt_service)
        };

        rows.push(AnnualCashFlow {
            year,
            gross_potential_rent,
            effective_gross_income,
            operating_expenses,
            noi,
            debt_service,
            levered_cash_flow,
            cumulative_cash_flow,
            cash_on_cash,
            dscr,
        });
    }

    rows
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

fn compute_metrics(
    annual: &[AnnualCashFlow],
    levered_cash_flows: &[Money],
    unlevered_cash_flows: &[Money],
    equity_required: Money,
    loan_amount: Money,
) -> ReturnMetrics {
    let equity_multiple = if equity_required > Decimal::ZERO {
        let distributions: Money = levered_cash_flows
            .iter()
            .skip(1)
            .filter(|cf| **cf > Decimal::ZERO)
            .sum();
        Some(distributions / equity_required)
    } else {
        None
    };

    let first = annual.first();
    let average_cash_on_cash = if annual.is_empty() {
        None
    } else {
        let total: Rate = annual.iter().map(|cf| cf.cash_on_cash).sum();
        Some(total / Decimal::from(annual.len() as u64))
    };

    let debt_yield_year1 = match first {
        Some(cf) if !loan_amount.is_zero() => Some(cf.noi / loan_amount),
        _ => None,
    };

    ReturnMetrics {
        levered_irr: compute_irr(levered_cash_flows),
        unlevered_irr: compute_irr(unlevered_cash_flows),
        equity_multiple,
        cash_on_cash_year1: first.map(|cf| cf.cash_on_cash),
        average_cash_on_cash,
        dscr_year1: first.and_then(|cf| cf.dscr),
        debt_yield_year1,
    }
}

fn recommend(metrics: &ReturnMetrics) -> Recommendation {
    let (Some(irr), Some(multiple)) = (metrics.levered_irr, metrics.equity_multiple) else {
        return Recommendation::Pass;
    };
    // Unlevered deals have no coverage test to fail
    let dscr_ok = |floor: Decimal| metrics.dscr_year1.map_or(true, |d| d >= floor);

    if irr >= dec!(0.20) && multiple >= dec!(2.0) && dscr_ok(dec!(1.25)) {
        Recommendation::Proceed
    } else if irr >= dec!(0.15) && multiple >= dec!(1.8) && dscr_ok(dec!(1.20)) {
        Recommendation::Conditional
    } else {
        Recommendation::Pass
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real_estate::assumptions::{CapitalSource, SourceKind};
    use rust_decimal_macros::dec;

    /// 20,000 SF suburban office, $6.5M purchase
    fn sample_assumptions() -> Assumptions {
        let mut a = Assumptions::default();
        a.acquisition.purchase_price = dec!(6500000);
        a.acquisition.closing_costs_pct = dec!(2);
        a.acquisition.hold_years = 5;
        a.financing.ltv_pct = dec!(65);
        a.financing.interest_rate_pct = dec!(6.5);
        a.financing.amortization_years = 30;
        a.income.rent_per_sf = dec!(24);
        a.income.rent_growth_pct = dec!(3);
        a.income.vacancy_pct = dec!(5);
        a.exit.exit_cap_rate_pct = dec!(6.5);
        a.exit.selling_costs_pct = dec!(2);
        a.buildable_sf = dec!(20000);
        a
    }

    fn run(a: &Assumptions) -> ProFormaResult {
        compute_pro_forma(a, &ProFormaOptions::default())
            .unwrap()
            .result
    }

    #[test]
    fn test_year_one_noi() {
        let out = run(&sample_assumptions());
        // 24 * 20,000 * 0.95 = 456,000
        assert_eq!(out.annual_cash_flows[0].noi, dec!(456000));
        assert_eq!(out.annual_cash_flows[0].gross_potential_rent, dec!(480000));
    }

    #[test]
    fn test_rent_growth_compounds() {
        let out = run(&sample_assumptions());
        assert_eq!(out.annual_cash_flows.len(), 5);
        // Year 2 = year 1 * 1.03
        assert_eq!(out.annual_cash_flows[1].noi, dec!(469680));
        let y5 = out.annual_cash_flows[4].noi;
        assert_eq!(y5, dec!(456000) * dec!(1.03) * dec!(1.03) * dec!(1.03) * dec!(1.03));
    }

    #[test]
    fn test_levered_cash_flow_and_cumulative() {
        let out = run(&sample_assumptions());
        let mut running = Decimal::ZERO;
        for cf in &out.annual_cash_flows {
            assert_eq!(cf.levered_cash_flow, cf.noi - cf.debt_service);
            running += cf.levered_cash_flow;
            assert_eq!(cf.cumulative_cash_flow, running);
            assert_eq!(
                cf.cash_on_cash,
                cf.levered_cash_flow / out.financing.equity_required
            );
        }
    }

    #[test]
    fn test_exit_valuation() {
        let out = run(&sample_assumptions());
        let exit = &out.exit_analysis;
        assert_eq!(exit.exit_noi, out.annual_cash_flows[4].noi);
        assert_eq!(exit.gross_exit_value, exit.exit_noi / dec!(0.065));
        assert_eq!(exit.selling_costs, exit.gross_exit_value * dec!(0.02));
        assert_eq!(
            exit.net_proceeds,
            exit.gross_exit_value - exit.selling_costs - exit.loan_payoff
        );
        assert!(exit.loan_payoff < out.financing.loan_amount);
    }

    #[test]
    fn test_return_series_shape() {
        let out = run(&sample_assumptions());
        assert_eq!(out.levered_cash_flows.len(), 6);
        assert_eq!(out.levered_cash_flows[0], -out.financing.equity_required);
        assert_eq!(
            out.levered_cash_flows[5],
            out.annual_cash_flows[4].levered_cash_flow + out.exit_analysis.net_proceeds
        );
        assert_eq!(
            out.unlevered_cash_flows[0],
            -out.sources_and_uses.total_uses
        );
    }

    #[test]
    fn test_returns_are_plausible() {
        let out = run(&sample_assumptions());
        let m = &out.metrics;
        let levered = m.levered_irr.unwrap();
        let unlevered = m.unlevered_irr.unwrap();
        assert!(unlevered > dec!(0.05) && unlevered < dec!(0.20));
        // Positive leverage: going-in yield above the loan constant
        assert!(levered > unlevered);
        assert!(m.equity_multiple.unwrap() > Decimal::ONE);
        assert_eq!(m.cash_on_cash_year1, Some(out.annual_cash_flows[0].cash_on_cash));
    }

    #[test]
    fn test_unlevered_deal_has_no_dscr() {
        let mut a = sample_assumptions();
        a.financing.ltv_pct = Decimal::ZERO;
        let out = run(&a);
        assert_eq!(out.financing.loan_amount, Decimal::ZERO);
        assert_eq!(out.metrics.dscr_year1, None);
        assert_eq!(out.metrics.debt_yield_year1, None);
        // No debt: levered and unlevered series coincide
        assert_eq!(out.metrics.levered_irr, out.metrics.unlevered_irr);
    }

    #[test]
    fn test_zero_equity_guards() {
        let mut a = sample_assumptions();
        a.financing.ltv_pct = dec!(100);
        let result = compute_pro_forma(&a, &ProFormaOptions::default()).unwrap();
        let out = &result.result;
        assert_eq!(out.financing.equity_required, Decimal::ZERO);
        assert_eq!(out.annual_cash_flows[0].cash_on_cash, Decimal::ZERO);
        assert_eq!(out.metrics.equity_multiple, None);
        assert!(result.warnings.iter().any(|w| w.contains("Equity required")));
    }

    #[test]
    fn test_capital_sources_override_ltv() {
        let options = ProFormaOptions {
            capital_sources: Some(vec![
                CapitalSource::new(SourceKind::Debt, dec!(4000000)),
                CapitalSource::new(SourceKind::LpEquity, dec!(2300000)),
                CapitalSource::new(SourceKind::GpEquity, dec!(200000)),
            ]),
            development_budget: None,
        };
        let result = compute_pro_forma(&sample_assumptions(), &options).unwrap();
        let out = &result.result;
        assert_eq!(out.financing.loan_amount, dec!(4000000));
        assert_eq!(out.financing.equity_required, dec!(2500000));
        assert_eq!(out.sources_and_uses.uses_delta, dec!(-130000));
        assert!(result.warnings.iter().any(|w| w.contains("unbalanced")));
    }

    #[test]
    fn test_expenses_and_management_fee() {
        let mut a = sample_assumptions();
        a.expenses.operating_expenses_per_sf = dec!(6);
        a.expenses.management_fee_pct = dec!(3);
        let out = run(&a);
        let y1 = &out.annual_cash_flows[0];
        // 120,000 fixed + 3% of 456,000 EGI
        assert_eq!(y1.operating_expenses, dec!(133680));
        assert_eq!(y1.noi, dec!(322320));
    }

    #[test]
    fn test_invalid_hold_period() {
        let mut a = sample_assumptions();
        a.acquisition.hold_years = 0;
        assert!(compute_pro_forma(&a, &ProFormaOptions::default()).is_err());
    }

    #[test]
    fn test_invalid_exit_cap() {
        let mut a = sample_assumptions();
        a.exit.exit_cap_rate_pct = Decimal::ZERO;
        match compute_pro_forma(&a, &ProFormaOptions::default()) {
            Err(UnderwritingError::InvalidInput { field, .. }) => {
                assert_eq!(field, "exit.exit_cap_rate_pct");
            }
            other => panic!("Expected InvalidInput, got: {other:?}"),
        }
    }

    #[test]
    fn test_recommendation_thresholds() {
        let strong = ReturnMetrics {
            levered_irr: Some(dec!(0.22)),
            equity_multiple: Some(dec!(2.1)),
            dscr_year1: Some(dec!(1.4)),
            ..Default::default()
        };
        assert_eq!(recommend(&strong), Recommendation::Proceed);

        let middling = ReturnMetrics {
            levered_irr: Some(dec!(0.16)),
            equity_multiple: Some(dec!(1.9)),
            dscr_year1: None,
            ..Default::default()
        };
        assert_eq!(recommend(&middling), Recommendation::Conditional);

        let thin_coverage = ReturnMetrics {
            dscr_year1: Some(dec!(1.1)),
            ..strong.clone()
        };
        assert_eq!(recommend(&thin_coverage), Recommendation::Pass);
        assert_eq!(recommend(&ReturnMetrics::default()), Recommendation::Pass);
    }

    #[test]
    fn test_deterministic() {
        let a = sample_assumptions();
        assert_eq!(run(&a), run(&a));
    }
}
