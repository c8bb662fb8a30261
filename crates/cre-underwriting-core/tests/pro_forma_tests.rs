use cre_underwriting_core::real_estate::assumptions::{
    Assumptions, CapitalSource, DevelopmentBudget, ProFormaOptions, SourceKind,
};
use cre_underwriting_core::real_estate::debt_sizing::{size_debt, DebtSizingInput, LoanType};
use cre_underwriting_core::real_estate::pro_forma::{compute_pro_forma, Recommendation};
use cre_underwriting_core::time_value::{compute_irr, npv};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 40,000 SF multi-tenant industrial, $9.2M purchase
fn industrial_deal() -> Assumptions {
    let mut a = Assumptions::default();
    a.acquisition.purchase_price = dec!(9200000);
    a.acquisition.closing_costs_pct = dec!(1.5);
    a.acquisition.hold_years = 7;
    a.financing.ltv_pct = dec!(60);
    a.financing.interest_rate_pct = dec!(6.25);
    a.financing.amortization_years = 25;
    a.income.rent_per_sf = dec!(18.5);
    a.income.rent_growth_pct = dec!(3.5);
    a.income.vacancy_pct = dec!(4);
    a.income.collection_loss_pct = dec!(1);
    a.income.other_income = dec!(24000);
    a.expenses.operating_expenses_per_sf = dec!(3.25);
    a.expenses.expense_growth_pct = dec!(2.5);
    a.expenses.management_fee_pct = dec!(3);
    a.exit.exit_cap_rate_pct = dec!(6.75);
    a.exit.selling_costs_pct = dec!(1.5);
    a.buildable_sf = dec!(40000);
    a
}

// ===========================================================================
// Pro forma end to end
// ===========================================================================

#[test]
fn test_sources_equal_uses_without_override() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let su = &out.sources_and_uses;
    assert_eq!(su.total_uses, dec!(9338000));
    assert_eq!(su.total_sources, su.total_uses);
    assert_eq!(out.financing.loan_amount + out.financing.equity_required, su.total_uses);
}

#[test]
fn test_hold_period_drives_projection_length() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    assert_eq!(out.annual_cash_flows.len(), 7);
    assert_eq!(out.levered_cash_flows.len(), 8);
    assert_eq!(out.exit_analysis.exit_year, 7);
    let years: Vec<u32> = out.annual_cash_flows.iter().map(|cf| cf.year).collect();
    assert_eq!(years, (1..=7).collect::<Vec<u32>>());
}

#[test]
fn test_levered_irr_is_root_of_equity_series() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let irr = out.metrics.levered_irr.unwrap();
    let residual = npv(irr, &out.levered_cash_flows).unwrap();
    assert!(residual.abs() < dec!(0.0001), "NPV at IRR was {residual}");
    assert_eq!(Some(irr), compute_irr(&out.levered_cash_flows));
}

#[test]
fn test_equity_multiple_counts_positive_flows() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let positive: Decimal = out.levered_cash_flows[1..]
        .iter()
        .filter(|cf| **cf > Decimal::ZERO)
        .sum();
    assert_eq!(
        out.metrics.equity_multiple,
        Some(positive / out.financing.equity_required)
    );
}

#[test]
fn test_year_one_credit_metrics() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let y1 = &out.annual_cash_flows[0];
    assert_eq!(out.metrics.dscr_year1, Some(y1.noi / y1.debt_service));
    assert_eq!(
        out.metrics.debt_yield_year1,
        Some(y1.noi / out.financing.loan_amount)
    );
}

#[test]
fn test_idempotent_results() {
    let a = industrial_deal();
    let options = ProFormaOptions::default();
    let first = compute_pro_forma(&a, &options).unwrap();
    let second = compute_pro_forma(&a, &options).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.warnings, second.warnings);
    assert_eq!(
        serde_json::to_string(&first.result).unwrap(),
        serde_json::to_string(&second.result).unwrap()
    );
}

#[test]
fn test_long_hold_irrs_are_true_roots() {
    for hold_years in [10, 20] {
        let mut a = industrial_deal();
        a.acquisition.hold_years = hold_years;
        let out = compute_pro_forma(&a, &ProFormaOptions::default())
            .unwrap()
            .result;
        assert_eq!(out.levered_cash_flows.len(), hold_years as usize + 1);

        let levered = out.metrics.levered_irr.unwrap();
        let unlevered = out.metrics.unlevered_irr.unwrap();
        assert!(levered > dec!(-0.5) && levered < dec!(1), "levered {levered}");
        assert!(npv(levered, &out.levered_cash_flows).unwrap().abs() < dec!(0.001));
        assert!(npv(unlevered, &out.unlevered_cash_flows).unwrap().abs() < dec!(0.001));
    }
}

#[test]
fn test_development_budget_and_explicit_stack() {
    let options = ProFormaOptions {
        capital_sources: Some(vec![
            CapitalSource::new(SourceKind::Debt, dec!(6000000)),
            CapitalSource::new(SourceKind::LpEquity, dec!(3600000)),
            CapitalSource::new(SourceKind::GpEquity, dec!(400000)),
        ]),
        development_budget: Some(DevelopmentBudget {
            hard_costs: dec!(500000),
            soft_costs: dec!(100000),
            contingency_pct: dec!(10),
        }),
    };
    let result = compute_pro_forma(&industrial_deal(), &options).unwrap();
    let su = &result.result.sources_and_uses;
    // 9.2M + 138k closing + 660k development
    assert_eq!(su.total_uses, dec!(9998000));
    assert_eq!(su.uses_delta, dec!(2000));
    assert_eq!(result.result.financing.equity_required, dec!(4000000));
    assert!(result.warnings.iter().any(|w| w.contains("unbalanced")));
}

#[test]
fn test_interest_only_loan_repaid_in_full() {
    let mut a = industrial_deal();
    a.financing.amortization_years = 0;
    let out = compute_pro_forma(&a, &ProFormaOptions::default())
        .unwrap()
        .result;
    assert_eq!(out.exit_analysis.loan_payoff, out.financing.loan_amount);
    let expected = out.financing.loan_amount * dec!(0.0625);
    assert!((out.financing.annual_debt_service - expected).abs() < dec!(0.01));
}

#[test]
fn test_partial_json_document() {
    let a: Assumptions = serde_json::from_value(serde_json::json!({
        "acquisition": { "purchase_price": "2000000", "hold_years": 3 },
        "income": { "rent_per_sf": "22" },
        "buildable_sf": "10000"
    }))
    .unwrap();
    let out = compute_pro_forma(&a, &ProFormaOptions::default())
        .unwrap()
        .result;
    assert_eq!(out.annual_cash_flows.len(), 3);
    assert_eq!(out.exit_analysis.exit_cap_rate_pct, dec!(6));
}

#[test]
fn test_weak_deal_is_passed() {
    let mut a = industrial_deal();
    a.exit.exit_cap_rate_pct = dec!(9);
    a.income.rent_growth_pct = Decimal::ZERO;
    let out = compute_pro_forma(&a, &ProFormaOptions::default())
        .unwrap()
        .result;
    assert_eq!(out.recommendation, Recommendation::Pass);
}

// ===========================================================================
// Debt sizing
// ===========================================================================

#[test]
fn test_size_debt_against_pro_forma_noi() {
    let out = compute_pro_forma(&industrial_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let sizing = size_debt(&DebtSizingInput {
        noi: out.annual_cash_flows[0].noi,
        property_value: dec!(9200000),
        loan_type: LoanType::Bridge,
        interest_rate_pct: dec!(6),
        amortization_years: 25,
    })
    .unwrap()
    .result;
    let smallest = sizing
        .max_by_ltv
        .min(sizing.max_by_dscr)
        .min(sizing.max_by_debt_yield);
    assert_eq!(sizing.recommended_loan_amount, smallest);
    assert!(sizing.recommended_ltv <= dec!(0.70));
}
