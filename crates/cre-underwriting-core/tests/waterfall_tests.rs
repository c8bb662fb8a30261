use cre_underwriting_core::pe::waterfall::{
    compute_waterfall, distribute_cash_flows, PromoteTier, WaterfallStructure,
};
use cre_underwriting_core::real_estate::assumptions::{Assumptions, ProFormaOptions};
use cre_underwriting_core::real_estate::pro_forma::{compute_pro_forma, AnnualCashFlow, ProFormaResult};
use cre_underwriting_core::types::Money;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn typical_structure(total_equity: Money) -> WaterfallStructure {
    WaterfallStructure {
        total_equity,
        gp_coinvest_pct: dec!(10),
        preferred_return_pct: dec!(8),
        catch_up_pct: dec!(20),
        promote_tiers: vec![
            PromoteTier {
                hurdle_irr_pct: dec!(15),
                gp_split_pct: dec!(30),
            },
            PromoteTier {
                hurdle_irr_pct: dec!(8),
                gp_split_pct: dec!(20),
            },
        ],
    }
}

fn value_add_deal() -> Assumptions {
    let mut a = Assumptions::default();
    a.acquisition.purchase_price = dec!(12000000);
    a.income.rent_per_sf = dec!(30);
    a.income.rent_growth_pct = dec!(4);
    a.expenses.operating_expenses_per_sf = dec!(6);
    a.expenses.expense_growth_pct = dec!(2);
    a.exit.exit_cap_rate_pct = dec!(6);
    a.buildable_sf = dec!(45000);
    a
}

// ===========================================================================
// Reference scenario
// ===========================================================================

#[test]
fn test_reference_single_year_split() {
    let structure = WaterfallStructure {
        total_equity: dec!(100),
        gp_coinvest_pct: dec!(10),
        preferred_return_pct: Decimal::ZERO,
        catch_up_pct: Decimal::ZERO,
        promote_tiers: vec![PromoteTier {
            hurdle_irr_pct: Decimal::ZERO,
            gp_split_pct: dec!(20),
        }],
    };
    let mut pro_forma = ProFormaResult::default();
    pro_forma.annual_cash_flows.push(AnnualCashFlow {
        year: 1,
        levered_cash_flow: dec!(120),
        ..Default::default()
    });

    let out = compute_waterfall(&structure, &pro_forma).unwrap().result;
    assert_eq!(out.annual_distributions[0].lp_distribution, dec!(106));
    assert_eq!(out.annual_distributions[0].gp_distribution, dec!(14));
    assert_eq!(out.lp_total_distributions, dec!(106));
    assert_eq!(out.gp_total_distributions, dec!(14));
}

// ===========================================================================
// Pro forma through the waterfall
// ===========================================================================

#[test]
fn test_conservation_over_full_hold() {
    let result = compute_pro_forma(&value_add_deal(), &ProFormaOptions::default()).unwrap();
    let pro_forma = result.result;
    let structure = typical_structure(pro_forma.financing.equity_required);
    let out = compute_waterfall(&structure, &pro_forma).unwrap();

    let distributions = &out.result.annual_distributions;
    assert_eq!(distributions.len(), pro_forma.annual_cash_flows.len());
    for d in distributions {
        assert_eq!(d.lp_distribution + d.gp_distribution, d.total_cash_flow);
    }
    let last = distributions.last().unwrap();
    assert_eq!(
        last.total_cash_flow,
        pro_forma.annual_cash_flows.last().unwrap().levered_cash_flow
            + pro_forma.exit_analysis.net_proceeds
    );
    // Equity matches the pro forma, so no mismatch warning
    assert!(out.warnings.iter().all(|w| !w.contains("differs")));
}

#[test]
fn test_gp_promote_lifts_gp_irr_above_lp() {
    let pro_forma = compute_pro_forma(&value_add_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let structure = typical_structure(pro_forma.financing.equity_required);
    let out = compute_waterfall(&structure, &pro_forma).unwrap().result;

    let lp_irr = out.lp_irr.unwrap();
    let gp_irr = out.gp_irr.unwrap();
    assert!(gp_irr > lp_irr, "GP {gp_irr} should out-earn LP {lp_irr}");
    assert!(out.gp_multiple > out.lp_multiple);
    let share_total = out.lp_profit_share + out.gp_profit_share;
    assert!((share_total - Decimal::ONE).abs() < dec!(0.000001));
}

#[test]
fn test_waterfall_is_idempotent() {
    let pro_forma = compute_pro_forma(&value_add_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let structure = typical_structure(pro_forma.financing.equity_required);
    let first = compute_waterfall(&structure, &pro_forma).unwrap();
    let second = compute_waterfall(&structure, &pro_forma).unwrap();
    assert_eq!(first.result, second.result);
    assert_eq!(first.warnings, second.warnings);
    assert_eq!(
        serde_json::to_string(&first.result).unwrap(),
        serde_json::to_string(&second.result).unwrap()
    );
}

#[test]
fn test_tier_order_does_not_matter() {
    let mut ascending = typical_structure(dec!(1000));
    ascending.promote_tiers.reverse();
    let descending = typical_structure(dec!(1000));
    let flows = [dec!(80), dec!(90), dec!(100), dec!(1400)];
    assert_eq!(
        distribute_cash_flows(&ascending, &flows).unwrap(),
        distribute_cash_flows(&descending, &flows).unwrap()
    );
}

#[test]
fn test_mismatched_equity_warns() {
    let pro_forma = compute_pro_forma(&value_add_deal(), &ProFormaOptions::default())
        .unwrap()
        .result;
    let structure = typical_structure(dec!(1000000));
    let out = compute_waterfall(&structure, &pro_forma).unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("differs")));
}

#[test]
fn test_structure_round_trips_from_storage_json() {
    let structure: WaterfallStructure = serde_json::from_str(
        r#"{
            "total_equity": "2500000",
            "gp_coinvest_pct": "5",
            "preferred_return_pct": "8",
            "promote_tiers": [{"hurdle_irr_pct": "12", "gp_split_pct": "25"}]
        }"#,
    )
    .unwrap();
    assert_eq!(structure.catch_up_pct, Decimal::ZERO);
    assert_eq!(structure.promote_tiers.len(), 1);
}
