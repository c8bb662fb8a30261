use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::real_estate::pro_forma::ProFormaResult;
use crate::time_value::compute_irr;
use crate::types::*;
use crate::UnderwritingResult;

const CAPITAL_CALL: &str = "Capital Call";
const RETURN_OF_CAPITAL: &str = "Return of Capital";
const PREFERRED_RETURN: &str = "Preferred Return";
const GP_CATCH_UP: &str = "GP Catch-up";
const PRO_RATA_SPLIT: &str = "Pro Rata Split";

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// An IRR hurdle above which the GP earns `gp_split_pct` of remaining cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteTier {
    pub hurdle_irr_pct: Percent,
    pub gp_split_pct: Percent,
}

/// LP/GP distribution terms for a single deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStructure {
    pub total_equity: Money,
    /// GP share of total equity
    pub gp_coinvest_pct: Percent,
    /// Simple (non-compounding) annual pref on LP unreturned capital
    #[serde(default)]
    pub preferred_return_pct: Percent,
    /// Target GP share of profit; 0 disables the catch-up
    #[serde(default)]
    pub catch_up_pct: Percent,
    /// Any order; sorted ascending by hurdle before use
    #[serde(default)]
    pub promote_tiers: Vec<PromoteTier>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Amount paid to each party by one tier in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAllocation {
    pub tier: String,
    pub to_lp: Money,
    pub to_gp: Money,
}

/// One year of the waterfall. `lp_distribution + gp_distribution ==
/// total_cash_flow` exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualDistribution {
    pub year: u32,
    pub total_cash_flow: Money,
    pub lp_distribution: Money,
    pub gp_distribution: Money,
    pub lp_cumulative: Money,
    pub gp_cumulative: Money,
    /// LP IRR through this year; `None` until the LP series changes sign
    pub lp_irr: Option<Rate>,
    /// Deepest tier that paid anything this year
    pub active_tier: String,
    pub tiers: Vec<TierAllocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallResults {
    pub lp_equity: Money,
    pub gp_equity: Money,
    pub annual_distributions: Vec<AnnualDistribution>,
    pub lp_total_distributions: Money,
    pub gp_total_distributions: Money,
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub lp_multiple: Multiple,
    pub gp_multiple: Multiple,
    /// LP share of total profit (decimal); 0 when there is no profit
    pub lp_profit_share: Rate,
    pub gp_profit_share: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Allocate a pro forma's distributable cash between LP and GP.
///
/// Year `y` distributes the levered cash flow, plus the exit net proceeds in
/// the final year.
pub fn compute_waterfall(
    structure: &WaterfallStructure,
    pro_forma: &ProFormaResult,
) -> UnderwritingResult<ComputationOutput<WaterfallResults>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if pro_forma.annual_cash_flows.is_empty() {
        return Err(UnderwritingError::InsufficientData(
            "Pro forma has no annual cash flows to distribute".into(),
        ));
    }

    let last = pro_forma.annual_cash_flows.len() - 1;
    let cash_flows: Vec<Money> = pro_forma
        .annual_cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| {
            if i == last {
                cf.levered_cash_flow + pro_forma.exit_analysis.net_proceeds
            } else {
                cf.levered_cash_flow
            }
        })
        .collect();

    let equity_required = pro_forma.financing.equity_required;
    if !equity_required.is_zero() && structure.total_equity != equity_required {
        warnings.push(format!(
            "Waterfall equity {} differs from pro forma equity requirement {}",
            structure.total_equity, equity_required
        ));
    }

    let results = distribute_cash_flows(structure, &cash_flows)?;

    if results.lp_irr.is_none() {
        warnings.push("LP IRR not computable: LP cash flows have no sign change".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "LP/GP Equity Waterfall (ROC, pref, catch-up, IRR promote)",
        &serde_json::json!({
            "total_equity": structure.total_equity.to_string(),
            "gp_coinvest_pct": structure.gp_coinvest_pct.to_string(),
            "preferred_return_pct": structure.preferred_return_pct.to_string(),
            "catch_up_pct": structure.catch_up_pct.to_string(),
            "num_promote_tiers": structure.promote_tiers.len(),
            "hold_years": cash_flows.len(),
        }),
        warnings,
        elapsed,
        results,
    ))
}

/// Run the waterfall over an explicit series of annual distributable cash
/// flows (year 1 first).
pub fn distribute_cash_flows(
    structure: &WaterfallStructure,
    cash_flows: &[Money],
) -> UnderwritingResult<WaterfallResults> {
    validate_structure(structure)?;

    let mut tiers = structure.promote_tiers.clone();
    tiers.sort_by(|a, b| a.hurdle_irr_pct.cmp(&b.hurdle_irr_pct));

    let total_equity = structure.total_equity;
    let gp_equity = total_equity * pct_to_rate(structure.gp_coinvest_pct);
    let lp_equity = total_equity - gp_equity;
    let lp_share = if total_equity.is_zero() {
        Decimal::ONE
    } else {
        lp_equity / total_equity
    };

    let mut state = WaterfallState::new(lp_equity, gp_equity);
    let mut annual_distributions = Vec::with_capacity(cash_flows.len());

    for (i, &total) in cash_flows.iter().enumerate() {
        let year = (i + 1) as u32;
        let (allocations, active_tier) = if total <= Decimal::ZERO {
            let to_lp = total * lp_share;
            (
                vec![TierAllocation {
                    tier: CAPITAL_CALL.into(),
                    to_lp,
                    to_gp: total - to_lp,
                }],
                CAPITAL_CALL.to_string(),
            )
        } else {
            state.allocate_year(structure, &tiers, lp_share, total)
        };

        let lp_distribution: Money = allocations.iter().map(|a| a.to_lp).sum();
        let gp_distribution = total - lp_distribution;

        state.lp_cumulative += lp_distribution;
        state.gp_cumulative += gp_distribution;
        state.lp_cfs.push(lp_distribution);
        state.gp_cfs.push(gp_distribution);
        let lp_irr = compute_irr(&state.lp_cfs);

        debug!(year, %total, %lp_distribution, %gp_distribution, active_tier = %active_tier, "waterfall year allocated");

        annual_distributions.push(AnnualDistribution {
            year,
            total_cash_flow: total,
            lp_distribution,
            gp_distribution,
            lp_cumulative: state.lp_cumulative,
            gp_cumulative: state.gp_cumulative,
            lp_irr,
            active_tier,
            tiers: allocations,
        });
    }

    let lp_multiple = ratio_or_zero(state.lp_cumulative, lp_equity);
    let gp_multiple = ratio_or_zero(state.gp_cumulative, gp_equity);

    let lp_profit = state.lp_cumulative - lp_equity;
    let gp_profit = state.gp_cumulative - gp_equity;
    let total_profit = lp_profit + gp_profit;
    let (lp_profit_share, gp_profit_share) = if total_profit > Decimal::ZERO {
        (lp_profit / total_profit, gp_profit / total_profit)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    Ok(WaterfallResults {
        lp_equity,
        gp_equity,
        annual_distributions,
        lp_total_distributions: state.lp_cumulative,
        gp_total_distributions: state.gp_cumulative,
        lp_irr: compute_irr(&state.lp_cfs),
        gp_irr: compute_irr(&state.gp_cfs),
        lp_multiple,
        gp_multiple,
        lp_profit_share,
        gp_profit_share,
    })
}

// ---------------------------------------------------------------------------
// Allocation state
// ---------------------------------------------------------------------------

struct WaterfallState {
    lp_unreturned: Money,
    gp_unreturned: Money,
    lp_accrued_pref: Money,
    lp_cumulative: Money,
    gp_cumulative: Money,
    /// Distributions above return of capital
    lp_profit: Money,
    gp_profit: Money,
    lp_cfs: Vec<Money>,
    gp_cfs: Vec<Money>,
}

impl WaterfallState {
    fn new(lp_equity: Money, gp_equity: Money) -> Self {
        Self {
            lp_unreturned: lp_equity,
            gp_unreturned: gp_equity,
            lp_accrued_pref: Decimal::ZERO,
            lp_cumulative: Decimal::ZERO,
            gp_cumulative: Decimal::ZERO,
            lp_profit: Decimal::ZERO,
            gp_profit: Decimal::ZERO,
            lp_cfs: vec![-lp_equity],
            gp_cfs: vec![-gp_equity],
        }
    }

    /// Run one positive year through the tiers. Every tier computes one
    /// side and assigns the remainder to the other, so nothing is lost.
    fn allocate_year(
        &mut self,
        structure: &WaterfallStructure,
        tiers: &[PromoteTier],
        lp_share: Rate,
        total: Money,
    ) -> (Vec<TierAllocation>, String) {
        let mut remaining = total;
        let mut allocations: Vec<TierAllocation> = Vec::new();
        let mut active_tier = String::from("None");
        let mut lp_this_year = Decimal::ZERO;

        self.lp_accrued_pref += self.lp_unreturned * pct_to_rate(structure.preferred_return_pct);

        // --- Return of capital ---
        let total_unreturned = self.lp_unreturned + self.gp_unreturned;
        if remaining > Decimal::ZERO && total_unreturned > Decimal::ZERO {
            let paid = remaining.min(total_unreturned);
            let to_lp = if paid == total_unreturned {
                self.lp_unreturned
            } else {
                paid * self.lp_unreturned / total_unreturned
            };
            let to_gp = paid - to_lp;
            self.lp_unreturned -= to_lp;
            self.gp_unreturned -= to_gp;
            remaining -= paid;
            lp_this_year += to_lp;
            allocations.push(TierAllocation {
                tier: RETURN_OF_CAPITAL.into(),
                to_lp,
                to_gp,
            });
            active_tier = RETURN_OF_CAPITAL.into();
        }

        // --- LP preferred return ---
        if remaining > Decimal::ZERO && self.lp_accrued_pref > Decimal::ZERO {
            let to_lp = remaining.min(self.lp_accrued_pref);
            self.lp_accrued_pref -= to_lp;
            self.lp_profit += to_lp;
            remaining -= to_lp;
            lp_this_year += to_lp;
            allocations.push(TierAllocation {
                tier: PREFERRED_RETURN.into(),
                to_lp,
                to_gp: Decimal::ZERO,
            });
            active_tier = PREFERRED_RETURN.into();
        }

        // --- GP catch-up ---
        if structure.catch_up_pct > Decimal::ZERO && remaining > Decimal::ZERO {
            let total_profit = self.lp_profit + self.gp_profit + remaining;
            let shortfall = total_profit * pct_to_rate(structure.catch_up_pct) - self.gp_profit;
            if shortfall > Decimal::ZERO {
                let to_gp = remaining.min(shortfall);
                self.gp_profit += to_gp;
                remaining -= to_gp;
                allocations.push(TierAllocation {
                    tier: GP_CATCH_UP.into(),
                    to_lp: Decimal::ZERO,
                    to_gp,
                });
                active_tier = GP_CATCH_UP.into();
            }
        }

        // --- Promote / residual split ---
        if remaining > Decimal::ZERO {
            let (tier, to_gp) = match tiers.first() {
                Some(lowest) => {
                    let mut trial_cfs = self.lp_cfs.clone();
                    trial_cfs.push(lp_this_year + remaining);
                    let trial_irr = compute_irr(&trial_cfs);

                    let reached = trial_irr.and_then(|irr| {
                        tiers
                            .iter()
                            .rev()
                            .find(|t| pct_to_rate(t.hurdle_irr_pct) <= irr)
                    });
                    match reached {
                        Some(t) => (
                            format!("Promote {}%+", t.hurdle_irr_pct.normalize()),
                            remaining * pct_to_rate(t.gp_split_pct),
                        ),
                        // Below every hurdle the lowest tier's split still applies
                        None => (
                            format!("Below {}% Hurdle", lowest.hurdle_irr_pct.normalize()),
                            remaining * pct_to_rate(lowest.gp_split_pct),
                        ),
                    }
                }
                None => (PRO_RATA_SPLIT.to_string(), remaining - remaining * lp_share),
            };
            let to_lp = remaining - to_gp;
            self.lp_profit += to_lp;
            self.gp_profit += to_gp;
            allocations.push(TierAllocation {
                tier: tier.clone(),
                to_lp,
                to_gp,
            });
            active_tier = tier;
        }

        (allocations, active_tier)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ratio_or_zero(numerator: Money, denominator: Money) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

fn validate_structure(structure: &WaterfallStructure) -> UnderwritingResult<()> {
    if structure.total_equity < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "total_equity".into(),
            reason: "Total equity cannot be negative".into(),
        });
    }
    if structure.gp_coinvest_pct < Decimal::ZERO
        || structure.gp_coinvest_pct > Decimal::ONE_HUNDRED
    {
        return Err(UnderwritingError::InvalidInput {
            field: "gp_coinvest_pct".into(),
            reason: "GP co-invest must be between 0 and 100".into(),
        });
    }
    if structure.preferred_return_pct < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "preferred_return_pct".into(),
            reason: "Preferred return cannot be negative".into(),
        });
    }
    if structure.catch_up_pct < Decimal::ZERO || structure.catch_up_pct > Decimal::ONE_HUNDRED {
        return Err(UnderwritingError::InvalidInput {
            field: "catch_up_pct".into(),
            reason: "Catch-up must be between 0 and 100".into(),
        });
    }
    for (i, tier) in structure.promote_tiers.iter().enumerate() {
        if tier.hurdle_irr_pct < Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: format!("promote_tiers[{i}].hurdle_irr_pct"),
                reason: "Hurdle cannot be negative".into(),
            });
        }
        if tier.gp_split_pct < Decimal::ZERO || tier.gp_split_pct > Decimal::ONE_HUNDRED {
            return Err(UnderwritingError::InvalidInput {
                field: format!("promote_tiers[{i}].gp_split_pct"),
                reason: "GP split must be between 0 and 100".into(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
