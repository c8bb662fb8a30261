use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::real_estate::assumptions::{Assumptions, ProFormaOptions, SourceKind};
use crate::types::*;
use crate::UnderwritingResult;

/// Sources & Uses statement for an acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesAndUses {
    /// All sources of funds
    pub sources: Vec<(String, Money)>,
    /// All uses of funds
    pub uses: Vec<(String, Money)>,
    pub total_sources: Money,
    pub total_uses: Money,
    pub debt_sources: Money,
    pub equity_sources: Money,
    /// total_sources - total_uses; nonzero means the capital stack is unbalanced
    pub uses_delta: Money,
    /// Whether the capital stack came from explicit capital sources
    pub explicit_capital_stack: bool,
}

impl SourcesAndUses {
    pub fn is_balanced(&self) -> bool {
        self.uses_delta.is_zero()
    }
}

/// Build the Sources & Uses table. Explicit capital sources take precedence
/// over LTV-derived debt.
pub fn build_sources_uses(
    assumptions: &Assumptions,
    options: &ProFormaOptions,
) -> UnderwritingResult<SourcesAndUses> {
    let acquisition = &assumptions.acquisition;
    if acquisition.purchase_price < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "acquisition.purchase_price".into(),
            reason: "Purchase price cannot be negative".into(),
        });
    }

    // Build uses
    let mut uses: Vec<(String, Money)> = Vec::new();
    uses.push(("Purchase Price".into(), acquisition.purchase_price));

    let closing_costs = acquisition.purchase_price * pct_to_rate(acquisition.closing_costs_pct);
    if !closing_costs.is_zero() {
        uses.push(("Closing Costs".into(), closing_costs));
    }

    if let Some(budget) = &options.development_budget {
        let total = budget.total();
        if !total.is_zero() {
            uses.push(("Development Budget".into(), total));
        }
    }

    let total_uses: Money = uses.iter().map(|(_, v)| *v).sum();

    // Build sources
    let mut sources: Vec<(String, Money)> = Vec::new();
    let explicit_capital_stack = options.capital_sources.is_some();

    let (debt_sources, equity_sources) = match &options.capital_sources {
        Some(capital_sources) => {
            let mut debt = Decimal::ZERO;
            let mut equity = Decimal::ZERO;
            for src in capital_sources {
                if src.amount < Decimal::ZERO {
                    return Err(UnderwritingError::InvalidInput {
                        field: format!("capital_sources:{}", src.source_kind.label()),
                        reason: "Capital source amount cannot be negative".into(),
                    });
                }
                if src.source_kind.is_equity() {
                    equity += src.amount;
                } else {
                    debt += src.amount;
                }
                let name = src
                    .label
                    .clone()
                    .unwrap_or_else(|| src.source_kind.label().to_string());
                sources.push((name, src.amount));
            }
            (debt, equity)
        }
        None => {
            let debt = total_uses * pct_to_rate(assumptions.financing.ltv_pct);
            let equity = total_uses - debt;
            sources.push((SourceKind::Debt.label().into(), debt));
            sources.push(("Sponsor Equity".into(), equity));
            (debt, equity)
        }
    };

    let total_sources: Money = sources.iter().map(|(_, v)| *v).sum();

    Ok(SourcesAndUses {
        sources,
        uses,
        total_sources,
        total_uses,
        debt_sources,
        equity_sources,
        uses_delta: total_sources - total_uses,
        explicit_capital_stack,
    })
}
