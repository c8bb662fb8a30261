use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Percent};

#[cfg(feature = "scenarios")]
use crate::scenarios::stress::StressScenarioBundle;

// ---------------------------------------------------------------------------
// Deal assumptions
// ---------------------------------------------------------------------------

/// Deal assumptions grouped by domain. Treated as an immutable value: every
/// perturbation produces a new copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub acquisition: AcquisitionAssumptions,
    pub financing: FinancingAssumptions,
    pub income: IncomeAssumptions,
    pub expenses: ExpenseAssumptions,
    pub exit: ExitAssumptions,
    /// Rentable / buildable square footage
    pub buildable_sf: Decimal,
    /// Named stress variants attached by `with_stress_scenario_bundle`
    #[cfg(feature = "scenarios")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_scenario_bundle: Option<StressScenarioBundle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionAssumptions {
    pub purchase_price: Money,
    pub closing_costs_pct: Percent,
    /// Hold period in whole years
    pub hold_years: u32,
}

impl Default for AcquisitionAssumptions {
    fn default() -> Self {
        Self {
            purchase_price: Decimal::ZERO,
            closing_costs_pct: dec!(2),
            hold_years: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancingAssumptions {
    pub ltv_pct: Percent,
    pub interest_rate_pct: Percent,
    /// Amortisation period in years; 0 means interest-only
    pub amortization_years: u32,
}

impl Default for FinancingAssumptions {
    fn default() -> Self {
        Self {
            ltv_pct: dec!(65),
            interest_rate_pct: dec!(6.5),
            amortization_years: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeAssumptions {
    /// Annual rent per square foot
    pub rent_per_sf: Money,
    pub rent_growth_pct: Percent,
    pub vacancy_pct: Percent,
    pub collection_loss_pct: Percent,
    /// Parking, storage, etc. Grows with rent.
    pub other_income: Money,
}

impl Default for IncomeAssumptions {
    fn default() -> Self {
        Self {
            rent_per_sf: Decimal::ZERO,
            rent_growth_pct: dec!(3),
            vacancy_pct: dec!(5),
            collection_loss_pct: Decimal::ZERO,
            other_income: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseAssumptions {
    pub operating_expenses_per_sf: Money,
    pub expense_growth_pct: Percent,
    /// Management fee as a share of effective gross income
    pub management_fee_pct: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitAssumptions {
    pub exit_cap_rate_pct: Percent,
    pub selling_costs_pct: Percent,
}

impl Default for ExitAssumptions {
    fn default() -> Self {
        Self {
            exit_cap_rate_pct: dec!(6),
            selling_costs_pct: dec!(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Capital stack overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    Debt,
    LpEquity,
    GpEquity,
}

impl SourceKind {
    pub fn is_equity(self) -> bool {
        matches!(self, SourceKind::LpEquity | SourceKind::GpEquity)
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Debt => "Senior Debt",
            SourceKind::LpEquity => "LP Equity",
            SourceKind::GpEquity => "GP Equity",
        }
    }
}

/// One line of an explicit capital stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSource {
    pub source_kind: SourceKind,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CapitalSource {
    pub fn new(source_kind: SourceKind, amount: Money) -> Self {
        Self {
            source_kind,
            amount,
            label: None,
        }
    }
}

/// Development costs layered on top of the acquisition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentBudget {
    pub hard_costs: Money,
    pub soft_costs: Money,
    /// Contingency on hard + soft costs
    pub contingency_pct: Percent,
}

impl DevelopmentBudget {
    pub fn contingency(&self) -> Money {
        (self.hard_costs + self.soft_costs) * self.contingency_pct / Decimal::ONE_HUNDRED
    }

    pub fn total(&self) -> Money {
        self.hard_costs + self.soft_costs + self.contingency()
    }
}

/// Optional inputs that change how the pro forma sizes the capital stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProFormaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_sources: Option<Vec<CapitalSource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_budget: Option<DevelopmentBudget>,
}
