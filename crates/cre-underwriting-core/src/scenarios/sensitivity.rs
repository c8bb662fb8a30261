use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::real_estate::assumptions::{Assumptions, ProFormaOptions};
use crate::real_estate::pro_forma::{project_pro_forma, ProFormaResult};
use crate::types::*;
use crate::UnderwritingResult;

const PP_OFFSETS: [Decimal; 7] = [
    dec!(-1.5),
    dec!(-1),
    dec!(-0.5),
    dec!(0),
    dec!(0.5),
    dec!(1),
    dec!(1.5),
];
const VACANCY_OFFSETS: [Decimal; 7] = [
    dec!(-3),
    dec!(-2),
    dec!(-1),
    dec!(0),
    dec!(1),
    dec!(2),
    dec!(3),
];
const WIDE_OFFSETS: [Decimal; 7] = [
    dec!(-15),
    dec!(-10),
    dec!(-5),
    dec!(0),
    dec!(5),
    dec!(10),
    dec!(15),
];

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// How an axis offset is applied to the base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMode {
    /// base + offset, in percentage points
    Absolute,
    /// base * (1 + offset / 100)
    Relative,
}

/// An assumption that can be swept on a sensitivity grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityAxis {
    ExitCapRate,
    RentGrowth,
    PurchasePrice,
    RentPerSf,
    Vacancy,
    Ltv,
    InterestRate,
    BuildableSf,
}

impl SensitivityAxis {
    pub const ALL: [SensitivityAxis; 8] = [
        SensitivityAxis::ExitCapRate,
        SensitivityAxis::RentGrowth,
        SensitivityAxis::PurchasePrice,
        SensitivityAxis::RentPerSf,
        SensitivityAxis::Vacancy,
        SensitivityAxis::Ltv,
        SensitivityAxis::InterestRate,
        SensitivityAxis::BuildableSf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensitivityAxis::ExitCapRate => "exit_cap_rate",
            SensitivityAxis::RentGrowth => "rent_growth",
            SensitivityAxis::PurchasePrice => "purchase_price",
            SensitivityAxis::RentPerSf => "rent_per_sf",
            SensitivityAxis::Vacancy => "vacancy",
            SensitivityAxis::Ltv => "ltv",
            SensitivityAxis::InterestRate => "interest_rate",
            SensitivityAxis::BuildableSf => "buildable_sf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensitivityAxis::ExitCapRate => "Exit Cap Rate",
            SensitivityAxis::RentGrowth => "Rent Growth",
            SensitivityAxis::PurchasePrice => "Purchase Price",
            SensitivityAxis::RentPerSf => "Rent / SF",
            SensitivityAxis::Vacancy => "Vacancy",
            SensitivityAxis::Ltv => "LTV",
            SensitivityAxis::InterestRate => "Interest Rate",
            SensitivityAxis::BuildableSf => "Buildable SF",
        }
    }

    pub fn offset_mode(self) -> OffsetMode {
        match self {
            SensitivityAxis::PurchasePrice
            | SensitivityAxis::RentPerSf
            | SensitivityAxis::BuildableSf => OffsetMode::Relative,
            _ => OffsetMode::Absolute,
        }
    }

    /// Default ordered offsets swept for this axis.
    pub fn offsets(self) -> Vec<Decimal> {
        match self {
            SensitivityAxis::ExitCapRate
            | SensitivityAxis::RentGrowth
            | SensitivityAxis::InterestRate => PP_OFFSETS.to_vec(),
            SensitivityAxis::Vacancy => VACANCY_OFFSETS.to_vec(),
            SensitivityAxis::Ltv
            | SensitivityAxis::PurchasePrice
            | SensitivityAxis::RentPerSf
            | SensitivityAxis::BuildableSf => WIDE_OFFSETS.to_vec(),
        }
    }

    pub fn base_value(self, assumptions: &Assumptions) -> Decimal {
        match self {
            SensitivityAxis::ExitCapRate => assumptions.exit.exit_cap_rate_pct,
            SensitivityAxis::RentGrowth => assumptions.income.rent_growth_pct,
            SensitivityAxis::PurchasePrice => assumptions.acquisition.purchase_price,
            SensitivityAxis::RentPerSf => assumptions.income.rent_per_sf,
            SensitivityAxis::Vacancy => assumptions.income.vacancy_pct,
            SensitivityAxis::Ltv => assumptions.financing.ltv_pct,
            SensitivityAxis::InterestRate => assumptions.financing.interest_rate_pct,
            SensitivityAxis::BuildableSf => assumptions.buildable_sf,
        }
    }

    /// Copy of `assumptions` with this axis set to `value`.
    pub fn with_value(self, assumptions: &Assumptions, value: Decimal) -> Assumptions {
        let mut next = assumptions.clone();
        match self {
            SensitivityAxis::ExitCapRate => next.exit.exit_cap_rate_pct = value,
            SensitivityAxis::RentGrowth => next.income.rent_growth_pct = value,
            SensitivityAxis::PurchasePrice => next.acquisition.purchase_price = value,
            SensitivityAxis::RentPerSf => next.income.rent_per_sf = value,
            SensitivityAxis::Vacancy => next.income.vacancy_pct = value,
            SensitivityAxis::Ltv => next.financing.ltv_pct = value,
            SensitivityAxis::InterestRate => next.financing.interest_rate_pct = value,
            SensitivityAxis::BuildableSf => next.buildable_sf = value,
        }
        next
    }

    /// Axis value after applying `offset` to the base.
    pub fn offset_value(self, assumptions: &Assumptions, offset: Decimal) -> Decimal {
        let base = self.base_value(assumptions);
        match self.offset_mode() {
            OffsetMode::Absolute => base + offset,
            OffsetMode::Relative => base * (Decimal::ONE + pct_to_rate(offset)),
        }
    }

    /// Apply `offset`; a zero offset returns the assumptions unchanged.
    pub fn apply_offset(self, assumptions: &Assumptions, offset: Decimal) -> Assumptions {
        if offset.is_zero() {
            return assumptions.clone();
        }
        self.with_value(assumptions, self.offset_value(assumptions, offset))
    }

    pub fn format_value(self, value: Decimal) -> String {
        match self {
            SensitivityAxis::PurchasePrice => format!("${}", value.round_dp(0)),
            SensitivityAxis::RentPerSf => format!("${:.2}/SF", value),
            SensitivityAxis::BuildableSf => format!("{} SF", value.round_dp(0)),
            _ => format!("{:.2}%", value),
        }
    }
}

impl fmt::Display for SensitivityAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensitivityAxis {
    type Err = UnderwritingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        SensitivityAxis::ALL
            .iter()
            .copied()
            .find(|axis| axis.name() == key)
            .ok_or_else(|| UnderwritingError::InvalidInput {
                field: "axis".into(),
                reason: format!("Unknown sensitivity axis '{s}'"),
            })
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Pro forma output read into each grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMetric {
    LeveredIrr,
    UnleveredIrr,
    EquityMultiple,
    CashOnCashYear1,
}

impl SensitivityMetric {
    pub const ALL: [SensitivityMetric; 4] = [
        SensitivityMetric::LeveredIrr,
        SensitivityMetric::UnleveredIrr,
        SensitivityMetric::EquityMultiple,
        SensitivityMetric::CashOnCashYear1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensitivityMetric::LeveredIrr => "levered_irr",
            SensitivityMetric::UnleveredIrr => "unlevered_irr",
            SensitivityMetric::EquityMultiple => "equity_multiple",
            SensitivityMetric::CashOnCashYear1 => "cash_on_cash_year1",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensitivityMetric::LeveredIrr => "Levered IRR",
            SensitivityMetric::UnleveredIrr => "Unlevered IRR",
            SensitivityMetric::EquityMultiple => "Equity Multiple",
            SensitivityMetric::CashOnCashYear1 => "Cash-on-Cash (Year 1)",
        }
    }

    pub fn extract(self, result: &ProFormaResult) -> Option<Decimal> {
        let metrics = &result.metrics;
        match self {
            SensitivityMetric::LeveredIrr => metrics.levered_irr,
            SensitivityMetric::UnleveredIrr => metrics.unlevered_irr,
            SensitivityMetric::EquityMultiple => metrics.equity_multiple,
            SensitivityMetric::CashOnCashYear1 => metrics.cash_on_cash_year1,
        }
    }
}

impl fmt::Display for SensitivityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensitivityMetric {
    type Err = UnderwritingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        SensitivityMetric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == key)
            .ok_or_else(|| UnderwritingError::InvalidInput {
                field: "metric".into(),
                reason: format!("Unknown sensitivity metric '{s}'"),
            })
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Two-axis sweep request. Offsets default to each axis's fixed list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRequest {
    pub row_axis: SensitivityAxis,
    pub col_axis: SensitivityAxis,
    pub metric: SensitivityMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_offsets: Option<Vec<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_offsets: Option<Vec<Decimal>>,
    #[serde(default)]
    pub options: ProFormaOptions,
}

impl SensitivityRequest {
    pub fn new(
        row_axis: SensitivityAxis,
        col_axis: SensitivityAxis,
        metric: SensitivityMetric,
    ) -> Self {
        Self {
            row_axis,
            col_axis,
            metric,
            row_offsets: None,
            col_offsets: None,
            options: ProFormaOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub row_axis: SensitivityAxis,
    pub col_axis: SensitivityAxis,
    pub metric: SensitivityMetric,
    pub row_offsets: Vec<Decimal>,
    pub col_offsets: Vec<Decimal>,
    /// Axis values after applying each offset to the base
    pub row_values: Vec<Decimal>,
    pub col_values: Vec<Decimal>,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// matrix[r][c]; `None` when the metric is not computable or the cell failed
    pub matrix: Vec<Vec<Option<Decimal>>>,
    /// (row, col) of the zero-offset cell, if both axes include zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_case_position: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_case_value: Option<Decimal>,
    /// Cells whose pro forma run returned an error
    #[serde(default)]
    pub failed_cells: usize,
}

/// Sweep two assumptions over their offsets and read `metric` from the pro
/// forma at every combination. A cell that fails is recorded as `None` with a
/// warning; the sweep continues.
pub fn build_sensitivity_grid(
    assumptions: &Assumptions,
    request: &SensitivityRequest,
) -> UnderwritingResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if request.row_axis == request.col_axis {
        return Err(UnderwritingError::InvalidInput {
            field: "col_axis".into(),
            reason: format!(
                "Row and column axes must differ (both are {})",
                request.row_axis
            ),
        });
    }

    let row_axis = request.row_axis;
    let col_axis = request.col_axis;
    let row_offsets = resolve_offsets(row_axis, request.row_offsets.as_ref(), "row_offsets")?;
    let col_offsets = resolve_offsets(col_axis, request.col_offsets.as_ref(), "col_offsets")?;

    let row_values: Vec<Decimal> = row_offsets
        .iter()
        .map(|o| row_axis.offset_value(assumptions, *o))
        .collect();
    let col_values: Vec<Decimal> = col_offsets
        .iter()
        .map(|o| col_axis.offset_value(assumptions, *o))
        .collect();

    let mut failed_cells = 0usize;
    let mut matrix = Vec::with_capacity(row_offsets.len());
    for (r, row_offset) in row_offsets.iter().enumerate() {
        let row_assumptions = row_axis.apply_offset(assumptions, *row_offset);
        let mut row = Vec::with_capacity(col_offsets.len());
        for (c, col_offset) in col_offsets.iter().enumerate() {
            let cell_assumptions = col_axis.apply_offset(&row_assumptions, *col_offset);
            let mut cell_warnings = Vec::new();
            match project_pro_forma(&cell_assumptions, &request.options, &mut cell_warnings) {
                Ok(result) => row.push(request.metric.extract(&result)),
                Err(e) => {
                    failed_cells += 1;
                    warnings.push(format!(
                        "Cell ({} = {}, {} = {}) failed: {e}",
                        row_axis.label(),
                        row_axis.format_value(row_values[r]),
                        col_axis.label(),
                        col_axis.format_value(col_values[c]),
                    ));
                    row.push(None);
                }
            }
        }
        matrix.push(row);
    }

    let base_case_position = row_offsets
        .iter()
        .position(|o| o.is_zero())
        .zip(col_offsets.iter().position(|o| o.is_zero()));
    let base_case_value = base_case_position.and_then(|(r, c)| matrix[r][c]);
    if base_case_position.is_none() {
        warnings.push("Offsets do not include zero on both axes; grid has no base case".into());
    }

    debug!(
        rows = row_offsets.len(),
        cols = col_offsets.len(),
        metric = %request.metric,
        failed_cells,
        "sensitivity grid built"
    );

    let grid = SensitivityGrid {
        row_axis,
        col_axis,
        metric: request.metric,
        row_labels: row_values.iter().map(|v| row_axis.format_value(*v)).collect(),
        col_labels: col_values.iter().map(|v| col_axis.format_value(*v)).collect(),
        row_offsets,
        col_offsets,
        row_values,
        col_values,
        matrix,
        base_case_position,
        base_case_value,
        failed_cells,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Grid (pro forma re-run per cell)",
        &serde_json::json!({
            "row_axis": row_axis.name(),
            "row_offset_mode": row_axis.offset_mode(),
            "col_axis": col_axis.name(),
            "col_offset_mode": col_axis.offset_mode(),
            "metric": request.metric.name(),
        }),
        warnings,
        elapsed,
        grid,
    ))
}

fn resolve_offsets(
    axis: SensitivityAxis,
    custom: Option<&Vec<Decimal>>,
    field: &str,
) -> UnderwritingResult<Vec<Decimal>> {
    let offsets = custom.cloned().unwrap_or_else(|| axis.offsets());
    if offsets.is_empty() {
        return Err(UnderwritingError::InvalidInput {
            field: field.into(),
            reason: format!("At least one offset is required for {}", axis.label()),
        });
    }
    Ok(offsets)
}
