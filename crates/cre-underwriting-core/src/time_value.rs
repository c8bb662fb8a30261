use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UnderwritingError;
use crate::types::{Money, Rate};
use crate::UnderwritingResult;

const DEFAULT_GUESS: Rate = dec!(0.10);
const DEFAULT_MAX_ITERATIONS: u32 = 100;
const DEFAULT_TOLERANCE: Decimal = dec!(0.0001);

/// Rates are kept inside this band so `1 + r` never reaches zero.
const RATE_FLOOR: Rate = dec!(-0.99);
const RATE_CEILING: Rate = dec!(100);

/// Upper end of the bisection bracket used when Newton-Raphson stalls.
const BISECTION_CEILING: Rate = dec!(10);
const BISECTION_MAX_ITERATIONS: u32 = 200;
/// Bracket width at which bisection stops refining.
const BISECTION_RATE_WIDTH: Rate = dec!(0.000000000001);

/// Solver parameters for [`solve_irr`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrOptions {
    pub guess: Rate,
    pub max_iterations: u32,
    /// Absolute NPV below which a rate is accepted as the root
    pub tolerance: Decimal,
}

impl Default for IrrOptions {
    fn default() -> Self {
        Self {
            guess: DEFAULT_GUESS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// How the returned rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrMethod {
    NewtonRaphson,
    Bisection,
    /// Newton-Raphson stopped early and no bracket existed; the rate is the
    /// last iterate, not a verified root.
    BestEffort,
}

/// Full solver outcome, including whether the rate is a verified root.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    pub rate: Rate,
    pub iterations: u32,
    pub converged: bool,
    pub method: IrrMethod,
}

/// Net Present Value of a series of annual cash flows (index 0 undiscounted).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> UnderwritingResult<Money> {
    if rate <= dec!(-1) {
        return Err(UnderwritingError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut result = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount
                .checked_mul(one_plus_r)
                .ok_or_else(|| UnderwritingError::DivisionByZero {
                    context: format!("NPV discount factor overflow at period {t}"),
                })?;
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Internal rate of return with the default guess (10%), iteration cap (100)
/// and NPV tolerance (0.0001).
///
/// Returns `None` when the series has no sign change.
pub fn compute_irr(cash_flows: &[Money]) -> Option<Rate> {
    compute_irr_with(cash_flows, &IrrOptions::default())
}

/// Internal rate of return with explicit solver parameters.
pub fn compute_irr_with(cash_flows: &[Money], options: &IrrOptions) -> Option<Rate> {
    solve_irr(cash_flows, options).map(|s| s.rate)
}

/// Internal rate of return using Newton-Raphson, falling back to bisection
/// when Newton stalls on a zero derivative, overflows, or exhausts its
/// iterations.
pub fn solve_irr(cash_flows: &[Money], options: &IrrOptions) -> Option<IrrSolution> {
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !(has_positive && has_negative) {
        return None;
    }

    let mut rate = options.guess.clamp(RATE_FLOOR, RATE_CEILING);
    let mut iterations = 0;

    for i in 0..options.max_iterations {
        iterations = i + 1;
        let Some((npv_val, dnpv)) = npv_and_derivative(cash_flows, rate) else {
            break;
        };

        if npv_val.abs() < options.tolerance {
            return Some(IrrSolution {
                rate,
                iterations,
                converged: true,
                method: IrrMethod::NewtonRaphson,
            });
        }

        if dnpv.is_zero() {
            break;
        }

        let Some(step) = npv_val.checked_div(dnpv) else {
            break;
        };
        rate = (rate - step).clamp(RATE_FLOOR, RATE_CEILING);
    }

    if let Some(solution) = bisect(cash_flows, options) {
        debug!(
            newton_iterations = iterations,
            rate = %solution.rate,
            "IRR: Newton-Raphson did not converge, bisection found a root"
        );
        return Some(solution);
    }

    debug!(
        iterations,
        rate = %rate,
        "IRR: no convergence and no bracket, returning last iterate"
    );
    Some(IrrSolution {
        rate,
        iterations,
        converged: false,
        method: IrrMethod::BestEffort,
    })
}

/// Bounded bisection over [RATE_FLOOR, BISECTION_CEILING]. Requires NPV to
/// change sign across the bracket.
///
/// The bracket is tracked with [`scaled_npv`], which stays finite near -100%
/// where the plain discounted sum overflows. A midpoint is accepted once its
/// true NPV is within tolerance or the bracket has collapsed.
fn bisect(cash_flows: &[Money], options: &IrrOptions) -> Option<IrrSolution> {
    let mut low = RATE_FLOOR;
    let mut high = BISECTION_CEILING;
    let mut low_positive = scaled_npv(cash_flows, low)?.is_sign_positive();
    let high_positive = scaled_npv(cash_flows, high)?.is_sign_positive();

    if low_positive == high_positive {
        return None;
    }

    for i in 0..BISECTION_MAX_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let within_tolerance = npv_and_derivative(cash_flows, mid)
            .is_some_and(|(npv_mid, _)| npv_mid.abs() < options.tolerance);

        if within_tolerance || high - low < BISECTION_RATE_WIDTH {
            return Some(IrrSolution {
                rate: mid,
                iterations: i + 1,
                converged: true,
                method: IrrMethod::Bisection,
            });
        }

        let mid_positive = scaled_npv(cash_flows, mid)?.is_sign_positive();
        if low_positive == mid_positive {
            low = mid;
            low_positive = mid_positive;
        } else {
            high = mid;
        }
    }

    None
}

/// NPV(r) multiplied by a positive factor so no compounding term exceeds 1:
/// `sum CF_t * (1+r)^(N-t)` below 0% (N the last period), `sum CF_t / (1+r)^t`
/// otherwise. Same sign as NPV(r) across the whole bisection bracket.
fn scaled_npv(cash_flows: &[Money], rate: Rate) -> Option<Decimal> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut total = Decimal::ZERO;
    if one_plus_r < Decimal::ONE {
        // Horner form: ((CF_0 * g + CF_1) * g + CF_2) ...
        for cf in cash_flows {
            total = total.checked_mul(one_plus_r)?.checked_add(*cf)?;
        }
    } else {
        let inv = Decimal::ONE.checked_div(one_plus_r)?;
        let mut discount = Decimal::ONE;
        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                discount = discount.checked_mul(inv)?;
            }
            total = total.checked_add(cf.checked_mul(discount)?)?;
        }
    }
    Some(total)
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
/// Returns `None` if any intermediate value overflows.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let inv = Decimal::ONE.checked_div(one_plus_r)?;
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE; // (1+r)^-t

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(inv)?;
        }
        let pv = cf.checked_mul(discount)?;
        npv = npv.checked_add(pv)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as u64).checked_mul(pv)?.checked_mul(inv)?;
            dnpv = dnpv.checked_sub(term)?;
        }
    }

    Some((npv, dnpv))
}
