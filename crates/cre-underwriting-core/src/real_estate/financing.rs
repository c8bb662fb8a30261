use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::types::{Money, Percent, Rate};
use crate::UnderwritingResult;

/// Annual debt service and exit balance for a fixed-rate acquisition loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: Money,
    pub interest_rate_pct: Percent,
    /// 0 = interest-only
    pub amortization_years: u32,
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
}

impl LoanTerms {
    pub fn new(
        loan_amount: Money,
        interest_rate_pct: Percent,
        amortization_years: u32,
    ) -> UnderwritingResult<Self> {
        if loan_amount < Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: "loan_amount".into(),
                reason: "Loan amount cannot be negative".into(),
            });
        }
        if interest_rate_pct < Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: "interest_rate_pct".into(),
                reason: "Interest rate cannot be negative".into(),
            });
        }

        let monthly_rate = monthly_rate(interest_rate_pct);
        let monthly_payment = if amortization_years == 0 {
            loan_amount * monthly_rate
        } else {
            monthly_payment(loan_amount, monthly_rate, amortization_years * 12)?
        };

        Ok(Self {
            loan_amount,
            interest_rate_pct,
            amortization_years,
            monthly_payment,
            annual_debt_service: monthly_payment * dec!(12),
        })
    }

    /// Outstanding balance after `years` of scheduled payments.
    pub fn balance_after_years(&self, years: u32) -> Money {
        if self.amortization_years == 0 || self.loan_amount.is_zero() {
            return self.loan_amount;
        }

        let monthly_rate = monthly_rate(self.interest_rate_pct);
        let total_months = self.amortization_years * 12;
        let payments_made = (years * 12).min(total_months);

        if monthly_rate.is_zero() {
            // Straight-line amortisation
            let paid =
                self.loan_amount * Decimal::from(payments_made) / Decimal::from(total_months);
            return self.loan_amount - paid;
        }

        let mut balance = self.loan_amount;
        for _ in 0..payments_made {
            let interest = balance * monthly_rate;
            balance -= self.monthly_payment - interest;
            if balance <= Decimal::ZERO {
                return Decimal::ZERO;
            }
        }

        balance
    }
}

fn monthly_rate(interest_rate_pct: Percent) -> Rate {
    interest_rate_pct / Decimal::ONE_HUNDRED / dec!(12)
}

/// Standard fixed-rate mortgage payment: P * r(1+r)^n / ((1+r)^n - 1)
pub fn monthly_payment(
    principal: Money,
    monthly_rate: Rate,
    total_months: u32,
) -> UnderwritingResult<Money> {
    if total_months == 0 {
        return Err(UnderwritingError::DivisionByZero {
            context: "monthly payment with zero months".into(),
        });
    }

    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(total_months));
    }

    let compound = compound_factor(monthly_rate, total_months);
    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return Err(UnderwritingError::DivisionByZero {
            context: "mortgage payment denominator".into(),
        });
    }

    Ok(principal * monthly_rate * compound / denominator)
}

/// Principal supportable by a level monthly payment (inverse of
/// [`monthly_payment`]).
pub fn principal_for_payment(
    payment: Money,
    monthly_rate: Rate,
    total_months: u32,
) -> UnderwritingResult<Money> {
    if total_months == 0 {
        return Err(UnderwritingError::DivisionByZero {
            context: "loan principal with zero months".into(),
        });
    }

    if monthly_rate.is_zero() {
        return Ok(payment * Decimal::from(total_months));
    }

    let compound = compound_factor(monthly_rate, total_months);
    Ok(payment * (compound - Decimal::ONE) / (monthly_rate * compound))
}

/// (1 + r)^n via iterative multiplication
fn compound_factor(rate: Rate, periods: u32) -> Decimal {
    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound *= Decimal::ONE + rate;
    }
    compound
}
