//! Price-table (French) amortization.
//!
//! Closed-form inverses of the annuity identity
//! `I = P·r / (1 − (1 + r)^−n)` plus a period-by-period schedule. Powers are
//! built from iterative discount factors (no `powd`), and nothing is rounded
//! until presentation.

use std::iter::FusedIterator;
use std::time::Instant;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DebtEngineError;
use crate::lending::rate_solver::{solve_rate, RateSolution};
use crate::types::*;
use crate::DebtEngineResult;

/// Highest admissible periodic rate (50% per period).
const MAX_PERIODIC_RATE: Rate = dec!(0.5);

/// Residual balance absorbed into the final period.
const BALANCE_EPSILON: Money = dec!(0.01);

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// The quantity being solved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unknown {
    Principal,
    Rate,
    Installment,
    Term,
}

/// Loan terms with exactly one unknown. Each variant carries the three known
/// quantities; rates are percentages per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "solve_for", rename_all = "snake_case")]
pub enum LoanTerms {
    Principal {
        installment: Money,
        rate_pct: Percent,
        term: u32,
    },
    Rate {
        principal: Money,
        installment: Money,
        term: u32,
    },
    Installment {
        principal: Money,
        rate_pct: Percent,
        term: u32,
    },
    Term {
        principal: Money,
        installment: Money,
        rate_pct: Percent,
    },
}

impl LoanTerms {
    pub fn unknown(&self) -> Unknown {
        match self {
            LoanTerms::Principal { .. } => Unknown::Principal,
            LoanTerms::Rate { .. } => Unknown::Rate,
            LoanTerms::Installment { .. } => Unknown::Installment,
            LoanTerms::Term { .. } => Unknown::Term,
        }
    }
}

/// Loan terms as they arrive from a form: any field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialLoanTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_pct: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<u32>,
}

impl TryFrom<PartialLoanTerms> for LoanTerms {
    type Error = DebtEngineError;

    fn try_from(p: PartialLoanTerms) -> Result<Self, Self::Error> {
        match (p.principal, p.installment, p.rate_pct, p.term) {
            (None, Some(installment), Some(rate_pct), Some(term)) => Ok(LoanTerms::Principal {
                installment,
                rate_pct,
                term,
            }),
            (Some(principal), Some(installment), None, Some(term)) => Ok(LoanTerms::Rate {
                principal,
                installment,
                term,
            }),
            (Some(principal), None, Some(rate_pct), Some(term)) => Ok(LoanTerms::Installment {
                principal,
                rate_pct,
                term,
            }),
            (Some(principal), Some(installment), Some(rate_pct), None) => Ok(LoanTerms::Term {
                principal,
                installment,
                rate_pct,
            }),
            (principal, installment, rate_pct, term) => {
                let missing = [
                    principal.is_none(),
                    installment.is_none(),
                    rate_pct.is_none(),
                    term.is_none(),
                ]
                .iter()
                .filter(|m| **m)
                .count();
                Err(DebtEngineError::invalid(
                    "loan_terms",
                    format!("Exactly one of principal, installment, rate_pct, term must be unknown; {missing} are missing"),
                ))
            }
        }
    }
}

/// Solved term: the exact (fractional) number of periods and the whole
/// number of periods needed to repay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSolution {
    pub exact_periods: Decimal,
    pub periods: u32,
}

/// All four quantities after solving for the unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLoan {
    pub solved_for: Unknown,
    pub principal: Money,
    pub installment: Money,
    pub periodic_rate: Rate,
    pub rate_pct: Percent,
    pub term: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_term: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_solution: Option<RateSolution>,
}

/// One period of the amortization table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub index: u32,
    pub installment: Money,
    pub interest_portion: Money,
    pub principal_portion: Money,
    pub remaining_balance: Money,
}

impl AmortizationRow {
    /// Currency presentation of the row.
    pub fn rounded(&self) -> AmortizationRow {
        AmortizationRow {
            index: self.index,
            installment: round_money(self.installment),
            interest_portion: round_money(self.interest_portion),
            principal_portion: round_money(self.principal_portion),
            remaining_balance: round_money(self.remaining_balance),
        }
    }
}

/// Input for a materialized schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub terms: LoanTerms,
}

/// Materialized schedule with totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub loan: ResolvedLoan,
    pub rows: Vec<AmortizationRow>,
    pub total_paid: Money,
    pub total_interest: Money,
    pub total_principal: Money,
}

// ---------------------------------------------------------------------------
// Closed-form inverses
// ---------------------------------------------------------------------------

/// Installment repaying `principal` over `term` periods at `rate` per period.
pub fn installment(principal: Money, rate: Rate, term: u32) -> DebtEngineResult<Money> {
    validate_amount("principal", principal)?;
    validate_rate(rate)?;
    validate_term(term)?;
    annuity_payment(principal, rate, term)
}

/// Principal repaid by `term` installments of `installment` at `rate`.
pub fn principal(installment: Money, rate: Rate, term: u32) -> DebtEngineResult<Money> {
    validate_amount("installment", installment)?;
    validate_rate(rate)?;
    validate_term(term)?;

    let annuity_factor = if rate.is_zero() {
        Decimal::from(term)
    } else {
        (Decimal::ONE - discount_factor(rate, term)) / rate
    };
    installment
        .checked_mul(annuity_factor)
        .ok_or_else(|| out_of_range("installment", installment))
}

/// Number of periods for `installment` to repay `principal` at `rate`:
///   n = −ln(1 − P·r / I) / ln(1 + r)
pub fn term(principal: Money, installment: Money, rate: Rate) -> DebtEngineResult<TermSolution> {
    validate_amount("principal", principal)?;
    validate_amount("installment", installment)?;
    validate_rate(rate)?;

    let exact_periods = if rate.is_zero() {
        principal / installment
    } else {
        let first_interest = principal * rate;
        if first_interest >= installment {
            return Err(DebtEngineError::invalid(
                "installment",
                format!(
                    "Installment {} does not cover first-period interest {}; the loan never amortizes",
                    installment,
                    round_money(first_interest)
                ),
            ));
        }
        let remaining_fraction = Decimal::ONE - first_interest / installment;
        -remaining_fraction.ln() / (Decimal::ONE + rate).ln()
    };

    // Absorb representation noise before rounding up (e.g. 24.0000000001)
    let periods = exact_periods.round_dp(6).ceil().to_u32().ok_or_else(|| {
        DebtEngineError::invalid("term", format!("Solved term {exact_periods} is out of range"))
    })?;

    Ok(TermSolution {
        exact_periods,
        periods: periods.max(1),
    })
}

/// Period-by-period schedule. The returned iterator yields each period once.
pub fn schedule(principal: Money, rate: Rate, term: u32) -> DebtEngineResult<AmortizationSchedule> {
    let pmt = installment(principal, rate, term)?;
    Ok(AmortizationSchedule {
        rate,
        term,
        installment: pmt,
        balance: principal,
        next_index: 1,
    })
}

// ---------------------------------------------------------------------------
// Schedule iterator
// ---------------------------------------------------------------------------

/// Lazily generated amortization table. Consumed once; not restartable.
#[derive(Debug)]
pub struct AmortizationSchedule {
    rate: Rate,
    term: u32,
    installment: Money,
    balance: Money,
    next_index: u32,
}

impl AmortizationSchedule {
    pub fn installment(&self) -> Money {
        self.installment
    }
}

impl Iterator for AmortizationSchedule {
    type Item = AmortizationRow;

    fn next(&mut self) -> Option<AmortizationRow> {
        if self.next_index > self.term {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;

        let interest = self.balance * self.rate;
        let principal_portion = self.installment - interest;
        let mut remaining = self.balance - principal_portion;

        if index == self.term && remaining < BALANCE_EPSILON {
            remaining = Decimal::ZERO;
        }
        self.balance = remaining;

        Some(AmortizationRow {
            index,
            installment: self.installment,
            interest_portion: interest,
            principal_portion,
            remaining_balance: remaining,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.term + 1).saturating_sub(self.next_index) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for AmortizationSchedule {}

impl FusedIterator for AmortizationSchedule {}

// ---------------------------------------------------------------------------
// Dispatch on the unknown
// ---------------------------------------------------------------------------

/// Solve `terms` for its unknown and return all four quantities.
pub fn resolve_terms(terms: &LoanTerms) -> DebtEngineResult<ComputationOutput<ResolvedLoan>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let loan = resolve(terms, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Price-table amortization (annuity identity)",
        &serde_json::json!({
            "solved_for": loan.solved_for,
            "rate_convention": "periodic, compounded once per installment",
        }),
        warnings,
        elapsed,
        loan,
    ))
}

/// Resolve the loan terms and materialize the amortization table.
pub fn build_schedule(input: &ScheduleInput) -> DebtEngineResult<ComputationOutput<ScheduleOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let loan = resolve(&input.terms, &mut warnings)?;
    let table = schedule(loan.principal, loan.periodic_rate, loan.term)?;

    if (table.installment() - loan.installment).abs() >= BALANCE_EPSILON {
        warnings.push(format!(
            "Schedule installment {} recomputed for {} whole periods (input installment {})",
            round_money(table.installment()),
            loan.term,
            loan.installment
        ));
    }

    let mut rows = Vec::with_capacity(table.len());
    let mut total_paid = Decimal::ZERO;
    let mut total_interest = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;

    for row in table {
        total_paid = total_paid
            .checked_add(row.installment)
            .ok_or_else(|| out_of_range("installment", row.installment))?;
        total_interest += row.interest_portion;
        total_principal += row.principal_portion;
        rows.push(row.rounded());
    }

    let output = ScheduleOutput {
        loan,
        rows,
        total_paid: round_money(total_paid),
        total_interest: round_money(total_interest),
        total_principal: round_money(total_principal),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Price-table amortization schedule",
        &serde_json::json!({
            "interest": "opening balance x periodic rate",
            "final_balance": "floored at zero",
            "presentation_rounding": "2 decimals",
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn resolve(terms: &LoanTerms, warnings: &mut Vec<String>) -> DebtEngineResult<ResolvedLoan> {
    let loan = match *terms {
        LoanTerms::Principal {
            installment: pmt,
            rate_pct,
            term: n,
        } => {
            let rate = pct_to_rate(rate_pct);
            ResolvedLoan {
                solved_for: Unknown::Principal,
                principal: principal(pmt, rate, n)?,
                installment: pmt,
                periodic_rate: rate,
                rate_pct,
                term: n,
                exact_term: None,
                rate_solution: None,
            }
        }
        LoanTerms::Rate {
            principal: p,
            installment: pmt,
            term: n,
        } => {
            let sol = solve_rate(p, pmt, n)?;
            if !sol.converged {
                warnings.push(format!(
                    "Rate solver did not meet tolerance; using best estimate {}%",
                    sol.rate_pct
                ));
            }
            ResolvedLoan {
                solved_for: Unknown::Rate,
                principal: p,
                installment: pmt,
                periodic_rate: sol.periodic_rate,
                rate_pct: sol.rate_pct,
                term: n,
                exact_term: None,
                rate_solution: Some(sol),
            }
        }
        LoanTerms::Installment {
            principal: p,
            rate_pct,
            term: n,
        } => {
            let rate = pct_to_rate(rate_pct);
            ResolvedLoan {
                solved_for: Unknown::Installment,
                principal: p,
                installment: installment(p, rate, n)?,
                periodic_rate: rate,
                rate_pct,
                term: n,
                exact_term: None,
                rate_solution: None,
            }
        }
        LoanTerms::Term {
            principal: p,
            installment: pmt,
            rate_pct,
        } => {
            let rate = pct_to_rate(rate_pct);
            let solved = term(p, pmt, rate)?;
            if solved.exact_periods.round_dp(6) != Decimal::from(solved.periods) {
                warnings.push(format!(
                    "Exact term {} periods rounded up to {}",
                    solved.exact_periods.round_dp(4),
                    solved.periods
                ));
            }
            ResolvedLoan {
                solved_for: Unknown::Term,
                principal: p,
                installment: pmt,
                periodic_rate: rate,
                rate_pct,
                term: solved.periods,
                exact_term: Some(solved.exact_periods),
                rate_solution: None,
            }
        }
    };
    Ok(loan)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// v^n with v = 1/(1+r), by iterative multiplication.
pub(crate) fn discount_factor(rate: Rate, periods: u32) -> Decimal {
    let v = Decimal::ONE / (Decimal::ONE + rate);
    let mut factor = Decimal::ONE;
    for _ in 0..periods {
        factor *= v;
    }
    factor
}

/// Annuity identity without validation; `rate` in [0, 0.5], `term` > 0.
/// Fails only when the installment leaves the decimal range.
pub(crate) fn annuity_payment(principal: Money, rate: Rate, term: u32) -> DebtEngineResult<Money> {
    let straight_line = principal / Decimal::from(term);
    if rate.is_zero() {
        return Ok(straight_line);
    }
    let d = Decimal::ONE - discount_factor(rate, term);
    if d.is_zero() {
        return Ok(straight_line);
    }
    principal
        .checked_mul(rate)
        .and_then(|interest| interest.checked_div(d))
        .ok_or_else(|| out_of_range("principal", principal))
}

fn out_of_range(field: &str, value: Money) -> DebtEngineError {
    DebtEngineError::invalid(
        field,
        format!("{field} {value} is too large to amortize within decimal range"),
    )
}

fn validate_amount(field: &str, value: Money) -> DebtEngineResult<()> {
    if value <= Decimal::ZERO {
        return Err(DebtEngineError::invalid(field, format!("{field} must be positive")));
    }
    Ok(())
}

fn validate_rate(rate: Rate) -> DebtEngineResult<()> {
    if rate < Decimal::ZERO || rate > MAX_PERIODIC_RATE {
        return Err(DebtEngineError::invalid(
            "rate",
            format!("Periodic rate {}% must be within [0%, 50%]", rate_to_pct(rate)),
        ));
    }
    Ok(())
}

fn validate_term(term: u32) -> DebtEngineResult<()> {
    if term == 0 {
        return Err(DebtEngineError::invalid("term", "Term must be at least 1 period"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
