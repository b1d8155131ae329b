//! Implicit periodic rate of an amortizing loan.
//!
//! Solves `installment = P·r / (1 − (1 + r)^−n)` for `r` on [0%, 50%]:
//!
//! 1. **Bounding** -- the installments implied by 0% and 50% bracket every
//!    admissible target; anything outside is `RateOutOfDomain`, and targets
//!    at or past a bound's installment return that bound.
//! 2. **Bisection** -- up to 100 halvings, stopping on a 0.01 installment
//!    tolerance or a bracket narrower than 1e-5.
//! 3. **Newton-Raphson** -- refine the bisection midpoint with the analytic
//!    derivative for up to 50 steps, until a step is under 1e-5.
//!
//! Non-convergence is not an error here: the best estimate comes back with
//! `converged = false` and callers decide (see [`RateSolution::require_convergence`]).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::DebtEngineError;
use crate::lending::amortization::{annuity_payment, discount_factor};
use crate::types::*;
use crate::DebtEngineResult;

const RATE_LOWER_BOUND: Rate = Decimal::ZERO;
const RATE_UPPER_BOUND: Rate = dec!(0.5);

const MAX_BISECTION_ITERATIONS: u32 = 100;
const MAX_NEWTON_ITERATIONS: u32 = 50;

/// Absolute installment tolerance, in currency units.
const INSTALLMENT_TOLERANCE: Money = dec!(0.01);

/// Bracket width / Newton step below which the rate is considered settled.
const RATE_TOLERANCE: Rate = dec!(0.00001);

/// Relative slack on the 50% installment, which carries division rounding.
const BOUND_RELATIVE_EPSILON: Decimal = dec!(0.00000000000000000001);

/// Derivative magnitude below which a Newton step is meaningless.
const DERIVATIVE_EPSILON: Decimal = dec!(0.000000000001);

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Which stage of the solver produced the final estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverPhase {
    /// The target matched the installment at 0% or 50% directly.
    Bound,
    Bisection,
    NewtonRaphson,
}

/// Solved periodic rate with convergence diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSolution {
    /// Unrounded fractional periodic rate.
    pub periodic_rate: Rate,
    /// Periodic rate as a percentage, 4 decimals.
    pub rate_pct: Percent,
    /// Whether the installment tolerance (or Newton step tolerance) was met.
    pub converged: bool,
    pub phase: SolverPhase,
    pub bisection_iterations: u32,
    pub newton_iterations: u32,
    /// Installment implied by `periodic_rate`.
    pub implied_installment: Money,
    /// |implied − target| installment.
    pub residual: Money,
}

impl RateSolution {
    /// Turn a flagged non-convergence into a `NonConvergence` error.
    pub fn require_convergence(self) -> DebtEngineResult<Self> {
        if self.converged {
            Ok(self)
        } else {
            Err(DebtEngineError::NonConvergence {
                function: "implicit rate".into(),
                iterations: self.bisection_iterations + self.newton_iterations,
                last_delta: self.residual,
            })
        }
    }
}

/// Input for rate inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateInferenceInput {
    pub principal: Money,
    pub installment: Money,
    pub term: u32,
}

/// Iteration limits and tolerances. `Default` holds the production values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub max_bisection_iterations: u32,
    pub max_newton_iterations: u32,
    /// Absolute installment tolerance, in currency units.
    pub installment_tolerance: Money,
    /// Bracket width / Newton step below which the rate is settled.
    pub rate_tolerance: Rate,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_bisection_iterations: MAX_BISECTION_ITERATIONS,
            max_newton_iterations: MAX_NEWTON_ITERATIONS,
            installment_tolerance: INSTALLMENT_TOLERANCE,
            rate_tolerance: RATE_TOLERANCE,
        }
    }
}

impl SolverSettings {
    fn validate(&self) -> DebtEngineResult<()> {
        if self.installment_tolerance <= Decimal::ZERO || self.rate_tolerance <= Decimal::ZERO {
            return Err(DebtEngineError::invalid(
                "solver_settings",
                "Tolerances must be positive",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Infer the periodic rate implied by `principal`, `installment` and `term`,
/// wrapped in the standard output envelope.
pub fn infer_rate(input: &RateInferenceInput) -> DebtEngineResult<ComputationOutput<RateSolution>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let settings = SolverSettings::default();
    let solution = solve_rate_with(input.principal, input.installment, input.term, &settings)?;

    if !solution.converged {
        warnings.push(format!(
            "Rate solver did not meet tolerance; best estimate {}% has installment residual {}",
            solution.rate_pct,
            round_money(solution.residual)
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Implicit periodic rate (bisection with Newton-Raphson refinement)",
        &serde_json::json!({
            "rate_bounds_pct": ["0", "50"],
            "installment_tolerance": settings.installment_tolerance.to_string(),
            "rate_tolerance": settings.rate_tolerance.to_string(),
            "max_bisection_iterations": settings.max_bisection_iterations,
            "max_newton_iterations": settings.max_newton_iterations,
        }),
        warnings,
        elapsed,
        solution,
    ))
}

/// Solve for the periodic rate `r` such that a loan of `principal` repaid in
/// `term` equal installments of `installment` satisfies the annuity identity.
pub fn solve_rate(principal: Money, installment: Money, term: u32) -> DebtEngineResult<RateSolution> {
    solve_rate_with(principal, installment, term, &SolverSettings::default())
}

/// [`solve_rate`] with explicit iteration limits and tolerances.
pub fn solve_rate_with(
    principal: Money,
    installment: Money,
    term: u32,
    settings: &SolverSettings,
) -> DebtEngineResult<RateSolution> {
    validate_solver_input(principal, installment, term)?;
    settings.validate()?;
    let tolerance = settings.installment_tolerance;

    // -- Bounding check -------------------------------------------------------
    let min_installment = annuity_payment(principal, RATE_LOWER_BOUND, term)?;
    let max_installment = annuity_payment(principal, RATE_UPPER_BOUND, term)?;

    if min_installment - installment > tolerance || installment - max_installment > tolerance {
        return Err(DebtEngineError::RateOutOfDomain {
            installment,
            min_installment: round_money(min_installment),
            max_installment: round_money(max_installment),
        });
    }

    // Admitted targets at or beyond a bound's installment clamp to that bound
    if installment <= min_installment {
        return Ok(solution(
            RATE_LOWER_BOUND,
            true,
            SolverPhase::Bound,
            0,
            0,
            min_installment,
            installment,
        ));
    }
    if installment >= max_installment - max_installment * BOUND_RELATIVE_EPSILON {
        return Ok(solution(
            RATE_UPPER_BOUND,
            true,
            SolverPhase::Bound,
            0,
            0,
            max_installment,
            installment,
        ));
    }

    // -- Bisection ------------------------------------------------------------
    let mut lo = RATE_LOWER_BOUND;
    let mut hi = RATE_UPPER_BOUND;
    let mut bisection_iterations = 0;

    for i in 1..=settings.max_bisection_iterations {
        bisection_iterations = i;
        let mid = (lo + hi) / dec!(2);
        let diff = annuity_payment(principal, mid, term)? - installment;

        if diff.abs() < tolerance {
            break;
        }

        // Installment is increasing in the rate
        if diff < Decimal::ZERO {
            lo = mid;
        } else {
            hi = mid;
        }

        if hi - lo < settings.rate_tolerance {
            break;
        }
    }
    let estimate = (lo + hi) / dec!(2);

    // -- Newton-Raphson refinement --------------------------------------------
    // An absolute installment tolerance is loose on small principals
    let mut best_rate = estimate;
    let mut best_residual = (annuity_payment(principal, estimate, term)? - installment).abs();
    let mut rate = estimate;
    let mut newton_iterations = 0;
    let mut step_converged = false;

    for i in 1..=settings.max_newton_iterations {
        newton_iterations = i;
        let f = annuity_payment(principal, rate, term)? - installment;
        let next = match annuity_payment_derivative(principal, rate, term) {
            Some(df) if df.abs() >= DERIVATIVE_EPSILON => {
                f.checked_div(df).and_then(|step| rate.checked_sub(step))
            }
            _ => None,
        };
        let Some(next) = next else {
            break;
        };
        if next < RATE_LOWER_BOUND || next > RATE_UPPER_BOUND {
            break;
        }

        let residual = (annuity_payment(principal, next, term)? - installment).abs();
        if residual < best_residual {
            best_rate = next;
            best_residual = residual;
        }

        if (next - rate).abs() < settings.rate_tolerance {
            step_converged = true;
            break;
        }
        rate = next;
    }

    let phase = if best_rate == estimate {
        SolverPhase::Bisection
    } else {
        SolverPhase::NewtonRaphson
    };
    let converged = step_converged || best_residual < tolerance;
    let implied = annuity_payment(principal, best_rate, term)?;
    Ok(solution(
        best_rate,
        converged,
        phase,
        bisection_iterations,
        newton_iterations,
        implied,
        installment,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// dI/dr for `I(r) = P·r / D(r)`, `D(r) = 1 − v^n`, `v = 1/(1+r)`:
///   dI/dr = P·(D − r·n·v^(n+1)) / D²
/// At r = 0 the limit is P·(n+1) / (2n). `None` when it leaves decimal range.
fn annuity_payment_derivative(principal: Money, rate: Rate, term: u32) -> Option<Decimal> {
    let n = Decimal::from(term);
    if rate.is_zero() {
        return principal.checked_mul((n + Decimal::ONE) / (dec!(2) * n));
    }

    let v = Decimal::ONE / (Decimal::ONE + rate);
    let vn = discount_factor(rate, term);
    let d = Decimal::ONE - vn;
    principal
        .checked_mul(d - rate * n * vn * v)?
        .checked_div(d * d)
}

fn solution(
    rate: Rate,
    converged: bool,
    phase: SolverPhase,
    bisection_iterations: u32,
    newton_iterations: u32,
    implied_installment: Money,
    target: Money,
) -> RateSolution {
    RateSolution {
        periodic_rate: rate,
        rate_pct: round_rate_pct(rate_to_pct(rate)),
        converged,
        phase,
        bisection_iterations,
        newton_iterations,
        implied_installment,
        residual: (implied_installment - target).abs(),
    }
}

fn validate_solver_input(principal: Money, installment: Money, term: u32) -> DebtEngineResult<()> {
    if principal <= Decimal::ZERO {
        return Err(DebtEngineError::invalid("principal", "Principal must be positive"));
    }
    if installment <= Decimal::ZERO {
        return Err(DebtEngineError::invalid("installment", "Installment must be positive"));
    }
    if term == 0 {
        return Err(DebtEngineError::invalid("term", "Term must be at least 1 period"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::amortization::installment;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_solve_known_rate() {
        let pmt = installment(dec!(10_000), dec!(0.02), 12).unwrap();
        let sol = solve_rate(dec!(10_000), pmt, 12).unwrap();
        assert!(sol.converged);
        assert!(approx_eq(sol.periodic_rate, dec!(0.02), dec!(0.0001)));
    }

    #[test]
    fn test_reference_scenario_forward_substitution() {
        let sol = solve_rate(dec!(100_000), dec!(5_000), 24).unwrap();
        assert!(sol.converged);
        // Forward substitution must reproduce the installment
        let pmt = installment(dec!(100_000), sol.periodic_rate, 24).unwrap();
        assert!(approx_eq(pmt, dec!(5_000), dec!(0.05)), "got {pmt}");
        assert!(approx_eq(sol.rate_pct, dec!(1.5131), dec!(0.05)));
    }

    #[test]
    fn test_zero_rate_loan() {
        let sol = solve_rate(dec!(12_000), dec!(1_000), 12).unwrap();
        assert_eq!(sol.periodic_rate, Decimal::ZERO);
        assert_eq!(sol.phase, SolverPhase::Bound);
        assert!(sol.converged);
    }

    #[test]
    fn test_upper_bound_rate() {
        // n = 1 at 50%: installment = 1.5 * P
        let sol = solve_rate(dec!(1_000), dec!(1_500), 1).unwrap();
        assert_eq!(sol.periodic_rate, dec!(0.5));
        assert_eq!(sol.phase, SolverPhase::Bound);
    }

    #[test]
    fn test_installment_below_zero_rate_is_out_of_domain() {
        let err = solve_rate(dec!(12_000), dec!(900), 12).unwrap_err();
        assert!(matches!(err, DebtEngineError::RateOutOfDomain { .. }));
    }

    #[test]
    fn test_installment_above_max_rate_is_out_of_domain() {
        let err = solve_rate(dec!(1_000), dec!(2_000), 1).unwrap_err();
        assert!(matches!(err, DebtEngineError::RateOutOfDomain { .. }));
    }

    #[test]
    fn test_reject_non_positive_inputs() {
        assert!(matches!(
            solve_rate(Decimal::ZERO, dec!(100), 12),
            Err(DebtEngineError::InvalidInput { .. })
        ));
        assert!(matches!(
            solve_rate(dec!(1_000), dec!(-1), 12),
            Err(DebtEngineError::InvalidInput { .. })
        ));
        assert!(matches!(
            solve_rate(dec!(1_000), dec!(100), 0),
            Err(DebtEngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_large_principal_uses_newton() {
        // A 1e-5 bracket moves the installment by far more than 0.01 here
        let pmt = installment(dec!(50_000_000), dec!(0.0125), 120).unwrap();
        let sol = solve_rate(dec!(50_000_000), pmt, 120).unwrap();
        assert_eq!(sol.phase, SolverPhase::NewtonRaphson);
        assert!(sol.converged);
        assert!(approx_eq(sol.periodic_rate, dec!(0.0125), dec!(0.000001)));
        assert!(sol.residual < dec!(0.01));
    }

    #[test]
    fn test_derivative_positive() {
        for r in [dec!(0), dec!(0.001), dec!(0.05), dec!(0.5)] {
            assert!(annuity_payment_derivative(dec!(1_000), r, 24).unwrap() > Decimal::ZERO);
        }
    }

    #[test]
    fn test_require_convergence() {
        let sol = solve_rate(dec!(100_000), dec!(5_000), 24).unwrap();
        assert!(sol.require_convergence().is_ok());
    }

    #[test]
    fn test_iteration_limits_leave_solution_unconverged() {
        let settings = SolverSettings {
            max_bisection_iterations: 3,
            max_newton_iterations: 1,
            ..SolverSettings::default()
        };
        let pmt = installment(dec!(50_000_000), dec!(0.0125), 120).unwrap();
        let sol = solve_rate_with(dec!(50_000_000), pmt, 120, &settings).unwrap();

        assert!(!sol.converged);
        assert_eq!(sol.bisection_iterations, 3);
        assert_eq!(sol.newton_iterations, 1);
        assert!(sol.residual >= dec!(0.01));

        match sol.require_convergence() {
            Err(DebtEngineError::NonConvergence {
                iterations,
                last_delta,
                ..
            }) => {
                assert_eq!(iterations, 4);
                assert!(last_delta >= dec!(0.01));
            }
            other => panic!("expected NonConvergence, got {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_derivative_keeps_bisection_estimate() {
        // dI/dr on a principal this small is below the derivative floor
        let principal = dec!(0.0000000000001);
        let pmt = installment(principal, dec!(0.02), 12).unwrap();
        let sol = solve_rate(principal, pmt, 12).unwrap();

        assert_eq!(sol.phase, SolverPhase::Bisection);
        assert_eq!(sol.bisection_iterations, 1);
        assert_eq!(sol.newton_iterations, 1);
        assert_eq!(sol.periodic_rate, dec!(0.25));
        assert!(sol.converged);
    }

    #[test]
    fn test_small_principal_recovers_rate() {
        // Bisection meets the 0.01 installment tolerance on its third halving
        let pmt = installment(Decimal::ONE, dec!(0.05), 6).unwrap();
        let sol = solve_rate(Decimal::ONE, pmt, 6).unwrap();
        assert_eq!(sol.phase, SolverPhase::NewtonRaphson);
        assert!(sol.converged);
        assert!(approx_eq(sol.rate_pct, dec!(5), dec!(0.01)), "got {}%", sol.rate_pct);

        for p in [dec!(1), dec!(10), dec!(50), dec!(100), dec!(500)] {
            for r in [dec!(0.0001), dec!(0.013), dec!(0.2), dec!(0.4999)] {
                let pmt = installment(p, r, 24).unwrap();
                let sol = solve_rate(p, pmt, 24).unwrap();
                assert!(
                    approx_eq(sol.rate_pct, r * dec!(100), dec!(0.01)),
                    "P={p} r={r}: got {}%",
                    sol.rate_pct
                );
            }
        }
    }

    #[test]
    fn test_zero_tolerance_rejected() {
        let settings = SolverSettings {
            rate_tolerance: Decimal::ZERO,
            ..SolverSettings::default()
        };
        assert!(matches!(
            solve_rate_with(dec!(10_000), dec!(900), 12, &settings),
            Err(DebtEngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_oversized_principal_is_invalid_input() {
        // The 50% bound installment for one period is 1.5x the principal
        let huge = Decimal::MAX - dec!(1);
        assert!(matches!(
            solve_rate(huge, huge, 1),
            Err(DebtEngineError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_infer_rate_envelope() {
        let out = infer_rate(&RateInferenceInput {
            principal: dec!(100_000),
            installment: dec!(5_000),
            term: 24,
        })
        .unwrap();
        assert!(out.warnings.is_empty());
        assert!(out.methodology.contains("Newton-Raphson"));
    }

    #[test]
    fn test_idempotent() {
        let a = solve_rate(dec!(73_500), dec!(2_950), 36).unwrap();
        let b = solve_rate(dec!(73_500), dec!(2_950), 36).unwrap();
        assert_eq!(a, b);
    }
}
