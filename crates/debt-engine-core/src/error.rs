use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DebtEngineError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Rate out of domain: installment {installment} lies outside [{min_installment}, {max_installment}], the range reachable with periodic rates of 0% to 50%")]
    RateOutOfDomain {
        installment: Decimal,
        min_installment: Decimal,
        max_installment: Decimal,
    },

    #[error("Non-convergence: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    NonConvergence {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },
}

impl DebtEngineError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        DebtEngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
