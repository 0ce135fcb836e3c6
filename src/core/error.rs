use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "loan of {loan:.2} never amortizes: monthly payment {monthly_payment:.2} \
         does not exceed monthly interest {monthly_interest:.2}"
    )]
    NonAmortizing {
        loan: f64,
        monthly_payment: f64,
        monthly_interest: f64,
    },

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("affordability oracle unavailable: {0}")]
    OracleUnavailable(String),
}
