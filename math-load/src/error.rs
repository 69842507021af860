use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("empty formula")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unknown identifier '{name}' at position {pos}, only 'i' is allowed")]
    UnknownIdentifier { name: String, pos: usize },
    #[error("integer literal '{literal}' at position {pos} is out of range")]
    LiteralOutOfRange { literal: String, pos: usize },
    #[error("unexpected '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

/// Rejected command line input. Always raised before the first request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("iterations must be a positive integer")]
    NonPositiveIterations,
    #[error("delay must be a non-negative number of seconds, got {0}")]
    InvalidDelay(f64),
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid formula for {param}: '{formula}'")]
    InvalidFormula {
        param: char,
        formula: String,
        source: FormulaError,
    },
    #[error("formula for {param} '{formula}' cannot be evaluated at i={index}")]
    Unevaluable {
        param: char,
        formula: String,
        index: u64,
        source: FormulaError,
    },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("interrupted")]
    Interrupted,
    #[error("failed to compute request parameters at i={index}")]
    Formula { index: u64, source: FormulaError },
    #[error("worker task failed")]
    Worker(#[from] tokio::task::JoinError),
}
