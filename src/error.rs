use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Dimension Mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid Tolerance: delta must be a positive finite number, got {0}")]
    InvalidTolerance(f64),

    #[error("Unsupported Configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Solver Invariant Violation: {0}")]
    SolverInvariantViolation(String),

    #[error("Run Cancelled")]
    Cancelled,

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AlignResult<T> = Result<T, AlignError>;
