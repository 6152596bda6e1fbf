/// Caller input errors raised by the pricing core.
///
/// Every failure of the engine is a bad or economically degenerate input,
/// never a transient condition, so nothing here is retried. Each variant
/// names the offending field so the HTTP layer can echo it back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("{field} must be strictly positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("risk-neutral probability {field} = {value} is outside (0, 1): inputs admit arbitrage")]
    Arbitrage { field: &'static str, value: f64 },

    #[error("{field} = {value} is below the minimum of {min}")]
    TooFewSteps {
        field: &'static str,
        value: usize,
        min: usize,
    },

    #[error("{field} = {value} exceeds the configured limit of {max}")]
    LimitExceeded {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("inverted interval for {field}: min {min} > max {max}")]
    InvertedInterval {
        field: &'static str,
        min: f64,
        max: f64,
    },
}

impl DomainError {
    /// Name of the input (or derived quantity) that caused the failure.
    pub fn field(&self) -> &'static str {
        match self {
            Self::NonPositive { field, .. }
            | Self::NonFinite { field, .. }
            | Self::Arbitrage { field, .. }
            | Self::TooFewSteps { field, .. }
            | Self::LimitExceeded { field, .. }
            | Self::InvertedInterval { field, .. } => field,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Reject NaN/Infinity before it can leave the core as a "successful" value.
#[inline]
pub fn ensure_finite(field: &'static str, value: f64) -> DomainResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DomainError::NonFinite { field, value })
    }
}

/// Strictly positive and finite.
#[inline]
pub fn ensure_positive(field: &'static str, value: f64) -> DomainResult<f64> {
    let value = ensure_finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(DomainError::NonPositive { field, value })
    }
}

/// Application-level errors for the service around the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("pricing task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
