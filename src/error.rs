use thiserror::Error;

/// Error taxonomy for the verification engine.
///
/// `ConfigurationAbsent` is deliberately separate from `ProviderFailure`:
/// an unconfigured provider is skipped during aggregation, while a failed
/// one is recorded in the result's error list.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider not configured: {0}")]
    ConfigurationAbsent(&'static str),

    #[error("provider failure: {0}")]
    ProviderFailure(String),

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("internal failure: {0}")]
    InternalFailure(String),
}

pub type Result<T> = std::result::Result<T, VerificationError>;
