//! Error types shared across the workspace.

/// Errors raised at configuration time or by the explicit validation layer.
///
/// The numerical kernels themselves never return these; they assume clean
/// input and leave checking to [`crate::validate`].
#[derive(Debug, thiserror::Error)]
pub enum PtychoError {
    #[error("unknown optimizer '{0}' (expected one of: adam, adagrad, rmsprop)")]
    UnknownOptimizer(String),

    #[error("unknown loss type '{0}' (expected one of: mae, mse, rmse)")]
    UnknownLoss(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("non-finite {quantity} at iteration {iteration}")]
    NonFinite {
        iteration: usize,
        quantity: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PtychoError>;
