use thiserror::Error;

/// A result type for surrogate model errors
pub type Result<T> = std::result::Result<T, SurrogateError>;

/// An error for surrogate model construction and evaluation
#[derive(Error, Debug)]
pub enum SurrogateError {
    /// When a model is structurally inconsistent (arity mismatch, forbidden mean)
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    /// When a covariance matrix is not positive-definite after maximum jitter
    #[error("Ill-conditioned covariance: {0}")]
    IllConditioned(String),
    /// When an invalid value is encountered
    #[error("Value error: {0}")]
    InvalidValue(String),
}
