use thiserror::Error;

/// A result type for Bayesian optimization errors
pub type Result<T> = std::result::Result<T, BoError>;

/// An error for the Bayesian optimization engine
#[derive(Error, Debug)]
pub enum BoError {
    /// When the domain is structurally invalid or empties the dataset
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    /// When the model or its priors are structurally inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    /// When a surrogate computation fails
    #[error(transparent)]
    SurrogateError(#[from] baybox_surrogate::SurrogateError),
    /// When every multistart replicate of an optimization failed
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),
    /// When all MCMC chains are degenerate
    #[error("Sampling failed: {0}")]
    SamplingFailed(String),
    /// When the user objective could not be evaluated
    #[error("Objective evaluation failed: {0}")]
    EvaluationFailed(String),
    /// When an invalid configuration value is encountered
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// When an argmin framework error is raised
    #[error(transparent)]
    ArgminError(#[from] argmin::core::Error),
}
