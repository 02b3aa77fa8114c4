//! Error type shared by every fallible operation in the crate.

/// Errors that can occur while running the TMCMC sampler.
#[derive(Debug, thiserror::Error)]
pub enum TmcmcError {
    /// A tuning constant is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The prior sampler returned a table without rows or columns.
    #[error("the initial population is empty")]
    EmptyPopulation,

    /// A table or point does not have the expected shape.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The expected size.
        expected: usize,
        /// The size that was found.
        got: usize,
    },

    /// A log-likelihood is NaN, or the largest one is not finite, so the
    /// importance weights are undefined.
    #[error("log-likelihood of sample {index} is not usable for weighting")]
    NonFiniteLikelihood {
        /// Index of the offending sample.
        index: usize,
    },

    /// No proposal inside the prior support was found within the retry cap.
    #[error("no proposal inside the prior support after {retries} draws")]
    SupportRejection {
        /// The number of draws attempted.
        retries: usize,
    },

    /// The proposal covariance could not be factorised.
    #[error("proposal covariance is not usable: {0}")]
    Covariance(String),

    /// The tempering schedule did not reach one within `max_stages` iterations.
    #[error("stopped after {stages} stages at beta = {beta}")]
    StageLimit {
        /// The number of completed stages.
        stages: usize,
        /// The tempering parameter reached so far.
        beta: f64,
    },

    /// The resampling weights were rejected by the categorical sampler.
    #[error("invalid resampling weights: {0}")]
    Weights(#[from] rand::distributions::WeightedError),

    /// The worker pool could not be created.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Writing output failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// CSV serialisation failed.
    #[cfg(feature = "csv")]
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Convenience alias for results carrying a [`TmcmcError`].
pub type Result<T> = std::result::Result<T, TmcmcError>;
