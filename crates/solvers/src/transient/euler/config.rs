use thiserror::Error;

/// Configuration for the forward Euler solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_step: f64,
}

/// Errors that can occur when validating a forward Euler config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_step must be finite and positive")]
    MaxStep,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good value, unwrap is safe
        Self::new(0.01).unwrap()
    }
}

impl Config {
    /// Creates a new config with the largest step the solver may take.
    ///
    /// Each interval between grid times is split into the fewest equal steps
    /// no longer than `max_step`.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_step` is not finite and positive.
    pub fn new(max_step: f64) -> Result<Self, ConfigError> {
        if !max_step.is_finite() || max_step <= 0.0 {
            return Err(ConfigError::MaxStep);
        }

        Ok(Self { max_step })
    }

    /// Returns the largest step the solver may take.
    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }
}
