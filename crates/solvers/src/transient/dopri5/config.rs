use thiserror::Error;

/// Error tolerances for the Dormand–Prince solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    abs_tol: f64,
    rel_tol: f64,
}

/// Errors that can occur when validating a Dormand–Prince config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("abs_tol must be finite and positive")]
    AbsTol,

    #[error("rel_tol must be finite and non-negative")]
    RelTol,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(1e-8, 1e-6).unwrap()
    }
}

impl Config {
    /// Creates a new config with validated tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance is negative or non-finite, or if
    /// `abs_tol` is zero.
    pub fn new(abs_tol: f64, rel_tol: f64) -> Result<Self, ConfigError> {
        if !abs_tol.is_finite() || abs_tol <= 0.0 {
            return Err(ConfigError::AbsTol);
        }
        if !rel_tol.is_finite() || rel_tol < 0.0 {
            return Err(ConfigError::RelTol);
        }

        Ok(Self { abs_tol, rel_tol })
    }

    /// Returns the absolute error tolerance.
    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    /// Returns the relative error tolerance.
    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert!(config.abs_tol() > 0.0);
        assert!(config.rel_tol() > 0.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(Config::new(0.0, 1e-6), Err(ConfigError::AbsTol));
        assert_eq!(Config::new(f64::NAN, 1e-6), Err(ConfigError::AbsTol));
        assert_eq!(Config::new(1e-8, -1.0), Err(ConfigError::RelTol));
    }
}
