use super::GridError;

/// Checks that `times` is non-empty, finite and strictly increasing.
pub(crate) fn validate(times: &[f64]) -> Result<(), GridError> {
    if times.is_empty() {
        return Err(GridError::Empty);
    }

    if let Some(index) = times.iter().position(|t| !t.is_finite()) {
        return Err(GridError::NonFinite { index });
    }

    if let Some(index) = times.windows(2).position(|pair| pair[1] <= pair[0]) {
        return Err(GridError::NotIncreasing { index: index + 1 });
    }

    Ok(())
}
