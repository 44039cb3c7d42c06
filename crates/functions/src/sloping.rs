use serde::{Deserialize, Serialize};

use crate::CurveError;

/// Holds one value, ramps linearly, then holds another.
///
/// Used for interventions whose efficacy wanes with age, for example BCG
/// protection that stays at 0.7 until age 15 and is gone by age 30.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SlopingStepData")]
pub struct SlopingStep {
    onset: f64,
    plateau: f64,
    offset: f64,
    final_value: f64,
}

#[derive(Deserialize)]
struct SlopingStepData {
    onset: f64,
    plateau: f64,
    offset: f64,
    final_value: f64,
}

impl SlopingStep {
    /// Creates a ramp from `plateau` at `onset` to `final_value` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument is not finite or `onset >= offset`.
    pub fn new(
        onset: f64,
        plateau: f64,
        offset: f64,
        final_value: f64,
    ) -> Result<Self, CurveError> {
        if let Some(index) = [onset, plateau, offset, final_value]
            .iter()
            .position(|v| !v.is_finite())
        {
            return Err(CurveError::NonFinite { index });
        }
        if onset >= offset {
            return Err(CurveError::SlopeOrder { onset, offset });
        }

        Ok(Self {
            onset,
            plateau,
            offset,
            final_value,
        })
    }

    /// Evaluates the ramp at `x`.
    #[must_use]
    pub fn value_at(&self, x: f64) -> f64 {
        if x <= self.onset {
            self.plateau
        } else if x >= self.offset {
            self.final_value
        } else {
            let progress = (x - self.onset) / (self.offset - self.onset);
            self.plateau + progress * (self.final_value - self.plateau)
        }
    }
}

impl TryFrom<SlopingStepData> for SlopingStep {
    type Error = CurveError;

    fn try_from(data: SlopingStepData) -> Result<Self, Self::Error> {
        Self::new(data.onset, data.plateau, data.offset, data.final_value)
    }
}
