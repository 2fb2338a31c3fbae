//! Numeric parameter ranges.
//!
//! Parameterised operators draw their window from one of two weighted integer
//! ranges. Short lags favour small shifts; window statistics favour short
//! windows but reach a month of history.

use derive_more::Display;
use rand::{Rng, distributions::Distribution, distributions::WeightedIndex};
use serde::{Deserialize, Serialize};

/// Range a numeric parameter is drawn from.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamRange {
    /// Shift length for `tsdelay`/`tsdelta`: `1..=10`, weight `15 - k`
    Lag,
    /// Window length for rolling statistics: `2..=31`, weight `32 - k`
    Window,
}

impl ParamRange {
    /// Range implied by the operator owning the parameter.
    pub fn for_operator(name: &str) -> Self {
        match name {
            "tsdelay" | "tsdelta" => Self::Lag,
            _ => Self::Window,
        }
    }

    /// Inclusive bounds.
    pub const fn bounds(self) -> (i64, i64) {
        match self {
            Self::Lag => (1, 10),
            Self::Window => (2, 31),
        }
    }

    /// Whether `value` lies within the bounds.
    pub const fn contains(self, value: i64) -> bool {
        let (lo, hi) = self.bounds();
        lo <= value && value <= hi
    }

    /// Unnormalised selection weight for each value, lowest value first.
    pub fn weights(self) -> Vec<u32> {
        let (lo, hi) = self.bounds();
        let top = match self {
            Self::Lag => 15,
            Self::Window => 32,
        };
        (lo..=hi).map(|k| (top - k) as u32).collect()
    }

    /// Draw a value.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> i64 {
        let (lo, _) = self.bounds();
        WeightedIndex::new(self.weights()).map_or(lo, |dist| lo + dist.sample(rng) as i64)
    }
}

/// Range for the parameter of `operator`.
pub fn param_range_for(operator: &str) -> ParamRange {
    ParamRange::for_operator(operator)
}
