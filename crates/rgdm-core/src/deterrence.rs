//! Deterrence functions turning a travel time into a friction value.
//!
//! Each function is a one-parameter family in its *decay* parameter, which is
//! the quantity the calibrator adjusts. Implementations are serialised with
//! `typetag` so a run file can name the family it wants:
//!
//! ```toml
//! [deterrence]
//! type = "Exponential"
//! beta = 0.08
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A monotone decreasing deterrence function $F(t)$.
#[typetag::serde(tag = "type")]
pub trait DeterrenceFunction: Debug + Send + Sync {
    /// Friction for a travel time `t >= 0`.
    fn evaluate(&self, travel_time: f64) -> f64;

    /// Current value of the decay parameter.
    fn decay(&self) -> f64;

    /// A copy of this function with a different decay parameter.
    fn with_decay(&self, decay: f64) -> Box<dyn DeterrenceFunction>;

    /// Starting decay for calibration against an observed mean trip length.
    fn initial_decay(&self, mean_travel_time: f64) -> f64 {
        1.0 / mean_travel_time
    }
}

/// Negative exponential deterrence.
///
/// $$F(t) = e^{-\beta t}$$
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exponential {
    pub beta: f64,
}

impl Exponential {
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }
}

#[typetag::serde]
impl DeterrenceFunction for Exponential {
    fn evaluate(&self, travel_time: f64) -> f64 {
        (-self.beta * travel_time).exp()
    }

    fn decay(&self) -> f64 {
        self.beta
    }

    fn with_decay(&self, decay: f64) -> Box<dyn DeterrenceFunction> {
        Box::new(Self::new(decay))
    }
}

/// Inverse power deterrence.
///
/// $$F(t) = \max(t, t_{min})^{-\alpha}$$
///
/// The floor `min_travel_time` keeps intrazonal pairs with zero travel time finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Power {
    pub alpha: f64,
    #[serde(default = "default_min_travel_time")]
    pub min_travel_time: f64,
}

fn default_min_travel_time() -> f64 {
    1.0
}

impl Power {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            min_travel_time: default_min_travel_time(),
        }
    }
}

#[typetag::serde]
impl DeterrenceFunction for Power {
    fn evaluate(&self, travel_time: f64) -> f64 {
        travel_time.max(self.min_travel_time).powf(-self.alpha)
    }

    fn decay(&self) -> f64 {
        self.alpha
    }

    fn with_decay(&self, decay: f64) -> Box<dyn DeterrenceFunction> {
        Box::new(Self {
            alpha: decay,
            min_travel_time: self.min_travel_time,
        })
    }

    fn initial_decay(&self, _mean_travel_time: f64) -> f64 {
        // The power family has no scale; start from the inverse-distance law.
        1.0
    }
}

/// Combined (Tanner) deterrence.
///
/// $$F(t) = \max(t, t_{min})^{\alpha} e^{-\beta t}$$
///
/// Only `beta` is treated as the decay parameter; `alpha` stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tanner {
    pub alpha: f64,
    pub beta: f64,
    #[serde(default = "default_min_travel_time")]
    pub min_travel_time: f64,
}

impl Tanner {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            alpha,
            beta,
            min_travel_time: default_min_travel_time(),
        }
    }
}

#[typetag::serde]
impl DeterrenceFunction for Tanner {
    fn evaluate(&self, travel_time: f64) -> f64 {
        travel_time.max(self.min_travel_time).powf(self.alpha) * (-self.beta * travel_time).exp()
    }

    fn decay(&self) -> f64 {
        self.beta
    }

    fn with_decay(&self, decay: f64) -> Box<dyn DeterrenceFunction> {
        Box::new(Self {
            alpha: self.alpha,
            beta: decay,
            min_travel_time: self.min_travel_time,
        })
    }
}
