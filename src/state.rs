use crate::system::SimulationParameters;
use std::ops::{Add, Mul, Sub};

/// Restricts a water depth to the physical range of its pond: water above
/// `max_depth` overflows and is lost, and a pond cannot be less than empty.
pub fn clamp_depth(h: f64, max_depth: f64) -> f64 {
    if h > max_depth {
        max_depth
    } else if h < 0.0 {
        0.0
    } else {
        h
    }
}

/// Water depths of the upstream (`h1`) and downstream (`h2`) ponds.
///
/// Also used for the time derivative of the depths, so it carries the
/// vector-space operations the integrator needs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PondState {
    pub h1: f64,
    pub h2: f64,
}

impl PondState {
    pub fn new(h1: f64, h2: f64) -> Self {
        Self { h1, h2 }
    }

    pub fn clamped(&self, params: &SimulationParameters) -> Self {
        Self {
            h1: clamp_depth(self.h1, params.upstream.max_depth),
            h2: clamp_depth(self.h2, params.downstream.max_depth),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.h1.is_finite() && self.h2.is_finite()
    }
}

impl Add for PondState {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.h1 + other.h1, self.h2 + other.h2)
    }
}

impl Sub for PondState {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.h1 - other.h1, self.h2 - other.h2)
    }
}

impl Mul<f64> for PondState {
    type Output = Self;

    fn mul(self, c: f64) -> Self {
        Self::new(c * self.h1, c * self.h2)
    }
}
