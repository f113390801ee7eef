use crate::error::PondsError;
use crate::state::PondState;
use crate::system::SimulationParameters;

/// Evenly spaced sample times covering the closed horizon `[0, end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// Builds `num_samples` evenly spaced times from 0 to `horizon`, both
    /// end points included.
    pub fn new(horizon: f64, num_samples: usize) -> Result<Self, PondsError> {
        if !(horizon.is_finite() && horizon > 0.0) {
            return Err(PondsError::invalid_parameter(format!(
                "simulation horizon must be > 0, got {horizon}"
            )));
        }
        if num_samples < 2 {
            return Err(PondsError::invalid_parameter(format!(
                "time grid needs at least 2 samples, got {num_samples}"
            )));
        }
        let last = (num_samples - 1) as f64;
        let mut times: Vec<f64> = (0..num_samples)
            .map(|i| horizon * i as f64 / last)
            .collect();
        times[num_samples - 1] = horizon;
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn horizon(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

/// Pond depths sampled on a [`TimeGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<PondState>,
}

impl Trajectory {
    pub fn new(states: Vec<PondState>) -> Self {
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn h1(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.h1).collect()
    }

    pub fn h2(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.h2).collect()
    }

    pub fn last(&self) -> Option<&PondState> {
        self.states.last()
    }
}

/// Enforces `0 <= h <= H` on every reported sample, overwriting whatever
/// overshoot the solver left in the raw trajectory.
pub fn clamp(raw: &Trajectory, params: &SimulationParameters) -> Trajectory {
    Trajectory::new(raw.states.iter().map(|s| s.clamped(params)).collect())
}
