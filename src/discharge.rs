use crate::hydrograph::Inflow;
use crate::orifice::q_o;
use crate::system::SimulationParameters;
use crate::trajectory::{TimeGrid, Trajectory};

/// Discharge rates (m³/s) at one sample time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DischargeSample {
    /// Inflow into the upstream pond
    pub inflow: f64,
    /// Outflow of the upstream pond, which is the inflow to the downstream one
    pub transfer: f64,
    /// Outflow of the downstream pond
    pub outflow: f64,
}

/// Discharge rates aligned with the time grid of a clamped trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeSeries {
    pub samples: Vec<DischargeSample>,
}

impl DischargeSeries {
    /// Evaluates the inflow hydrograph at every sample time and the orifice
    /// outflows at the reported depths. `trajectory` must already be
    /// clamped, so every depth is non-negative.
    pub fn derive(
        grid: &TimeGrid,
        trajectory: &Trajectory,
        params: &SimulationParameters,
        inflow: &impl Inflow,
    ) -> Self {
        let samples = grid
            .times()
            .iter()
            .zip(trajectory.states.iter())
            .map(|(&t, state)| DischargeSample {
                inflow: inflow.rate(t),
                transfer: q_o(state.h1, params.upstream.outlet_diameter),
                outflow: q_o(state.h2, params.downstream.outlet_diameter),
            })
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn inflow(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.inflow).collect()
    }

    pub fn transfer(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.transfer).collect()
    }
}

/// Trapezoidal integral of `values` sampled at `times`.
fn trapezoid(times: &[f64], values: &[f64]) -> f64 {
    debug_assert_eq!(times.len(), values.len());
    times
        .windows(2)
        .zip(values.windows(2))
        .map(|(t, v)| 0.5 * (t[1] - t[0]) * (v[0] + v[1]))
        .sum()
}

/// Water balance of the upstream pond over the whole horizon (m³).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassBalance {
    pub inflow_volume: f64,
    pub outflow_volume: f64,
    pub storage_change: f64,
}

impl MassBalance {
    pub fn compute(
        grid: &TimeGrid,
        trajectory: &Trajectory,
        discharge: &DischargeSeries,
        params: &SimulationParameters,
    ) -> Self {
        let times = grid.times();
        let inflow_volume = trapezoid(times, &discharge.inflow());
        let outflow_volume = trapezoid(times, &discharge.transfer());
        let final_depth = trajectory.last().map_or(0.0, |s| s.h1);
        let storage_change = params.upstream.bottom_area
            * (final_depth - params.upstream.initial_depth);
        Self {
            inflow_volume,
            outflow_volume,
            storage_change,
        }
    }

    /// Volume unaccounted for: inflow - outflow - storage change.
    pub fn residual(&self) -> f64 {
        self.inflow_volume - self.outflow_volume - self.storage_change
    }

    /// Residual as a fraction of the inflow volume.
    pub fn relative_residual(&self) -> f64 {
        if self.inflow_volume > 0.0 {
            self.residual().abs() / self.inflow_volume
        } else {
            self.residual().abs()
        }
    }
}
