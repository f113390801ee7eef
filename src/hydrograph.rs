use crate::error::PondsError;

/// Inflow discharge rate into the upstream pond as a function of time.
///
/// Must be evaluable at any time, including the intermediate stage times
/// picked by the integrator.
pub trait Inflow {
    /// Inflow discharge rate (m³/s) at time `t` (s).
    fn rate(&self, t: f64) -> f64;
}

/// Piecewise-linear triangular pulse: zero before `start`, rising
/// linearly up to `peak_rate` at `peak_time`, falling linearly back to zero
/// at `end` and zero afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularHydrograph {
    pub start: f64,
    pub peak_time: f64,
    pub end: f64,
    pub peak_rate: f64,
}

impl TriangularHydrograph {
    pub fn new(start: f64, peak_time: f64, end: f64, peak_rate: f64) -> Self {
        Self {
            start,
            peak_time,
            end,
            peak_rate,
        }
    }

    pub fn validate(&self) -> Result<(), PondsError> {
        let times = [self.start, self.peak_time, self.end];
        if times.iter().any(|t| !t.is_finite()) {
            return Err(PondsError::invalid_parameter(
                "inflow pulse times must be finite",
            ));
        }
        if !(self.start < self.peak_time && self.peak_time < self.end) {
            return Err(PondsError::invalid_parameter(format!(
                "inflow pulse must satisfy start < peak_time < end, got {} / {} / {}",
                self.start, self.peak_time, self.end
            )));
        }
        if !(self.peak_rate.is_finite() && self.peak_rate >= 0.0) {
            return Err(PondsError::invalid_parameter(format!(
                "inflow peak rate must be >= 0, got {}",
                self.peak_rate
            )));
        }
        Ok(())
    }

    /// Total inflow volume (m³) carried by the pulse.
    pub fn volume(&self) -> f64 {
        0.5 * (self.end - self.start) * self.peak_rate
    }
}

impl Default for TriangularHydrograph {
    /// The design storm: 1 h of dry weather, 2.5 h ramp up to 2 m³/s,
    /// 2.5 h ramp down.
    fn default() -> Self {
        Self::new(3600.0, 12600.0, 21600.0, 2.0)
    }
}

impl Inflow for TriangularHydrograph {
    fn rate(&self, t: f64) -> f64 {
        if self.start <= t && t < self.peak_time {
            self.peak_rate * (t - self.start) / (self.peak_time - self.start)
        } else if self.peak_time <= t && t < self.end {
            -self.peak_rate * (t - self.end) / (self.end - self.peak_time)
        } else {
            0.0
        }
    }
}

/// No inflow at all. Useful for draining runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroInflow;

impl Inflow for ZeroInflow {
    fn rate(&self, _t: f64) -> f64 {
        0.0
    }
}

/// Inflow discharge rate of the design storm at time `t` (s).
///
/// ## Example
///
/// ```
/// assert_eq!(ponds::hydrograph::q_i1(0.0), 0.0);
/// assert_eq!(ponds::hydrograph::q_i1(12600.0), 2.0);
/// ```
pub fn q_i1(t: f64) -> f64 {
    TriangularHydrograph::default().rate(t)
}
