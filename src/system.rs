use crate::error::PondsError;
use crate::state::PondState;

/// A detention pond with a circular bottom outlet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pond {
    /// Outlet pipe diameter (m)
    pub outlet_diameter: f64,
    /// Bottom area (m²)
    pub bottom_area: f64,
    /// Maximum water depth before overflow (m)
    pub max_depth: f64,
    /// Water depth at t = 0 (m)
    pub initial_depth: f64,
}

impl Pond {
    pub fn new(
        outlet_diameter: f64,
        bottom_area: f64,
        max_depth: f64,
        initial_depth: f64,
    ) -> Self {
        Self {
            outlet_diameter,
            bottom_area,
            max_depth,
            initial_depth,
        }
    }

    fn validate(&self, name: &str) -> Result<(), PondsError> {
        validate_positive(self.outlet_diameter, name, "outlet diameter")?;
        validate_positive(self.bottom_area, name, "bottom area")?;
        validate_positive(self.max_depth, name, "max depth")?;
        if !(self.initial_depth >= 0.0 && self.initial_depth <= self.max_depth)
        {
            return Err(PondsError::invalid_parameter(format!(
                "{} initial depth must be in [0, {}], got {}",
                name, self.max_depth, self.initial_depth
            )));
        }
        Ok(())
    }
}

fn validate_positive(
    value: f64,
    pond_name: &str,
    field_name: &str,
) -> Result<(), PondsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PondsError::invalid_parameter(format!(
            "{} {} must be > 0, got {}",
            pond_name, field_name, value
        )))
    }
}

/// The two cascading ponds: the upstream pond receives the inflow
/// hydrograph and drains into the downstream pond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    pub upstream: Pond,
    pub downstream: Pond,
}

impl SimulationParameters {
    pub fn new(upstream: Pond, downstream: Pond) -> Self {
        Self {
            upstream,
            downstream,
        }
    }

    /// Checks every physical parameter before any computation starts.
    pub fn validate(&self) -> Result<(), PondsError> {
        self.upstream.validate("upstream pond")?;
        self.downstream.validate("downstream pond")?;
        Ok(())
    }

    pub fn initial_state(&self) -> PondState {
        PondState::new(self.upstream.initial_depth, self.downstream.initial_depth)
    }
}

impl Default for SimulationParameters {
    /// The reference scenario: two empty ponds with 0.2 m outlets.
    fn default() -> Self {
        Self::new(
            Pond::new(0.2, 2000.0, 5.0, 0.0),
            Pond::new(0.2, 1000.0, 4.0, 0.0),
        )
    }
}
