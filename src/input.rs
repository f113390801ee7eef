use crate::error::PondsError;
use crate::hydrograph::TriangularHydrograph;
use crate::integrator::SolverConfig;
use crate::system::{Pond, SimulationParameters};
use crate::trajectory::TimeGrid;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Default)]
pub struct SolverInput {
    pub rtol: Option<f64>,
    pub atol: Option<f64>,
    pub initial_step: Option<f64>,
    pub min_step: Option<f64>,
    pub max_step: Option<f64>,
    pub max_steps: Option<usize>,
}

impl SolverInput {
    pub fn build_solver_config(&self) -> SolverConfig {
        let default = SolverConfig::default();
        SolverConfig {
            rtol: self.rtol.unwrap_or(default.rtol),
            atol: self.atol.unwrap_or(default.atol),
            initial_step: self.initial_step.unwrap_or(default.initial_step),
            min_step: self.min_step.unwrap_or(default.min_step),
            max_step: self.max_step.or(default.max_step),
            max_steps: self.max_steps.unwrap_or(default.max_steps),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    /// Simulation horizon (s)
    pub horizon: f64,
    pub num_samples: usize,
    #[serde(default)]
    pub solver: SolverInput,
}

impl Config {
    pub fn build_time_grid(&self) -> Result<TimeGrid, PondsError> {
        TimeGrid::new(self.horizon, self.num_samples)
    }
}

pub fn read_config_input(filepath: &Path) -> Result<Config, PondsError> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: Config = serde_json::from_str(&contents)?;
    Ok(parsed)
}

#[derive(Deserialize, Debug)]
pub struct PondInput {
    pub outlet_diameter: f64,
    pub bottom_area: f64,
    pub max_depth: f64,
    #[serde(default)]
    pub initial_depth: f64,
}

impl PondInput {
    fn build_pond(&self) -> Pond {
        Pond::new(
            self.outlet_diameter,
            self.bottom_area,
            self.max_depth,
            self.initial_depth,
        )
    }
}

#[derive(Deserialize, Debug)]
pub struct InflowInput {
    pub start: f64,
    pub peak_time: f64,
    pub end: f64,
    pub peak_rate: f64,
}

#[derive(Deserialize, Debug)]
pub struct SystemInput {
    pub upstream: PondInput,
    pub downstream: PondInput,
    pub inflow: Option<InflowInput>,
}

impl SystemInput {
    pub fn build_parameters(&self) -> SimulationParameters {
        SimulationParameters::new(
            self.upstream.build_pond(),
            self.downstream.build_pond(),
        )
    }

    pub fn build_hydrograph(&self) -> TriangularHydrograph {
        match &self.inflow {
            Some(i) => {
                TriangularHydrograph::new(i.start, i.peak_time, i.end, i.peak_rate)
            }
            None => TriangularHydrograph::default(),
        }
    }
}

pub fn read_system_input(filepath: &Path) -> Result<SystemInput, PondsError> {
    let contents = fs::read_to_string(filepath)?;
    let parsed: SystemInput = serde_json::from_str(&contents)?;
    Ok(parsed)
}

pub struct Input {
    pub config: Config,
    pub system: SystemInput,
}

impl Input {
    /// Reads `config.json` and `system.json` from the scenario directory.
    pub fn build(path: &str) -> Result<Self, PondsError> {
        let dir = Path::new(path);
        let config = read_config_input(&dir.join("config.json"))?;
        let system = read_system_input(&dir.join("system.json"))?;
        Ok(Self { config, system })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_config() {
        let config = read_config_input(Path::new("example/config.json")).unwrap();
        assert_eq!(config.horizon, 288000.0);
        assert_eq!(config.num_samples, 1000);
        let solver = config.solver.build_solver_config();
        assert_eq!(solver.rtol, 1.49012e-8);
        assert_eq!(solver.max_steps, 500);
        assert_eq!(solver.max_step, None);
    }

    #[test]
    fn test_read_system() {
        let system = read_system_input(Path::new("example/system.json")).unwrap();
        assert_eq!(system.build_parameters(), SimulationParameters::default());
        assert_eq!(system.build_hydrograph(), TriangularHydrograph::default());
    }

    #[test]
    fn test_optional_sections_take_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "horizon": 3600.0, "num_samples": 10 }"#)
                .unwrap();
        assert_eq!(
            config.solver.build_solver_config(),
            SolverConfig::default()
        );

        let system: SystemInput = serde_json::from_str(
            r#"{
                "upstream": { "outlet_diameter": 0.3, "bottom_area": 500.0, "max_depth": 2.0 },
                "downstream": { "outlet_diameter": 0.1, "bottom_area": 800.0, "max_depth": 3.0, "initial_depth": 1.0 }
            }"#,
        )
        .unwrap();
        let params = system.build_parameters();
        assert_eq!(params.upstream.initial_depth, 0.0);
        assert_eq!(params.downstream.initial_depth, 1.0);
        assert_eq!(system.build_hydrograph(), TriangularHydrograph::default());
    }

    #[test]
    fn test_solver_overrides() {
        let config: Config = serde_json::from_str(
            r#"{ "horizon": 100.0, "num_samples": 2, "solver": { "rtol": 1e-6, "max_step": 60.0 } }"#,
        )
        .unwrap();
        let solver = config.solver.build_solver_config();
        assert_eq!(solver.rtol, 1e-6);
        assert_eq!(solver.atol, SolverConfig::default().atol);
        assert_eq!(solver.max_step, Some(60.0));
    }

    #[test]
    fn test_missing_directory_is_an_io_error() {
        let result = Input::build("example/does-not-exist");
        assert!(matches!(result, Err(PondsError::Io(_))));
    }

    #[test]
    fn test_read_input() {
        let input = Input::build("example").unwrap();
        assert_eq!(input.config.num_samples, 1000);
        assert!(input.config.build_time_grid().is_ok());
    }
}
