pub mod discharge;
pub mod dynamics;
pub mod error;
pub mod hydrograph;
pub mod input;
pub mod integrator;
mod log;
pub mod orifice;
pub mod output;
pub mod state;
pub mod system;
pub mod trajectory;
use discharge::{DischargeSeries, MassBalance};
use error::PondsError;
use hydrograph::Inflow;
use input::Input;
use integrator::{IntegrationStats, SolverConfig};
use std::time::Instant;
use system::SimulationParameters;
use trajectory::{TimeGrid, Trajectory};

/// Results of one run, all aligned with `grid`.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub grid: TimeGrid,
    pub trajectory: Trajectory,
    pub discharge: DischargeSeries,
    pub mass_balance: MassBalance,
    pub stats: IntegrationStats,
}

/// Runs the pond model over `grid`: validates the parameters, integrates
/// the depths, clamps the reported trajectory and derives the discharges.
pub fn simulate(
    params: &SimulationParameters,
    inflow: &impl Inflow,
    grid: &TimeGrid,
    solver: &SolverConfig,
) -> Result<Simulation, PondsError> {
    params.validate()?;
    solver.validate()?;

    let raw = integrator::integrate(
        params,
        inflow,
        params.initial_state(),
        grid,
        solver,
    )?;
    let trajectory = trajectory::clamp(&raw.trajectory, params);
    let discharge = DischargeSeries::derive(grid, &trajectory, params, inflow);
    let mass_balance =
        MassBalance::compute(grid, &trajectory, &discharge, params);

    Ok(Simulation {
        grid: grid.clone(),
        trajectory,
        discharge,
        mass_balance,
        stats: raw.stats,
    })
}

pub fn run(input_args: &InputArgs) -> Result<(), PondsError> {
    log::show_greeting();

    let begin = Instant::now();
    log::input_reading_line(&input_args.path);
    let input = Input::build(&input_args.path)?;

    let params = input.system.build_parameters();
    let hydrograph = input.system.build_hydrograph();
    let solver = input.config.solver.build_solver_config();
    hydrograph.validate()?;
    let grid = input.config.build_time_grid()?;
    log::parameters_table(&params);

    log::simulation_greeting(&grid);
    let simulation_begin = Instant::now();
    let simulation = simulate(&params, &hydrograph, &grid, &solver)?;
    log::integration_stats(&simulation.stats);
    log::simulation_duration(simulation_begin.elapsed());
    log::mass_balance(&simulation.mass_balance);

    log::output_generation_line(&input_args.path);
    output::generate_outputs(
        &simulation.grid,
        &simulation.trajectory,
        &simulation.discharge,
        &input_args.path,
    )?;

    log::show_farewell(begin.elapsed());

    Ok(())
}

pub struct InputArgs {
    pub path: String,
}

impl InputArgs {
    pub fn build(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = args[1].clone();

        Ok(Self { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrograph::{TriangularHydrograph, ZeroInflow};
    use crate::orifice::q_o;
    use crate::system::Pond;
    use std::fs;

    struct ConstantInflow(f64);

    impl Inflow for ConstantInflow {
        fn rate(&self, _t: f64) -> f64 {
            self.0
        }
    }

    fn reference_simulation() -> Simulation {
        let params = SimulationParameters::default();
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        simulate(
            &params,
            &TriangularHydrograph::default(),
            &grid,
            &SolverConfig::default(),
        )
        .unwrap()
    }

    fn first_argmax(values: &[f64]) -> usize {
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v > values[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn test_build_input_args() {
        let args = vec!["ponds".to_string(), "example".to_string()];
        assert_eq!(InputArgs::build(&args).unwrap().path, "example");
        assert!(InputArgs::build(&args[..1]).is_err());
    }

    fn assert_within_max_depths(
        simulation: &Simulation,
        params: &SimulationParameters,
    ) {
        let (h1_max, h2_max) =
            (params.upstream.max_depth, params.downstream.max_depth);
        for s in simulation.trajectory.states.iter() {
            assert!(0.0 <= s.h1 && s.h1 <= h1_max, "h1 = {}", s.h1);
            assert!(0.0 <= s.h2 && s.h2 <= h2_max, "h2 = {}", s.h2);
        }
    }

    fn fast_draining_ponds() -> SimulationParameters {
        SimulationParameters::new(
            Pond::new(1.0, 100.0, 5.0, 0.0),
            Pond::new(1.0, 50.0, 4.0, 0.0),
        )
    }

    #[test]
    fn test_reference_scenario_respects_max_depths() {
        let simulation = reference_simulation();
        assert_eq!(simulation.trajectory.len(), 1000);
        assert_eq!(simulation.discharge.len(), 1000);
        assert_within_max_depths(&simulation, &SimulationParameters::default());
    }

    #[test]
    fn test_fast_draining_ponds_with_default_solver() {
        let configurations = [
            fast_draining_ponds(),
            SimulationParameters::new(
                Pond::new(0.5, 1.0, 5.0, 5.0),
                Pond::new(0.5, 1.0, 4.0, 4.0),
            ),
            SimulationParameters::new(
                Pond::new(1.0, 100.0, 5.0, 1.0),
                Pond::new(1.0, 50.0, 4.0, 0.5),
            ),
        ];
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        for params in configurations {
            let simulation = simulate(
                &params,
                &TriangularHydrograph::default(),
                &grid,
                &SolverConfig::default(),
            )
            .unwrap();
            assert_within_max_depths(&simulation, &params);
            // large orifices keep the ponds close to empty, where the
            // system is stiff
            assert!(simulation.stats.stiff_steps > 0);
            let last = simulation.trajectory.last().unwrap();
            assert!(last.h1 < 1e-2, "h1 = {}", last.h1);
            assert!(last.h2 < 1e-2, "h2 = {}", last.h2);
        }
    }

    #[test]
    fn test_near_empty_equilibrium_keeps_mass_balance() {
        let params = fast_draining_ponds();
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        let inflow = 0.01;
        let simulation = simulate(
            &params,
            &ConstantInflow(inflow),
            &grid,
            &SolverConfig::default(),
        )
        .unwrap();
        assert_within_max_depths(&simulation, &params);

        // at rest q_o(h, D) = inflow, with D = 1 m in both ponds
        let equilibrium = (inflow / q_o(1.0, 1.0)).powi(2);
        let last = simulation.trajectory.last().unwrap();
        assert!((last.h1 - equilibrium).abs() < 1e-6 * equilibrium);
        assert!((last.h2 - equilibrium).abs() < 1e-6 * equilibrium);
        assert!(
            simulation.mass_balance.relative_residual() < 1e-2,
            "residual = {}",
            simulation.mass_balance.residual()
        );

        let storm = simulate(
            &params,
            &TriangularHydrograph::default(),
            &grid,
            &SolverConfig::default(),
        )
        .unwrap();
        assert!(
            storm.mass_balance.relative_residual() < 1e-2,
            "residual = {}",
            storm.mass_balance.residual()
        );
    }

    #[test]
    fn test_reference_scenario_shape() {
        let simulation = reference_simulation();
        let times = simulation.grid.times();
        let h1 = simulation.trajectory.h1();
        let h2 = simulation.trajectory.h2();

        // nothing happens before the storm
        for (t, s) in times.iter().zip(simulation.trajectory.states.iter()) {
            if *t <= 3600.0 {
                assert_eq!(s.h1, 0.0);
                assert_eq!(s.h2, 0.0);
            }
        }

        // h1 rises during the storm
        let storm: Vec<usize> = (0..times.len())
            .filter(|&i| times[i] > 3600.0 && times[i] < 21600.0)
            .collect();
        assert!(h1[storm[storm.len() - 1]] > h1[storm[0]]);

        let peak1 = first_argmax(&h1);
        let peak2 = first_argmax(&h2);
        assert!(times[peak1] > 3600.0);
        assert!(h1[peak1] > 1.0);
        assert!(peak2 >= peak1, "h2 should peak after h1");

        // both ponds drain well before the end of the horizon
        let last = simulation.trajectory.last().unwrap();
        assert!(last.h1 < 1e-2, "h1 = {}", last.h1);
        assert!(last.h2 < 1e-2, "h2 = {}", last.h2);
    }

    #[test]
    fn test_reference_scenario_mass_balance() {
        let simulation = reference_simulation();
        let balance = simulation.mass_balance;
        assert!((balance.inflow_volume - 18000.0).abs() < 50.0);
        assert!(
            balance.relative_residual() < 1e-2,
            "residual = {}",
            balance.residual()
        );
    }

    #[test]
    fn test_zero_inflow_from_empty_ponds() {
        let params = SimulationParameters::default();
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        let simulation =
            simulate(&params, &ZeroInflow, &grid, &SolverConfig::default())
                .unwrap();
        assert!(simulation
            .trajectory
            .states
            .iter()
            .all(|s| s.h1 == 0.0 && s.h2 == 0.0));
        assert!(simulation
            .discharge
            .samples
            .iter()
            .all(|s| s.inflow == 0.0 && s.outflow == 0.0));
    }

    #[test]
    fn test_invalid_parameters_fail_before_integration() {
        let mut params = SimulationParameters::default();
        params.upstream.bottom_area = 0.0;
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        let result = simulate(
            &params,
            &TriangularHydrograph::default(),
            &grid,
            &SolverConfig::default(),
        );
        assert!(matches!(result, Err(PondsError::InvalidParameter(_))));
    }

    #[test]
    fn test_solver_failure_is_reported() {
        let params = SimulationParameters::default();
        let grid = TimeGrid::new(288000.0, 1000).unwrap();
        let solver = SolverConfig {
            max_steps: 1,
            ..SolverConfig::default()
        };
        let result =
            simulate(&params, &TriangularHydrograph::default(), &grid, &solver);
        assert!(matches!(result, Err(PondsError::Integration(_))));
    }

    #[test]
    fn test_run_rejects_invalid_ponds() {
        let dir = tempfile::tempdir().unwrap();
        fs::copy("example/config.json", dir.path().join("config.json"))
            .unwrap();
        let system = fs::read_to_string("example/system.json")
            .unwrap()
            .replace("\"bottom_area\": 2000.0", "\"bottom_area\": 0.0");
        fs::write(dir.path().join("system.json"), system).unwrap();
        let path = dir.path().to_str().unwrap().to_string();

        let result = run(&InputArgs { path });

        assert!(matches!(result, Err(PondsError::InvalidParameter(_))));
        assert!(!dir.path().join("trajectory.csv").exists());
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["config.json", "system.json"] {
            fs::copy(
                std::path::Path::new("example").join(name),
                dir.path().join(name),
            )
            .unwrap();
        }
        let path = dir.path().to_str().unwrap().to_string();

        run(&InputArgs { path }).unwrap();

        let trajectory =
            fs::read_to_string(dir.path().join("trajectory.csv")).unwrap();
        assert_eq!(trajectory.lines().count(), 1001);
        assert!(trajectory.starts_with("time,time_hours,h1,h2\n"));
        let discharge =
            fs::read_to_string(dir.path().join("discharge.csv")).unwrap();
        assert_eq!(discharge.lines().count(), 1001);
    }
}
