use crate::discharge::DischargeSeries;
use crate::error::PondsError;
use crate::trajectory::{TimeGrid, Trajectory};

use csv::Writer;
use std::path::Path;

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(serde::Serialize)]
struct TrajectoryOutput {
    time: f64,
    time_hours: f64,
    h1: f64,
    h2: f64,
}

pub fn write_trajectory(
    grid: &TimeGrid,
    trajectory: &Trajectory,
    path: &Path,
) -> Result<(), PondsError> {
    let mut wtr = Writer::from_path(path.join("trajectory.csv"))?;
    for (time, state) in grid.times().iter().zip(trajectory.states.iter()) {
        wtr.serialize(TrajectoryOutput {
            time: *time,
            time_hours: time / SECONDS_PER_HOUR,
            h1: state.h1,
            h2: state.h2,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct DischargeOutput {
    time: f64,
    time_hours: f64,
    inflow: f64,
    transfer: f64,
    outflow: f64,
}

pub fn write_discharge(
    grid: &TimeGrid,
    discharge: &DischargeSeries,
    path: &Path,
) -> Result<(), PondsError> {
    let mut wtr = Writer::from_path(path.join("discharge.csv"))?;
    for (time, sample) in grid.times().iter().zip(discharge.samples.iter()) {
        wtr.serialize(DischargeOutput {
            time: *time,
            time_hours: time / SECONDS_PER_HOUR,
            inflow: sample.inflow,
            transfer: sample.transfer,
            outflow: sample.outflow,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the depth and discharge series of a run into the `path`
/// directory, for plotting against time in hours.
pub fn generate_outputs(
    grid: &TimeGrid,
    trajectory: &Trajectory,
    discharge: &DischargeSeries,
    path: &str,
) -> Result<(), PondsError> {
    let dir = Path::new(path);
    write_trajectory(grid, trajectory, dir)?;
    write_discharge(grid, discharge, dir)?;
    Ok(())
}
