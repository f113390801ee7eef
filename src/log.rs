use crate::discharge::MassBalance;
use crate::integrator::IntegrationStats;
use crate::system::{Pond, SimulationParameters};
use crate::trajectory::TimeGrid;
use chrono::Local;
use std::time::Duration;

/// Helper function for displaying the greeting with the starting time
pub fn show_greeting() {
    println!("\n# ponds - cascading detention pond simulator");
    println!("- Started at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
}

pub fn input_reading_line(path: &str) {
    println!("\nReading input files from '{path}'");
}

fn pond_table_row(name: &str, pond: &Pond) {
    println!(
        "{0: <10} | {1: >8.3} | {2: >10.1} | {3: >8.2} | {4: >8.2}",
        name,
        pond.outlet_diameter,
        pond.bottom_area,
        pond.max_depth,
        pond.initial_depth
    )
}

/// Helper function for displaying the pond parameters table
pub fn parameters_table(params: &SimulationParameters) {
    println!("\n# Ponds");
    println!(
        "{0: ^10} | {1: ^8} | {2: ^10} | {3: ^8} | {4: ^8}",
        "pond", "D (m)", "A (m2)", "H (m)", "h0 (m)"
    );
    println!("----------------------------------------------------------");
    pond_table_row("upstream", &params.upstream);
    pond_table_row("downstream", &params.downstream);
}

pub fn simulation_greeting(grid: &TimeGrid) {
    println!("\n# Simulating");
    println!(
        "- Horizon: {:.1} h ({} samples)",
        grid.horizon() / 3600.0,
        grid.len()
    );
}

pub fn integration_stats(stats: &IntegrationStats) {
    println!("- Accepted steps: {}", stats.accepted_steps);
    println!("- Rejected steps: {}", stats.rejected_steps);
    println!(
        "- Stiff steps: {} ({} method switches)",
        stats.stiff_steps, stats.method_switches
    );
    println!("- RHS evaluations: {}", stats.rhs_evaluations);
}

/// Helper function for displaying the upstream pond water balance
pub fn mass_balance(balance: &MassBalance) {
    println!("\n# Upstream pond water balance");
    println!("- Inflow volume (m3): {:.2}", balance.inflow_volume);
    println!("- Outflow volume (m3): {:.2}", balance.outflow_volume);
    println!("- Storage change (m3): {:.2}", balance.storage_change);
    println!(
        "- Residual (m3): {:.2} ({:.3} %)",
        balance.residual(),
        100.0 * balance.relative_residual()
    );
}

pub fn simulation_duration(time: Duration) {
    println!(
        "\nSimulation time: {:.3} s",
        time.as_micros() as f64 / 1_000_000.0
    )
}

pub fn output_generation_line(path: &str) {
    println!("\nWriting outputs to '{path}'");
}

pub fn show_farewell(time: Duration) {
    println!("\nTotal running time: {:.2} s", time.as_millis() as f64 / 1000.0)
}
