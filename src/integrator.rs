//! Adaptive-step time integration of the pond equations.
//!
//! While the depths change smoothly the solver steps with an embedded
//! Dormand–Prince 5(4) pair with FSAL (the last stage of an accepted step is
//! the first stage of the next one). Close to an empty pond the orifice law
//! makes the system stiff: the outflow grows like `sqrt(h)`, so its slope is
//! unbounded as `h -> 0` and the explicit pair is held back by stability
//! instead of accuracy. The solver then switches to a linearly implicit,
//! L-stable Rosenbrock 2(3) method (the W-method of Shampine and Reichelt)
//! built on a finite difference Jacobian, and switches back once the
//! explicit pair could take the same steps.
//!
//! Both methods share the step size control, and each step is shortened
//! when needed so the solver lands exactly on every sample time of the
//! output grid. Between samples the right-hand side is evaluated at
//! whatever times the step control picks.

use crate::dynamics;
use crate::error::{IntegrationError, PondsError};
use crate::hydrograph::Inflow;
use crate::state::PondState;
use crate::system::SimulationParameters;
use crate::trajectory::{TimeGrid, Trajectory};
use std::f64::consts::SQRT_2;

// =============================================================================
// Dormand–Prince tableau
// =============================================================================

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights (also the last row of the tableau)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between the 5th and 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// =============================================================================
// Rosenbrock 2(3) coefficients
// =============================================================================

const GAMMA: f64 = 1.0 / (2.0 + SQRT_2);
const E32: f64 = 6.0 + SQRT_2;

/// Relative perturbation of the finite difference derivatives, sqrt(eps).
const SQRT_EPSILON: f64 = 1.4901161193847656e-8;
/// Smallest magnitude a depth perturbation is scaled from (m).
const MIN_PERTURBATION: f64 = 1e-5;

// =============================================================================
// Step size control and stiffness detection
// =============================================================================

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Right-hand side evaluations in one Dormand–Prince attempt (FSAL).
const DORMAND_PRINCE_EVALUATIONS: usize = 6;
/// Right-hand side evaluations in one Rosenbrock attempt, Jacobian included.
const ROSENBROCK_EVALUATIONS: usize = 5;
/// Right-hand side evaluations in one finite difference Jacobian.
const JACOBIAN_EVALUATIONS: usize = 2;

/// `h·ρ` above which an explicit step is close to its stability boundary.
const STIFF_RATIO: f64 = 3.25;
/// Stability limited explicit steps that make the problem stiff.
const STIFF_HITS: usize = 15;
/// Consecutive smooth explicit steps that clear the stiff count.
const NON_STIFF_HITS: usize = 6;
/// Accepted explicit steps between two Jacobian checks.
const JACOBIAN_CHECK_INTERVAL: usize = 10;
/// `h·ρ` above which a Jacobian check switches to the Rosenbrock method.
const STIFF_ENTRY: f64 = 1.0;
/// `h·ρ` below which the explicit pair is stable for the steps being taken.
const STIFF_EXIT: f64 = 3.0;
/// Consecutive Rosenbrock steps below `STIFF_EXIT` before switching back.
const STIFF_EXIT_STEPS: usize = 5;

// =============================================================================
// Configuration and statistics
// =============================================================================

/// Tolerances and step limits of the adaptive solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance (m)
    pub atol: f64,
    /// First trial step (s)
    pub initial_step: f64,
    /// Smallest step (s) allowed after a rejection
    pub min_step: f64,
    /// Largest step (s), unbounded when `None`
    pub max_step: Option<f64>,
    /// Accepted steps allowed between two consecutive sample times.
    /// Rejected attempts are bounded by `min_step` instead.
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1.49012e-8,
            atol: 1.49012e-8,
            initial_step: 1.0,
            min_step: 1e-8,
            max_step: None,
            max_steps: 500,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), PondsError> {
        let positive = [
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("initial_step", self.initial_step),
            ("min_step", self.min_step),
            ("max_step", self.max_step.unwrap_or(f64::MAX)),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PondsError::invalid_parameter(format!(
                    "solver {name} must be > 0, got {value}"
                )));
            }
        }
        if self.max_steps == 0 {
            return Err(PondsError::invalid_parameter(
                "solver max_steps must be > 0",
            ));
        }
        Ok(())
    }

    fn largest_step(&self) -> f64 {
        self.max_step.unwrap_or(f64::INFINITY)
    }
}

/// Work done by one integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegrationStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
    /// Accepted steps taken with the Rosenbrock method
    pub stiff_steps: usize,
    /// Switches between the explicit and the Rosenbrock method
    pub method_switches: usize,
    pub jacobian_evaluations: usize,
}

/// Raw solver output: depths at every sample time, before any clamping.
#[derive(Debug, Clone)]
pub struct Integration {
    pub trajectory: Trajectory,
    pub stats: IntegrationStats,
}

// =============================================================================
// Linear algebra
// =============================================================================

/// Jacobian of the right-hand side, `jij = d f_i / d h_j`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Jacobian {
    j11: f64,
    j12: f64,
    j21: f64,
    j22: f64,
}

impl Jacobian {
    /// Forward differences around `y`, where `f0 = rhs(y, t)`.
    fn estimate<F>(rhs: &F, y: &PondState, f0: &PondState, t: f64) -> Self
    where
        F: Fn(&PondState, f64) -> PondState,
    {
        let d1 = SQRT_EPSILON * y.h1.abs().max(MIN_PERTURBATION);
        let col1 =
            (rhs(&PondState::new(y.h1 + d1, y.h2), t) - *f0) * (1.0 / d1);
        let d2 = SQRT_EPSILON * y.h2.abs().max(MIN_PERTURBATION);
        let col2 =
            (rhs(&PondState::new(y.h1, y.h2 + d2), t) - *f0) * (1.0 / d2);
        Self {
            j11: col1.h1,
            j12: col2.h1,
            j21: col1.h2,
            j22: col2.h2,
        }
    }

    /// Largest modulus of the eigenvalues.
    fn spectral_radius(&self) -> f64 {
        let half_trace = 0.5 * (self.j11 + self.j22);
        let det = self.j11 * self.j22 - self.j12 * self.j21;
        let discriminant = half_trace * half_trace - det;
        if discriminant >= 0.0 {
            let root = discriminant.sqrt();
            (half_trace + root).abs().max((half_trace - root).abs())
        } else {
            // complex pair, |λ|² = det
            det.sqrt()
        }
    }
}

/// `W = I - gamma_h·J`, inverted through its determinant.
#[derive(Debug, Clone, Copy)]
struct IterationMatrix {
    w11: f64,
    w12: f64,
    w21: f64,
    w22: f64,
    det: f64,
}

impl IterationMatrix {
    /// `None` when `W` is singular.
    fn new(jacobian: &Jacobian, gamma_h: f64) -> Option<Self> {
        let w11 = 1.0 - gamma_h * jacobian.j11;
        let w12 = -gamma_h * jacobian.j12;
        let w21 = -gamma_h * jacobian.j21;
        let w22 = 1.0 - gamma_h * jacobian.j22;
        let det = w11 * w22 - w12 * w21;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(Self {
            w11,
            w12,
            w21,
            w22,
            det,
        })
    }

    fn solve(&self, b: PondState) -> PondState {
        PondState::new(
            (self.w22 * b.h1 - self.w12 * b.h2) / self.det,
            (self.w11 * b.h2 - self.w21 * b.h1) / self.det,
        )
    }
}

fn euclidean_norm(s: &PondState) -> f64 {
    s.h1.hypot(s.h2)
}

// =============================================================================
// Steps
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Method {
    #[default]
    DormandPrince,
    Rosenbrock,
}

impl Method {
    fn error_exponent(self) -> f64 {
        match self {
            Method::DormandPrince => -0.2,
            Method::Rosenbrock => -1.0 / 3.0,
        }
    }
}

/// Outcome of one step attempt.
struct Step {
    y_new: PondState,
    /// Derivative at the end of the step
    k_new: PondState,
    /// Local error estimate
    error: PondState,
    /// Estimate of the spectral radius of the Jacobian over the step
    spectral_radius: f64,
}

impl Step {
    fn is_finite(&self) -> bool {
        self.y_new.is_finite()
            && self.k_new.is_finite()
            && self.error.is_finite()
    }
}

/// One Dormand–Prince step from `(t, y)` with size `h`, given the derivative
/// `k1` at the start of the step.
///
/// The spectral radius comes from the last two stages, which share the time
/// `t + h`: `|k7 - k6| / |y_new - y6|`.
fn dormand_prince_step<F>(
    y: PondState,
    k1: PondState,
    t: f64,
    h: f64,
    rhs: &F,
) -> Step
where
    F: Fn(&PondState, f64) -> PondState,
{
    let k2 = rhs(&(y + k1 * (A21 * h)), t + C2 * h);
    let k3 = rhs(&(y + (k1 * A31 + k2 * A32) * h), t + C3 * h);
    let k4 = rhs(&(y + (k1 * A41 + k2 * A42 + k3 * A43) * h), t + C4 * h);
    let k5 = rhs(
        &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * h),
        t + C5 * h,
    );
    let y6 = y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * h;
    let k6 = rhs(&y6, t + h);
    let y_new = y + (k1 * B1 + k3 * B3 + k4 * B4 + k5 * B5 + k6 * B6) * h;
    let k7 = rhs(&y_new, t + h);
    let error = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * h;

    let distance = euclidean_norm(&(y_new - y6));
    let spectral_radius = if distance > 0.0 {
        euclidean_norm(&(k7 - k6)) / distance
    } else {
        0.0
    };
    Step {
        y_new,
        k_new: k7,
        error,
        spectral_radius,
    }
}

/// One Rosenbrock 2(3) step from `(t, y)` with size `h`, given the
/// derivative `f0` at the start of the step. `None` when the iteration
/// matrix is singular.
fn rosenbrock_step<F>(
    y: PondState,
    f0: PondState,
    t: f64,
    h: f64,
    rhs: &F,
) -> Option<Step>
where
    F: Fn(&PondState, f64) -> PondState,
{
    let jacobian = Jacobian::estimate(rhs, &y, &f0, t);
    let dt = SQRT_EPSILON * t.abs().max(1.0);
    let dfdt = (rhs(&y, t + dt) - f0) * (1.0 / dt);
    let gamma_h = GAMMA * h;
    let w = IterationMatrix::new(&jacobian, gamma_h)?;

    let k1 = w.solve(f0 + dfdt * gamma_h);
    let f1 = rhs(&(y + k1 * (0.5 * h)), t + 0.5 * h);
    let k2 = w.solve(f1 - k1) + k1;
    let y_new = y + k2 * h;
    let f2 = rhs(&y_new, t + h);
    let k3 = w.solve(f2 - (k2 - f1) * E32 - (k1 - f0) * 2.0 + dfdt * gamma_h);
    let error = (k1 - k2 * 2.0 + k3) * (h / 6.0);

    Some(Step {
        y_new,
        k_new: f2,
        error,
        spectral_radius: jacobian.spectral_radius(),
    })
}

/// Bookkeeping of the switches between the two methods.
#[derive(Debug, Default)]
struct Switching {
    method: Method,
    stiff_hits: usize,
    non_stiff_hits: usize,
    since_check: usize,
    calm_steps: usize,
}

impl Switching {
    /// Records an accepted explicit step with `h·ρ = ratio`. True when the
    /// steps have kept hitting the stability boundary.
    fn record_explicit(&mut self, ratio: f64) -> bool {
        if ratio > STIFF_RATIO {
            self.non_stiff_hits = 0;
            self.stiff_hits += 1;
            self.stiff_hits >= STIFF_HITS
        } else {
            self.non_stiff_hits += 1;
            if self.non_stiff_hits >= NON_STIFF_HITS {
                self.stiff_hits = 0;
            }
            false
        }
    }

    fn jacobian_check_due(&mut self) -> bool {
        self.since_check += 1;
        if self.since_check >= JACOBIAN_CHECK_INTERVAL {
            self.since_check = 0;
            true
        } else {
            false
        }
    }

    /// Records an accepted Rosenbrock step with `h·ρ = ratio`. True when
    /// the explicit pair can take over again.
    fn record_implicit(&mut self, ratio: f64) -> bool {
        if ratio < STIFF_EXIT {
            self.calm_steps += 1;
            self.calm_steps >= STIFF_EXIT_STEPS
        } else {
            self.calm_steps = 0;
            false
        }
    }

    fn switch_to(&mut self, method: Method) {
        self.method = method;
        match method {
            Method::Rosenbrock => self.calm_steps = 0,
            Method::DormandPrince => {
                self.stiff_hits = 0;
                self.non_stiff_hits = 0;
                self.since_check = 0;
            }
        }
    }
}

// =============================================================================
// Solver
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveSolver {
    config: SolverConfig,
}

impl AdaptiveSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Scaled RMS norm of the local error. Values <= 1 meet the tolerances.
    fn error_norm(
        &self,
        error: &PondState,
        y: &PondState,
        y_new: &PondState,
    ) -> f64 {
        let scale = |a: f64, b: f64| {
            self.config.atol + self.config.rtol * a.abs().max(b.abs())
        };
        let e1 = error.h1 / scale(y.h1, y_new.h1);
        let e2 = error.h2 / scale(y.h2, y_new.h2);
        ((e1 * e1 + e2 * e2) / 2.0).sqrt()
    }

    /// Integrates `dy/dt = rhs(y, t)` from `initial` at `times[0]`,
    /// returning the state at every entry of `times`.
    pub fn solve<F>(
        &self,
        rhs: F,
        initial: PondState,
        times: &[f64],
    ) -> Result<(Vec<PondState>, IntegrationStats), IntegrationError>
    where
        F: Fn(&PondState, f64) -> PondState,
    {
        let mut stats = IntegrationStats::default();
        let mut states = Vec::<PondState>::with_capacity(times.len());
        let Some(&t0) = times.first() else {
            return Ok((states, stats));
        };

        let mut t = t0;
        let mut y = initial;
        if !y.is_finite() {
            return Err(IntegrationError::NonFiniteState { t });
        }
        let mut k1 = rhs(&y, t);
        stats.rhs_evaluations += 1;
        if !k1.is_finite() {
            return Err(IntegrationError::NonFiniteState { t });
        }
        states.push(y);

        let largest_step = self.config.largest_step();
        let mut h = self.config.initial_step.min(largest_step);
        let mut switching = Switching::default();

        for &t_next in &times[1..] {
            let mut accepted = 0;
            while t < t_next {
                if accepted >= self.config.max_steps {
                    return Err(IntegrationError::TooManySteps { t });
                }

                let remaining = t_next - t;
                let lands_on_sample = h >= remaining;
                let h_step = if lands_on_sample { remaining } else { h };

                let method = switching.method;
                let step = match method {
                    Method::DormandPrince => {
                        stats.rhs_evaluations += DORMAND_PRINCE_EVALUATIONS;
                        dormand_prince_step(y, k1, t, h_step, &rhs)
                    }
                    Method::Rosenbrock => {
                        stats.rhs_evaluations += ROSENBROCK_EVALUATIONS;
                        stats.jacobian_evaluations += 1;
                        rosenbrock_step(y, k1, t, h_step, &rhs)
                            .ok_or(IntegrationError::NonFiniteState { t })?
                    }
                };
                if !step.is_finite() {
                    return Err(IntegrationError::NonFiniteState { t });
                }

                let err = self.error_norm(&step.error, &y, &step.y_new);
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(method.error_exponent()))
                        .clamp(MIN_FACTOR, MAX_FACTOR)
                };

                if err <= 1.0 {
                    accepted += 1;
                    stats.accepted_steps += 1;
                    t = if lands_on_sample { t_next } else { t + h_step };
                    y = step.y_new;
                    k1 = step.k_new;
                    // a step shortened to hit a sample says nothing about
                    // the step size the dynamics allow
                    h = if lands_on_sample {
                        h.max(h_step * factor)
                    } else {
                        h_step * factor
                    };
                    h = h.min(largest_step);

                    match method {
                        Method::DormandPrince => {
                            let mut stiff = switching
                                .record_explicit(h_step * step.spectral_radius);
                            if switching.jacobian_check_due() {
                                let jacobian =
                                    Jacobian::estimate(&rhs, &y, &k1, t);
                                stats.rhs_evaluations += JACOBIAN_EVALUATIONS;
                                stats.jacobian_evaluations += 1;
                                stiff |= h * jacobian.spectral_radius()
                                    > STIFF_ENTRY;
                            }
                            if stiff {
                                switching.switch_to(Method::Rosenbrock);
                                stats.method_switches += 1;
                            }
                        }
                        Method::Rosenbrock => {
                            stats.stiff_steps += 1;
                            if switching
                                .record_implicit(h * step.spectral_radius)
                            {
                                switching.switch_to(Method::DormandPrince);
                                stats.method_switches += 1;
                            }
                        }
                    }
                } else {
                    stats.rejected_steps += 1;
                    h = h_step * factor;
                    if h < self.config.min_step {
                        return Err(IntegrationError::StepSizeUnderflow {
                            t,
                            h,
                        });
                    }
                }
            }
            states.push(y);
        }

        Ok((states, stats))
    }
}

/// Integrates the pond equations over `grid`, starting from `initial`.
///
/// The returned trajectory holds the raw solver states; apply
/// [`crate::trajectory::clamp`] before reporting them.
pub fn integrate(
    params: &SimulationParameters,
    inflow: &impl Inflow,
    initial: PondState,
    grid: &TimeGrid,
    config: &SolverConfig,
) -> Result<Integration, IntegrationError> {
    let solver = AdaptiveSolver::new(*config);
    let (states, stats) = solver.solve(
        |y: &PondState, t: f64| dynamics::f(y, t, params, inflow),
        initial,
        grid.times(),
    )?;
    Ok(Integration {
        trajectory: Trajectory::new(states),
        stats,
    })
}
