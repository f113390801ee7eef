use crate::hydrograph::Inflow;
use crate::orifice::q_o;
use crate::state::PondState;
use crate::system::SimulationParameters;

/// Right-hand side of the coupled pond equations.
///
/// The depths are clamped to their ponds' physical ranges before the
/// outflows are computed, on every evaluation, since the solver may visit
/// out-of-range intermediate states. The returned derivative is computed
/// from the clamped depths; the state itself is left untouched.
///
/// ```text
/// dh1/dt = (q_i1(t) - q_o(h1, D1)) / A1
/// dh2/dt = (q_o(h1, D1) - q_o(h2, D2)) / A2
/// ```
pub fn f(
    state: &PondState,
    t: f64,
    params: &SimulationParameters,
    inflow: &impl Inflow,
) -> PondState {
    let depths = state.clamped(params);
    let upstream = &params.upstream;
    let downstream = &params.downstream;

    // pond 1 drains into pond 2
    let transfer = q_o(depths.h1, upstream.outlet_diameter);
    let outflow = q_o(depths.h2, downstream.outlet_diameter);

    PondState::new(
        (inflow.rate(t) - transfer) / upstream.bottom_area,
        (transfer - outflow) / downstream.bottom_area,
    )
}
