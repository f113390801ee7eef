use std::f64::consts::PI;

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.8;

/// Cross-section area (m²) of a circular outlet with diameter `d` (m).
pub fn orifice_area(d: f64) -> f64 {
    PI * d * d / 4.0
}

/// Gravity-driven outflow rate (m³/s) through a circular orifice of
/// diameter `d` under a head of `h` meters, following Torricelli's law.
/// The depth must already be clamped to be non-negative.
///
/// ## Example
///
/// ```
/// assert_eq!(ponds::orifice::q_o(0.0, 0.2), 0.0);
/// ```
pub fn q_o(h: f64, d: f64) -> f64 {
    orifice_area(d) * (2.0 * GRAVITY * h).sqrt()
}
