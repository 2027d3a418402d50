use core::f64::consts::{PI, TAU};
pub mod units;

/// Wraps an angle into `[0, 2pi)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let r = libm::fmod(angle, TAU);
    let r = if r < 0.0 { r + TAU } else { r };
    // fmod of a tiny negative value rounds back up to exactly 2pi
    if r >= TAU { 0.0 } else { r }
}

/// Wraps an angle into `[-pi, pi)`.
pub fn normalize_angle(angle: f64) -> f64 {
    wrap_angle(angle + PI) - PI
}

/// Signed turn from `from` to `to`, in `(-pi, pi]`.
///
/// Both headings are reduced modulo one turn first, then the difference gets
/// a single full-turn correction.
pub fn shortest_turn(from: f64, to: f64) -> f64 {
    let mut diff = wrap_angle(to) - wrap_angle(from);
    if diff > PI {
        diff -= TAU;
    } else if diff <= -PI {
        diff += TAU;
    }
    diff
}

/// Linear interpolation of `x` between `(x0, y0)` and `(x1, y1)`.
pub fn interpolate(x0: f64, x1: f64, y0: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

pub fn hypot(x: f64, y: f64) -> f64 {
    libm::hypot(x, y)
}
