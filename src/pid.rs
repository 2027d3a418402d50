use crate::config::PidConfig;

/// Single-input PID loop with a minimum update interval.
///
/// Calls to [`Pid::update`] that arrive sooner than `min_interval` seconds
/// after the last accepted one hand back the previous output untouched.
#[derive(Copy, Clone, Debug)]
pub struct Pid {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub min_interval: f64,
    integral_bounds: (f64, f64),
    setpoint: f64,
    position_tolerance: f64,
    velocity_tolerance: f64,
    integral: f64,
    prev_error: f64,
    derivative: f64,
    output: f64,
    last_measured: f64,
    last_update: Option<f64>,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64, min_interval: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            min_interval,
            integral_bounds: (f64::NEG_INFINITY, f64::INFINITY),
            setpoint: 0.0,
            position_tolerance: 0.0,
            velocity_tolerance: 0.0,
            integral: 0.0,
            prev_error: 0.0,
            derivative: 0.0,
            output: 0.0,
            last_measured: 0.0,
            last_update: None,
        }
    }

    pub fn from_config(config: &PidConfig) -> Self {
        let mut pid = Self::new(config.kp, config.ki, config.kd, config.min_interval);
        pid.integral_bounds = config.integral_bounds;
        pid
    }

    /// Feeds a measurement taken at `now` seconds and returns the control output.
    pub fn update(&mut self, measured: f64, now: f64) -> f64 {
        // the first update has no interval to wait out and nothing to differentiate
        let dt = match self.last_update {
            Some(last) => now - last,
            None => 0.0,
        };
        if self.last_update.is_some() && dt < self.min_interval {
            return self.output;
        }
        self.last_update = Some(now);
        self.last_measured = measured;

        let error = self.setpoint - measured;
        self.integral += error * dt;
        if self.ki != 0.0 {
            self.integral = self
                .integral
                .clamp(self.integral_bounds.0, self.integral_bounds.1);
        }

        self.derivative = if dt > 0.0 {
            (error - self.prev_error) / dt
        } else {
            0.0
        };

        self.prev_error = error;
        self.output = (self.kp * error) + (self.ki * self.integral) + (self.kd * self.derivative);
        self.output
    }

    /// Clears the accumulated state without touching gains or setpoint.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.output = 0.0;
        self.derivative = 0.0;
        self.prev_error = self.setpoint - self.last_measured;
    }

    /// Resets against a fresh `measured` value taken at `now`, so the next
    /// accepted update differentiates and integrates from this point only.
    pub fn reset_at(&mut self, measured: f64, now: f64) {
        self.last_measured = measured;
        self.last_update = Some(now);
        self.reset();
    }

    pub fn set_tunings(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Bounds applied to the raw error accumulator whenever `ki` is non-zero.
    pub fn set_integral_bounds(&mut self, min: f64, max: f64) {
        self.integral_bounds = (min, max);
    }

    pub fn set_tolerance(&mut self, position: f64, velocity: f64) {
        self.position_tolerance = position;
        self.velocity_tolerance = velocity;
    }

    pub fn at_setpoint(&self) -> bool {
        libm::fabs(self.prev_error) <= self.position_tolerance
            && libm::fabs(self.derivative) <= self.velocity_tolerance
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn last_output(&self) -> f64 {
        self.output
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn within_tolerance(value: f64, target: f64) -> bool {
        libm::fabs(value - target) < TOLERANCE
    }

    #[test]
    fn test_proportional_only_first_update() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0.0);
        pid.set_setpoint(10.0);
        pid.reset();
        assert!(within_tolerance(pid.update(0.0, 0.0), 10.0));
    }

    #[test]
    fn test_updates_inside_interval_are_ignored() {
        let mut pid = Pid::new(0.5, 0.1, 0.2, 0.05);
        pid.set_setpoint(4.0);
        let first = pid.update(0.0, 1.0);
        let second = pid.update(3.0, 1.02);
        assert_eq!(first, second);
        assert_eq!(pid.last_output(), first);

        let third = pid.update(3.0, 1.06);
        assert!(third != first);
    }

    #[test]
    fn test_integral_stays_within_bounds() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 0.0);
        pid.set_integral_bounds(-2.0, 2.0);
        pid.set_setpoint(100.0);
        for i in 0..50 {
            pid.update(0.0, i as f64 * 0.1);
            assert!(pid.integral() <= 2.0);
            assert!(pid.integral() >= -2.0);
        }
        assert!(within_tolerance(pid.integral(), 2.0));
        assert!(within_tolerance(pid.last_output(), 2.0));

        pid.set_setpoint(-100.0);
        for i in 50..100 {
            pid.update(0.0, i as f64 * 0.1);
            assert!(pid.integral() >= -2.0);
        }
        assert!(within_tolerance(pid.integral(), -2.0));
    }

    #[test]
    fn test_integral_unclamped_without_ki() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0.0);
        pid.set_integral_bounds(-1.0, 1.0);
        pid.set_setpoint(10.0);
        pid.update(0.0, 0.0);
        pid.update(0.0, 1.0);
        assert!(within_tolerance(pid.integral(), 10.0));
    }

    #[test]
    fn test_derivative_uses_elapsed_time() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 0.0);
        pid.set_setpoint(0.0);
        assert!(within_tolerance(pid.update(0.0, 0.0), 0.0));
        // error goes from 0 to -1 over half a second
        assert!(within_tolerance(pid.update(1.0, 0.5), -2.0));
        // same timestamp never divides by zero
        assert!(within_tolerance(pid.update(2.0, 0.5), 0.0));
    }

    #[test]
    fn test_reset_seeds_previous_error() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 0.0);
        pid.set_setpoint(5.0);
        pid.update(1.0, 0.0);
        pid.set_setpoint(2.0);
        pid.reset();
        // previous error is 2 - 1, so holding the measurement gives no kick
        assert!(within_tolerance(pid.update(1.0, 0.1), 0.0));
    }

    #[test]
    fn test_reset_at_restarts_from_new_measurement() {
        let mut pid = Pid::new(0.0, 1.0, 1.0, 0.05);
        pid.set_setpoint(0.0);
        pid.update(1.0, 0.0);
        pid.update(1.0, 0.5);
        pid.reset_at(0.25, 2.0);
        assert!(within_tolerance(pid.integral(), 0.0));
        // inside the interval from the reset, nothing changes
        assert!(within_tolerance(pid.update(0.25, 2.02), 0.0));
        // holding the reset measurement: no kick, integral over 0.1 s only
        assert!(within_tolerance(pid.update(0.25, 2.1), -0.025));
    }

    #[test]
    fn test_at_setpoint() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 0.0);
        pid.set_tolerance(0.1, 10.0);
        pid.set_setpoint(1.0);
        pid.update(0.0, 0.0);
        assert!(!pid.at_setpoint());
        pid.update(0.95, 0.1);
        assert!(pid.at_setpoint());
    }
}
