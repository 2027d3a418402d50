/// Velocity and acceleration limits for a [`TrapezoidProfile`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Constraints {
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

impl Constraints {
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct State {
    pub position: f64,
    pub velocity: f64,
}

impl State {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }
}

/// One-dimensional trapezoidal velocity profile.
///
/// `calculate` is a pure function of elapsed time and the two endpoint
/// states; it also records the phase breakpoints of the last call so
/// `total_time`, `is_finished` and `time_left_until` can be queried after.
#[derive(Copy, Clone, Debug)]
pub struct TrapezoidProfile {
    constraints: Constraints,
    direction: f64,
    current: State,
    end_accel: f64,
    end_full_speed: f64,
    end_decel: f64,
}

impl TrapezoidProfile {
    pub fn new(constraints: Constraints) -> Self {
        Self {
            constraints,
            direction: 1.0,
            current: State::default(),
            end_accel: 0.0,
            end_full_speed: 0.0,
            end_decel: 0.0,
        }
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    /// Flips a state into the frame where the move is in the positive direction.
    fn direct(&self, state: State) -> State {
        State {
            position: state.position * self.direction,
            velocity: state.velocity * self.direction,
        }
    }

    /// State of the profile `t` seconds after leaving `current` for `goal`.
    pub fn calculate(&mut self, t: f64, current: State, goal: State) -> State {
        let max_v = self.constraints.max_velocity;
        let max_a = self.constraints.max_acceleration;

        self.direction = if current.position > goal.position { -1.0 } else { 1.0 };
        self.current = self.direct(current);
        let goal = self.direct(goal);

        if self.current.velocity > max_v {
            self.current.velocity = max_v;
        }

        // parts of a full trapezoid already behind us (begin) or cut off (end)
        let cutoff_begin = self.current.velocity / max_a;
        let cutoff_dist_begin = cutoff_begin * cutoff_begin * max_a / 2.0;
        let cutoff_end = goal.velocity / max_a;
        let cutoff_dist_end = cutoff_end * cutoff_end * max_a / 2.0;

        let full_trapezoid_dist =
            cutoff_dist_begin + (goal.position - self.current.position) + cutoff_dist_end;
        let mut accel_time = max_v / max_a;
        let mut full_speed_dist = full_trapezoid_dist - accel_time * accel_time * max_a;

        // too short to reach max velocity, so the profile is a triangle
        if full_speed_dist < 0.0 {
            accel_time = libm::sqrt(full_trapezoid_dist / max_a);
            full_speed_dist = 0.0;
        }

        self.end_accel = accel_time - cutoff_begin;
        self.end_full_speed = self.end_accel + full_speed_dist / max_v;
        self.end_decel = self.end_full_speed + accel_time - cutoff_end;

        let mut result = self.current;
        if t < self.end_accel {
            result.velocity += t * max_a;
            result.position += (self.current.velocity + t * max_a / 2.0) * t;
        } else if t < self.end_full_speed {
            result.velocity = max_v;
            result.position += (self.current.velocity + self.end_accel * max_a / 2.0)
                * self.end_accel
                + max_v * (t - self.end_accel);
        } else if t <= self.end_decel {
            let time_left = self.end_decel - t;
            result.velocity = goal.velocity + time_left * max_a;
            result.position = goal.position - (goal.velocity + time_left * max_a / 2.0) * time_left;
        } else {
            result = goal;
        }

        self.direct(result)
    }

    /// Duration of the profile from the last `calculate` call.
    pub fn total_time(&self) -> f64 {
        self.end_decel
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.total_time()
    }

    /// Seconds from the start of the last computed profile until it passes `target`.
    pub fn time_left_until(&self, target: f64) -> f64 {
        let max_v = self.constraints.max_velocity;
        let acceleration = self.constraints.max_acceleration;
        let deceleration = -acceleration;

        let position = self.current.position * self.direction;
        let mut velocity = self.current.velocity * self.direction;

        let mut end_accel = self.end_accel * self.direction;
        let mut end_full_speed = self.end_full_speed * self.direction - end_accel;

        if target < position {
            end_accel = -end_accel;
            end_full_speed = -end_full_speed;
            velocity = -velocity;
        }

        let end_accel = end_accel.max(0.0);
        let end_full_speed = end_full_speed.max(0.0);

        let dist_to_target = libm::fabs(target - position);
        if dist_to_target < 1e-6 {
            return 0.0;
        }

        let accel_dist = velocity * end_accel + 0.5 * acceleration * end_accel * end_accel;

        let decel_velocity = if end_accel > 0.0 {
            libm::sqrt(libm::fabs(velocity * velocity + 2.0 * acceleration * accel_dist))
        } else {
            velocity
        };

        let full_speed_dist = max_v * end_full_speed;
        // a target inside an earlier phase never reaches the later ones
        let decel_dist = (dist_to_target - full_speed_dist - accel_dist).max(0.0);
        let accel_dist = accel_dist.min(dist_to_target);
        let full_speed_dist = full_speed_dist.min(dist_to_target - accel_dist);

        let accel_time = (-velocity
            + libm::sqrt(libm::fabs(velocity * velocity + 2.0 * acceleration * accel_dist)))
            / acceleration;

        let decel_time = (-decel_velocity
            + libm::sqrt(libm::fabs(
                decel_velocity * decel_velocity + 2.0 * deceleration * decel_dist,
            )))
            / deceleration;

        let full_speed_time = full_speed_dist / max_v;

        accel_time + full_speed_time + decel_time
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn within(value: f64, target: f64, tolerance: f64) -> bool {
        libm::fabs(value - target) < tolerance
    }

    fn profile() -> TrapezoidProfile {
        TrapezoidProfile::new(Constraints::new(1.0, 0.2))
    }

    #[test]
    fn test_calculate_at_rest_returns_start() {
        let mut p = profile();
        let s = State::new(5.0, 0.0);
        assert_eq!(p.calculate(0.0, s, s), s);
        assert_eq!(p.total_time(), 0.0);
        assert!(p.is_finished(0.0));
    }

    #[test]
    fn test_full_trapezoid_breakpoints() {
        let mut p = profile();
        let start = State::new(0.0, 0.0);
        let goal = State::new(10.0, 0.0);
        p.calculate(0.0, start, goal);
        assert!(within(p.total_time(), 15.0, 1e-9));
        assert!(!p.is_finished(14.9));
        assert!(p.is_finished(15.0));

        let cruise = p.calculate(7.5, start, goal);
        assert!(within(cruise.velocity, 1.0, 1e-9));
        assert!(within(cruise.position, 5.0, 1e-9));
    }

    #[test]
    fn test_past_total_time_returns_goal_exactly() {
        let mut p = profile();
        let start = State::new(0.0, 0.0);
        let goal = State::new(10.0, 0.0);
        assert_eq!(p.calculate(15.0, start, goal), goal);
        assert_eq!(p.calculate(40.0, start, goal), goal);

        let mut reverse = profile();
        let start = State::new(3.0, 0.0);
        let goal = State::new(-7.0, 0.0);
        assert_eq!(reverse.calculate(100.0, start, goal), goal);
    }

    #[test]
    fn test_integrated_velocity_matches_distance() {
        let mut p = profile();
        let start = State::new(0.0, 0.0);
        let goal = State::new(10.0, 0.0);
        p.calculate(0.0, start, goal);
        let total = p.total_time();

        let dt = 0.001;
        let mut t = 0.0;
        let mut distance = 0.0;
        while t < total {
            distance += p.calculate(t, start, goal).velocity * dt;
            t += dt;
        }
        assert!(within(distance, 10.0, 0.1));
        assert!(within(t, 15.0, 0.15));
    }

    #[test]
    fn test_short_move_is_triangular() {
        let mut p = profile();
        let start = State::new(0.0, 0.0);
        let goal = State::new(2.0, 0.0);
        p.calculate(0.0, start, goal);
        let accel_time = libm::sqrt(2.0 / 0.2);
        assert!(within(p.total_time(), 2.0 * accel_time, 1e-9));

        let mut peak: f64 = 0.0;
        let mut t = 0.0;
        while t < p.total_time() {
            peak = peak.max(p.calculate(t, start, goal).velocity);
            t += 0.01;
        }
        assert!(peak < 1.0);
        assert!(within(peak, 0.2 * accel_time, 0.01));
    }

    #[test]
    fn test_reverse_move_mirrors_forward() {
        let mut forward = profile();
        let mut backward = profile();
        for &t in &[0.5, 4.0, 9.0, 13.0] {
            let f = forward.calculate(t, State::new(0.0, 0.0), State::new(10.0, 0.0));
            let b = backward.calculate(t, State::new(0.0, 0.0), State::new(-10.0, 0.0));
            assert!(within(f.position, -b.position, 1e-9));
            assert!(within(f.velocity, -b.velocity, 1e-9));
        }
    }

    #[test]
    fn test_time_left_until() {
        let mut p = profile();
        p.calculate(0.0, State::new(0.0, 0.0), State::new(10.0, 0.0));
        assert!(within(p.time_left_until(0.0), 0.0, 1e-9));
        assert!(within(p.time_left_until(10.0), 15.0, 1e-6));
        // halfway through the acceleration ramp: 0.5 * 0.2 * t^2 = 0.9
        assert!(within(p.time_left_until(0.9), 3.0, 1e-6));
    }
}
