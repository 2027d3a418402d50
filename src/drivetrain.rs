use alloc::{rc::Rc, vec::Vec};
use core::{cell::RefCell, f64::consts::FRAC_PI_2};

use log::{info, warn};

use crate::{
    config::DrivetrainConfig,
    error::{ConfigError, MotionError},
    hardware::{Clock, DriveMotor, StoppingMode},
    motion::{
        Motion, MotionStatus, MoveTo, PathFollow, PathLeg, ProfileStep, ProfiledMove,
        TurnToHeading,
    },
    odometry::{Pose, PoseEstimator},
    pid::Pid,
    utils::shortest_turn,
};

/// Power a wheel mounted at `mount_angle` needs for translation in `direction`.
pub fn wheel_power(direction: f64, speed: f64, mount_angle: f64) -> f64 {
    speed * libm::cos(mount_angle - direction)
}

/// Scales all four powers down together when any exceeds full power, keeping
/// their ratios.
pub fn desaturate(powers: [f64; 4]) -> [f64; 4] {
    let max = powers.iter().fold(0.0_f64, |max, p| max.max(libm::fabs(*p)));
    if max > 1.0 {
        powers.map(|p| p / max)
    } else {
        powers
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DrivetrainTarget {
    pub position: (f64, f64),
    pub heading: f64,
}

/// Four-wheel holonomic drivetrain.
///
/// Directions are radians with zero along the robot's (or field's) x axis
/// and counter-clockwise positive, so driving forward is `pi / 2`. Heading is
/// held by a PID loop whose output is mixed in as spin unless a caller
/// supplies its own.
///
/// Movements come in two forms. `start_*` arms a movement that [`tick`]
/// advances one control period at a time; the `async` methods arm one and
/// drive `tick` until it finishes. Dropping one of those futures leaves the
/// movement armed, so follow it with [`cancel`].
///
/// [`tick`]: Drivetrain::tick
/// [`cancel`]: Drivetrain::cancel
pub struct Drivetrain<M, O, C> {
    motors: [M; 4],
    odometry: Rc<RefCell<O>>,
    clock: C,
    config: DrivetrainConfig,
    heading_pid: Pid,
    heading_correction: f64,
    target_position: (f64, f64),
    motion: Option<Motion>,
    wheel_powers: [f64; 4],
    braking: bool,
}

impl<M: DriveMotor, O: PoseEstimator, C: Clock> Drivetrain<M, O, C> {
    pub fn new(
        config: &DrivetrainConfig,
        motors: [M; 4],
        odometry: Rc<RefCell<O>>,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut drivetrain = Self {
            motors,
            odometry,
            clock,
            config: config.clone(),
            heading_pid: Pid::from_config(&config.heading_pid),
            heading_correction: 0.0,
            target_position: (0.0, 0.0),
            motion: None,
            wheel_powers: [0.0; 4],
            braking: config.braking,
        };
        drivetrain.set_braking(config.braking);
        drivetrain.stop();
        Ok(drivetrain)
    }

    fn pose(&self) -> Pose {
        self.odometry.borrow().pose()
    }

    fn write_powers(&mut self, powers: [f64; 4]) {
        for (i, (motor, power)) in self.motors.iter_mut().zip(powers).enumerate() {
            if let Err(e) = motor.set_velocity(power * 100.0) {
                warn!("wheel {} velocity write failed: {}", i + 1, e);
            }
        }
        self.wheel_powers = powers;
    }

    /// Drives in `direction` relative to the robot's front-facing frame.
    ///
    /// `speed` is clamped to `[0, 1]` and `spin` to `[-1, 1]`; without a spin
    /// the last heading correction is used.
    pub fn move_relative(&mut self, direction: f64, speed: f64, spin: Option<f64>) {
        let speed = speed.clamp(0.0, 1.0);
        let spin = spin.unwrap_or(self.heading_correction).clamp(-1.0, 1.0);
        let powers = self
            .config
            .wheels
            .map(|w| wheel_power(direction, speed, w.mount_angle) + w.spin_sign() * spin);
        self.write_powers(desaturate(powers));
    }

    /// Drives in a field-frame `direction` regardless of which way the robot faces.
    pub fn move_headless(&mut self, direction: f64, speed: f64, spin: Option<f64>) {
        let heading = self.pose().heading;
        self.move_relative(direction - heading, speed, spin);
    }

    /// Zero power on every wheel; the stopping mode decides what happens next.
    pub fn stop(&mut self) {
        for (i, motor) in self.motors.iter_mut().enumerate() {
            if let Err(e) = motor.stop() {
                warn!("wheel {} stop failed: {}", i + 1, e);
            }
        }
        self.wheel_powers = [0.0; 4];
    }

    /// Drops the armed movement, if any, and stops the wheels.
    pub fn cancel(&mut self) {
        if self.motion.take().is_some() {
            info!("motion cancelled");
        }
        self.stop();
    }

    pub fn set_braking(&mut self, enabled: bool) {
        let mode = if enabled {
            StoppingMode::Brake
        } else {
            StoppingMode::Coast
        };
        for (i, motor) in self.motors.iter_mut().enumerate() {
            if let Err(e) = motor.set_stopping_mode(mode) {
                warn!("wheel {} stopping mode write failed: {}", i + 1, e);
            }
        }
        self.braking = enabled;
    }

    /// Zeroes the pose, the heading setpoint and the target position.
    pub fn reset(&mut self) {
        self.cancel();
        self.odometry.borrow_mut().reset();
        let heading = self.pose().heading;
        self.heading_pid.set_setpoint(0.0);
        self.heading_pid.reset_at(heading, self.clock.now());
        self.heading_correction = 0.0;
        self.target_position = (0.0, 0.0);
        info!("drivetrain reset");
    }

    /// Runs the heading loop against the current pose and returns its output.
    pub fn update_heading_pid(&mut self) -> f64 {
        let heading = self.pose().heading;
        self.heading_correction = self.heading_pid.update(heading, self.clock.now());
        self.heading_correction
    }

    /// Signed shortest turn from the current heading setpoint to `heading`.
    pub fn calculate_optimal_turn(&self, heading: f64) -> f64 {
        shortest_turn(self.heading_pid.setpoint(), heading)
    }

    /// Moves the heading setpoint the short way round to `heading` and
    /// returns the new setpoint.
    fn face_heading(&mut self, heading: f64) -> f64 {
        let setpoint = self.heading_pid.setpoint() + self.calculate_optimal_turn(heading);
        self.heading_pid.set_setpoint(setpoint);
        setpoint
    }

    /// Heading that points the robot's front at `point`.
    fn heading_towards(&self, point: (f64, f64)) -> f64 {
        let pose = self.pose();
        libm::atan2(point.1 - pose.y, point.0 - pose.x) - FRAC_PI_2
    }

    pub fn start_move_to(&mut self, target: (f64, f64), speed: f64) {
        info!("moving to ({:.1}, {:.1}) at {:.2}", target.0, target.1, speed);
        self.target_position = target;
        self.motion = Some(Motion::MoveTo(MoveTo { target, speed }));
    }

    pub fn start_turn(&mut self, heading: f64) {
        let target = self.face_heading(heading);
        info!("turning to {:.1} deg", target.to_degrees());
        self.motion = Some(Motion::Turn(TurnToHeading { target }));
    }

    /// Arms a ramped straight move. `direction` is relative to the robot.
    pub fn start_profiled(&mut self, direction: f64, distance: f64, speed: f64) {
        let pose = self.pose();
        let field_direction = pose.heading + direction;
        let mv = ProfiledMove::new((pose.x, pose.y), field_direction, distance, speed, &self.config);
        self.target_position = mv.target();
        info!(
            "profiled move of {:.1} cm towards ({:.1}, {:.1})",
            mv.distance, self.target_position.0, self.target_position.1
        );
        self.motion = Some(Motion::Profiled(mv));
    }

    pub fn start_path(&mut self, points: Vec<(f64, f64)>, speed: f64) {
        info!("following a path of {} points", points.len());
        self.motion = Some(Motion::Path(PathFollow::new(points, speed)));
    }

    /// Advances the armed movement by one control period.
    ///
    /// Reports [`MotionStatus::Done`] when nothing is armed. The wheels are
    /// stopped as soon as a movement finishes.
    pub fn tick(&mut self) -> MotionStatus {
        let Some(mut motion) = self.motion.take() else {
            return MotionStatus::Done;
        };
        let status = match &mut motion {
            Motion::MoveTo(m) => self.step_move_to(m),
            Motion::Turn(t) => self.step_turn(t),
            Motion::Profiled(mv) => self.step_profiled(mv),
            Motion::Path(path) => self.step_path(path),
        };
        if status.is_finished() {
            self.stop();
            info!("motion finished: {:?}", status);
        } else {
            self.motion = Some(motion);
        }
        status
    }

    fn step_move_to(&mut self, m: &MoveTo) -> MotionStatus {
        let pose = self.pose();
        if pose.distance_to(m.target.0, m.target.1) <= self.config.positional_tolerance_cm {
            return MotionStatus::Done;
        }
        let direction = libm::atan2(m.target.1 - pose.y, m.target.0 - pose.x);
        self.update_heading_pid();
        self.move_headless(direction, m.speed, None);
        MotionStatus::InProgress
    }

    fn step_turn(&mut self, t: &TurnToHeading) -> MotionStatus {
        let error = t.target - self.pose().heading;
        if libm::fabs(error) <= self.config.directional_tolerance_rad {
            return MotionStatus::Done;
        }
        self.update_heading_pid();
        self.move_relative(0.0, 0.0, None);
        MotionStatus::InProgress
    }

    fn step_profiled(&mut self, mv: &mut ProfiledMove) -> MotionStatus {
        let pose = self.pose();
        let (s, c) = libm::sincos(mv.direction);
        let progress = (pose.x - mv.start.0) * c + (pose.y - mv.start.1) * s;
        match mv.step(self.clock.now(), progress) {
            ProfileStep::Drive(speed) => {
                self.update_heading_pid();
                self.move_headless(mv.direction, speed, None);
                MotionStatus::InProgress
            }
            ProfileStep::Finished(status) => status,
        }
    }

    fn step_path(&mut self, path: &mut PathFollow) -> MotionStatus {
        let Some(point) = path.current() else {
            return MotionStatus::Done;
        };
        match path.leg {
            PathLeg::Turn => {
                // already there, nothing to face
                if self.pose().distance_to(point.0, point.1) <= self.config.positional_tolerance_cm {
                    path.advance();
                    return self.finished_or_in_progress(path);
                }
                let target = match path.turn_target {
                    Some(target) => target,
                    None => {
                        let heading = self.heading_towards(point);
                        let target = self.face_heading(heading);
                        path.turn_target = Some(target);
                        target
                    }
                };
                if self.step_turn(&TurnToHeading { target }) == MotionStatus::Done {
                    self.stop();
                    self.target_position = point;
                    path.leg = PathLeg::Move;
                }
                MotionStatus::InProgress
            }
            PathLeg::Move => {
                let leg = MoveTo {
                    target: point,
                    speed: path.speed,
                };
                if self.step_move_to(&leg) == MotionStatus::Done {
                    self.stop();
                    path.advance();
                    return self.finished_or_in_progress(path);
                }
                MotionStatus::InProgress
            }
        }
    }

    fn finished_or_in_progress(&self, path: &PathFollow) -> MotionStatus {
        if path.current().is_some() {
            MotionStatus::InProgress
        } else {
            MotionStatus::Done
        }
    }

    async fn run_motion(&mut self) -> Result<MotionStatus, MotionError> {
        let started = self.clock.now();
        loop {
            let status = self.tick();
            if status.is_finished() {
                return Ok(status);
            }
            if let Some(timeout) = self.config.motion_timeout {
                let elapsed = self.clock.now() - started;
                if elapsed >= timeout.as_secs_f64() {
                    self.cancel();
                    warn!("motion timed out after {:.2} s", elapsed);
                    return Err(MotionError::TimedOut { elapsed_s: elapsed });
                }
            }
            self.clock.sleep(self.config.control_period).await;
        }
    }

    /// Drives straight to a field position, holding heading, then stops.
    pub async fn move_to_position(
        &mut self,
        target: (f64, f64),
        speed: f64,
    ) -> Result<MotionStatus, MotionError> {
        self.start_move_to(target, speed);
        self.run_motion().await
    }

    /// Visits each point in order, turning to face it before driving to it.
    pub async fn follow_path(
        &mut self,
        points: &[(f64, f64)],
        speed: f64,
    ) -> Result<MotionStatus, MotionError> {
        self.start_path(points.to_vec(), speed);
        self.run_motion().await
    }

    /// Points the heading setpoint at `heading` (radians) the short way round.
    ///
    /// With `wait` the robot turns in place until it is within tolerance.
    /// Without it the call returns at once with [`MotionStatus::InProgress`]
    /// and the heading loop carries the turn during later moves.
    pub async fn turn_to_face_heading(
        &mut self,
        heading: f64,
        wait: bool,
    ) -> Result<MotionStatus, MotionError> {
        if !wait {
            self.face_heading(heading);
            return Ok(MotionStatus::InProgress);
        }
        self.start_turn(heading);
        self.run_motion().await
    }

    pub async fn turn_to_face_heading_rad(
        &mut self,
        heading: f64,
        wait: bool,
    ) -> Result<MotionStatus, MotionError> {
        self.turn_to_face_heading(heading, wait).await
    }

    pub async fn turn_to_face_heading_deg(
        &mut self,
        heading: f64,
        wait: bool,
    ) -> Result<MotionStatus, MotionError> {
        self.turn_to_face_heading(heading.to_radians(), wait).await
    }

    /// Turns so the front of the robot faces a field position.
    pub async fn turn_to_face_position(
        &mut self,
        point: (f64, f64),
        wait: bool,
    ) -> Result<MotionStatus, MotionError> {
        let heading = self.heading_towards(point);
        self.turn_to_face_heading(heading, wait).await
    }

    pub async fn forward(&mut self, distance: f64, speed: f64) -> Result<MotionStatus, MotionError> {
        self.start_profiled(FRAC_PI_2, distance, speed);
        self.run_motion().await
    }

    pub async fn backwards(&mut self, distance: f64, speed: f64) -> Result<MotionStatus, MotionError> {
        self.start_profiled(-FRAC_PI_2, distance, speed);
        self.run_motion().await
    }

    pub async fn strafe_left(&mut self, distance: f64, speed: f64) -> Result<MotionStatus, MotionError> {
        self.start_profiled(core::f64::consts::PI, distance, speed);
        self.run_motion().await
    }

    pub async fn strafe_right(&mut self, distance: f64, speed: f64) -> Result<MotionStatus, MotionError> {
        self.start_profiled(0.0, distance, speed);
        self.run_motion().await
    }

    pub fn current_position(&self) -> (f64, f64) {
        let pose = self.pose();
        (pose.x, pose.y)
    }

    pub fn current_heading(&self) -> f64 {
        self.pose().heading
    }

    pub fn current_heading_deg(&self) -> f64 {
        self.current_heading().to_degrees()
    }

    pub fn target_position(&self) -> (f64, f64) {
        self.target_position
    }

    pub fn set_target_position(&mut self, position: (f64, f64)) {
        self.target_position = position;
    }

    pub fn target_heading(&self) -> f64 {
        self.heading_pid.setpoint()
    }

    pub fn target_heading_deg(&self) -> f64 {
        self.heading_pid.setpoint().to_degrees()
    }

    pub fn set_target_heading_rad(&mut self, heading: f64) {
        self.heading_pid.set_setpoint(heading);
    }

    pub fn set_target_heading_deg(&mut self, heading: f64) {
        self.heading_pid.set_setpoint(heading.to_radians());
    }

    pub fn target(&self) -> DrivetrainTarget {
        DrivetrainTarget {
            position: self.target_position,
            heading: self.heading_pid.setpoint(),
        }
    }

    /// Last powers written to the wheels, `-1..=1`.
    pub fn wheel_powers(&self) -> [f64; 4] {
        self.wheel_powers
    }

    pub fn braking(&self) -> bool {
        self.braking
    }

    pub fn is_busy(&self) -> bool {
        self.motion.is_some()
    }

    pub fn motion(&self) -> Option<&Motion> {
        self.motion.as_ref()
    }

    pub fn heading_pid_mut(&mut self) -> &mut Pid {
        &mut self.heading_pid
    }

    pub fn odometry(&self) -> Rc<RefCell<O>> {
        Rc::clone(&self.odometry)
    }

    pub fn config(&self) -> &DrivetrainConfig {
        &self.config
    }
}
