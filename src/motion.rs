//! State carried by the drivetrain's non-blocking movement primitives.
//!
//! A movement is armed once and then advanced one control period at a time
//! by [`crate::Drivetrain::tick`], which reports a [`MotionStatus`].
use alloc::vec::Vec;

use log::debug;

use crate::{
    config::DrivetrainConfig,
    profile::{Constraints, State, TrapezoidProfile},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionStatus {
    InProgress,
    Done,
    /// The move ended past its target or ran out of profiled time first.
    Overshot,
}

impl MotionStatus {
    pub fn is_finished(self) -> bool {
        self != MotionStatus::InProgress
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoveTo {
    pub target: (f64, f64),
    pub speed: f64,
}

/// Rotation in place until the heading loop settles on its setpoint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TurnToHeading {
    pub target: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathLeg {
    Turn,
    Move,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathFollow {
    pub points: Vec<(f64, f64)>,
    pub speed: f64,
    pub index: usize,
    pub leg: PathLeg,
    /// Heading setpoint armed for the current turn leg.
    pub turn_target: Option<f64>,
}

impl PathFollow {
    pub fn new(points: Vec<(f64, f64)>, speed: f64) -> Self {
        Self {
            points,
            speed,
            index: 0,
            leg: PathLeg::Turn,
            turn_target: None,
        }
    }

    pub fn current(&self) -> Option<(f64, f64)> {
        self.points.get(self.index).copied()
    }

    /// Moves on to the next waypoint's turn leg.
    pub fn advance(&mut self) {
        self.index += 1;
        self.leg = PathLeg::Turn;
        self.turn_target = None;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProfilePhase {
    Start,
    Accelerating,
    Traveling,
    Decelerating,
}

/// What a profiled move wants this period.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ProfileStep {
    /// Drive along the move's direction at this fraction of full speed.
    Drive(f64),
    Finished(MotionStatus),
}

/// Straight-line move of a fixed distance with a speed ramp at each end.
///
/// Speed ramps up linearly over the acceleration time, holds, then ramps
/// down with distance so it reaches zero at the target. Deceleration begins
/// as soon as the remaining distance is no more than it would take to stop
/// from the current speed, even mid-ramp.
#[derive(Copy, Clone, Debug)]
pub struct ProfiledMove {
    pub start: (f64, f64),
    /// Field-frame direction of travel, radians.
    pub direction: f64,
    pub distance: f64,
    pub speed: f64,
    phase: ProfilePhase,
    started_at: f64,
    current_speed: f64,
    /// Speed and remaining distance when deceleration began.
    decel_from: (f64, f64),
    /// Time after which the move counts as overshot.
    deadline: f64,
    accel_time: f64,
    decel_time: f64,
    max_speed: f64,
    min_speed: f64,
    tolerance: f64,
}

impl ProfiledMove {
    pub fn new(
        start: (f64, f64),
        direction: f64,
        distance: f64,
        speed: f64,
        config: &DrivetrainConfig,
    ) -> Self {
        let speed = speed.clamp(0.0, 1.0);
        let distance = libm::fabs(distance);

        let max_velocity = speed * config.max_speed_cm_per_s;
        let ramp_time = config.accel_time_s.max(config.decel_time_s);
        let deadline = if max_velocity > 0.0 {
            let mut profile =
                TrapezoidProfile::new(Constraints::new(max_velocity, max_velocity / ramp_time));
            profile.calculate(0.0, State::default(), State::new(distance, 0.0));
            // the distance-based ramp down crawls at the floor speed for its last stretch
            profile.total_time() + config.decel_time_s
        } else {
            0.0
        };

        Self {
            start,
            direction,
            distance,
            speed,
            phase: ProfilePhase::Start,
            started_at: 0.0,
            current_speed: 0.0,
            decel_from: (0.0, 0.0),
            deadline,
            accel_time: config.accel_time_s,
            decel_time: config.decel_time_s,
            max_speed: config.max_speed_cm_per_s,
            min_speed: config.min_profiled_speed.min(speed),
            tolerance: config.positional_tolerance_cm,
        }
    }

    pub fn phase(&self) -> ProfilePhase {
        self.phase
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn target(&self) -> (f64, f64) {
        let (s, c) = libm::sincos(self.direction);
        (self.start.0 + self.distance * c, self.start.1 + self.distance * s)
    }

    /// Distance it takes to ramp from `speed` to a stop at the configured rate.
    pub fn stopping_distance(&self, speed: f64) -> f64 {
        if self.speed <= 0.0 {
            return 0.0;
        }
        let ramp_time = self.decel_time * speed / self.speed;
        speed * self.max_speed * ramp_time / 2.0
    }

    /// Advances the move given the time and how far along the direction of
    /// travel the robot has come since the start.
    pub fn step(&mut self, now: f64, progress: f64) -> ProfileStep {
        let remaining = self.distance - progress;
        if libm::fabs(remaining) <= self.tolerance {
            return ProfileStep::Finished(MotionStatus::Done);
        }
        if remaining < -self.tolerance || self.speed <= 0.0 {
            return ProfileStep::Finished(MotionStatus::Overshot);
        }

        if self.phase == ProfilePhase::Start {
            self.started_at = now;
            self.phase = ProfilePhase::Accelerating;
            debug!("profiled move: accelerating over {:.1} cm", self.distance);
        }
        let elapsed = now - self.started_at;
        if elapsed > self.deadline {
            return ProfileStep::Finished(MotionStatus::Overshot);
        }

        if matches!(self.phase, ProfilePhase::Accelerating | ProfilePhase::Traveling) {
            if remaining <= self.stopping_distance(self.current_speed) {
                self.phase = ProfilePhase::Decelerating;
                self.decel_from = (self.current_speed.max(self.min_speed), remaining);
                debug!("profiled move: decelerating with {:.1} cm left", remaining);
            } else if self.phase == ProfilePhase::Accelerating && elapsed >= self.accel_time {
                self.phase = ProfilePhase::Traveling;
                debug!("profiled move: traveling");
            }
        }

        self.current_speed = match self.phase {
            ProfilePhase::Start | ProfilePhase::Accelerating => {
                (self.speed * elapsed / self.accel_time).min(self.speed)
            }
            ProfilePhase::Traveling => self.speed,
            ProfilePhase::Decelerating => {
                // constant deceleration over distance: v = v0 * sqrt(d / d0)
                let (v0, d0) = self.decel_from;
                let scale = if d0 > 0.0 { libm::sqrt(remaining / d0) } else { 0.0 };
                (v0 * scale).clamp(self.min_speed, v0)
            }
        };
        ProfileStep::Drive(self.current_speed)
    }
}

/// The movement currently armed on a drivetrain.
#[derive(Clone, Debug)]
pub enum Motion {
    MoveTo(MoveTo),
    Turn(TurnToHeading),
    Profiled(ProfiledMove),
    Path(PathFollow),
}
