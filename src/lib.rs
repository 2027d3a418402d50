//! Motion control for a four-wheel holonomic (X-drive) V5 robot.
//!
//! Everything in here is hardware-agnostic: devices are reached through the
//! traits in [`hardware`] so the control code can run against the real
//! brain or a simulated robot.
#![no_std]
extern crate alloc;

pub mod config;
pub mod drivetrain;
pub mod error;
pub mod hardware;
pub mod motion;
pub mod odometry;
pub mod pid;
pub mod profile;
pub mod task;
pub mod utils;

pub use config::{DrivetrainConfig, PidConfig, WheelConfig};
pub use drivetrain::{Drivetrain, DrivetrainTarget};
pub use error::{ConfigError, DeviceError, MotionError};
pub use motion::MotionStatus;
pub use odometry::{Odometry, Pose, PoseEstimator, SlipTable};
pub use pid::Pid;
pub use profile::{Constraints, State, TrapezoidProfile};
pub use task::{StopHandle, run_odometry};
