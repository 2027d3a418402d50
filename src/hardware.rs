//! Device seams between the control code and whatever runs it.
//!
//! The competition binary implements these for vexide devices. Tests
//! implement them for a simulated robot.
use core::{future::Future, time::Duration};

use crate::error::DeviceError;

/// What a motor does once it is told to stop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoppingMode {
    Brake,
    Coast,
    Hold,
}

pub trait DriveMotor {
    /// Commands a signed velocity in percent of free speed, `-100..=100`.
    fn set_velocity(&mut self, percent: f64) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.set_velocity(0.0)
    }

    fn set_stopping_mode(&mut self, mode: StoppingMode) -> Result<(), DeviceError>;
}

pub trait WheelEncoder {
    /// Cumulative wheel position in encoder ticks.
    fn position(&self) -> Result<f64, DeviceError>;
}

pub trait HeadingSensor {
    /// Cumulative rotation in degrees, clockwise positive.
    fn rotation(&self) -> Result<f64, DeviceError>;

    fn set_rotation(&mut self, degrees: f64) -> Result<(), DeviceError>;

    fn is_calibrating(&self) -> bool;
}

/// Monotonic time plus the yield used by every polling loop.
pub trait Clock {
    /// Seconds since some fixed point.
    fn now(&self) -> f64;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

impl<T: WheelEncoder + ?Sized> WheelEncoder for &T {
    fn position(&self) -> Result<f64, DeviceError> {
        (**self).position()
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        (**self).sleep(duration)
    }
}
