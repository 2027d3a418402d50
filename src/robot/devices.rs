//! vexide devices behind the control library's hardware traits.
use alloc::rc::Rc;
use core::{cell::RefCell, future::Future, time::Duration};

use hurricanes_holonomic::{
    error::DeviceError,
    hardware::{Clock, DriveMotor, HeadingSensor, StoppingMode, WheelEncoder},
};
use vexide::{
    devices::smart::{
        imu::{InertialError, InertialSensor},
        motor::MotorError,
    },
    prelude::*,
    time::Instant,
};

const MAX_VOLTS: f64 = 12.0;

fn motor_error(e: MotorError) -> DeviceError {
    match e {
        MotorError::Port { .. } => DeviceError::Disconnected,
        _ => DeviceError::Fault,
    }
}

fn imu_error(e: InertialError) -> DeviceError {
    match e {
        InertialError::Port { .. } => DeviceError::Disconnected,
        InertialError::CalibrationTimedOut => DeviceError::Calibrating,
        _ => DeviceError::Fault,
    }
}

/// A drive motor shared between the drivetrain, which commands it, and
/// odometry, which reads its encoder.
#[derive(Clone)]
pub struct SharedMotor {
    motor: Rc<RefCell<Motor>>,
    brake_mode: BrakeMode,
}

impl SharedMotor {
    pub fn new(motor: Motor) -> Self {
        Self {
            motor: Rc::new(RefCell::new(motor)),
            brake_mode: BrakeMode::Brake,
        }
    }
}

impl DriveMotor for SharedMotor {
    fn set_velocity(&mut self, percent: f64) -> Result<(), DeviceError> {
        let volts = (percent / 100.0 * MAX_VOLTS).clamp(-MAX_VOLTS, MAX_VOLTS);
        self.motor.borrow_mut().set_voltage(volts).map_err(motor_error)
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.motor.borrow_mut().brake(self.brake_mode).map_err(motor_error)
    }

    fn set_stopping_mode(&mut self, mode: StoppingMode) -> Result<(), DeviceError> {
        self.brake_mode = match mode {
            StoppingMode::Brake => BrakeMode::Brake,
            StoppingMode::Coast => BrakeMode::Coast,
            StoppingMode::Hold => BrakeMode::Hold,
        };
        Ok(())
    }
}

impl WheelEncoder for SharedMotor {
    // green cartridge encoders report 360 ticks per output turn
    fn position(&self) -> Result<f64, DeviceError> {
        self.motor
            .borrow()
            .position()
            .map(|p| p.as_degrees())
            .map_err(motor_error)
    }
}

pub struct Imu(pub InertialSensor);

impl HeadingSensor for Imu {
    fn rotation(&self) -> Result<f64, DeviceError> {
        self.0.rotation().map_err(imu_error)
    }

    fn set_rotation(&mut self, degrees: f64) -> Result<(), DeviceError> {
        self.0.set_rotation(degrees).map_err(imu_error)
    }

    fn is_calibrating(&self) -> bool {
        self.0.is_calibrating().unwrap_or(false)
    }
}

/// Seconds since program start, and vexide's executor sleep.
#[derive(Copy, Clone)]
pub struct VexClock {
    start: Instant,
}

impl VexClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for VexClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        sleep(duration)
    }
}
