use core::{
    f64::consts::{FRAC_PI_2, FRAC_PI_4, PI},
    time::Duration,
};

use crate::{error::ConfigError, odometry::SlipTable, utils::normalize_angle};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WheelConfig {
    /// Direction a positive wheel velocity pushes the robot, robot frame, radians.
    pub mount_angle: f64,
    /// Spin adds to this wheel's power when set and subtracts otherwise.
    pub inverted: bool,
}

impl WheelConfig {
    pub const fn new(mount_angle: f64, inverted: bool) -> Self {
        Self {
            mount_angle,
            inverted,
        }
    }

    /// Sign of this wheel's contribution to counter-clockwise rotation.
    pub fn spin_sign(&self) -> f64 {
        if self.inverted { 1.0 } else { -1.0 }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Seconds that must pass between accepted updates.
    pub min_interval: f64,
    pub integral_bounds: (f64, f64),
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            min_interval: 0.05,
            integral_bounds: (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}

/// Everything the drivetrain and odometry need to know about the robot.
///
/// Wheels are ordered front-left, front-right, rear-right, rear-left. Build
/// one, adjust fields as needed, and hand it to the constructors; they call
/// [`DrivetrainConfig::validate`] and refuse to start on a bad value.
#[derive(Clone, Debug)]
pub struct DrivetrainConfig {
    pub wheels: [WheelConfig; 4],
    pub wheel_circumference_cm: f64,
    pub encoder_ticks_per_rotation: f64,
    pub heading_pid: PidConfig,
    pub positional_tolerance_cm: f64,
    pub directional_tolerance_rad: f64,
    pub slip_table: SlipTable,
    /// Ground speed of the chassis at full power.
    pub max_speed_cm_per_s: f64,
    pub accel_time_s: f64,
    pub decel_time_s: f64,
    /// Floor on commanded speed while decelerating so a move always finishes.
    pub min_profiled_speed: f64,
    pub control_period: Duration,
    pub odometry_period: Duration,
    /// Blocking moves give up and stop the motors after this long.
    pub motion_timeout: Option<Duration>,
    pub braking: bool,
}

pub const WHEEL_RADIUS_CM: f64 = 5.23875;

impl Default for DrivetrainConfig {
    fn default() -> Self {
        let wheel_circumference_cm = 2.0 * WHEEL_RADIUS_CM * PI;
        Self {
            wheels: [
                WheelConfig::new(FRAC_PI_4, false),
                WheelConfig::new(FRAC_PI_4 + FRAC_PI_2, true),
                WheelConfig::new(FRAC_PI_4, true),
                WheelConfig::new(FRAC_PI_4 + FRAC_PI_2, false),
            ],
            wheel_circumference_cm,
            encoder_ticks_per_rotation: 360.0,
            heading_pid: PidConfig {
                kp: 1.75 * 0.4,
                ..Default::default()
            },
            positional_tolerance_cm: 2.0,
            directional_tolerance_rad: 2.0_f64.to_radians(),
            slip_table: SlipTable::default(),
            // 200 rpm green cartridge
            max_speed_cm_per_s: 200.0 / 60.0 * wheel_circumference_cm,
            accel_time_s: 0.5,
            decel_time_s: 0.5,
            min_profiled_speed: 0.1,
            control_period: Duration::from_millis(10),
            odometry_period: Duration::from_millis(5),
            motion_timeout: None,
            braking: true,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

fn same_angle(a: f64, b: f64) -> bool {
    libm::fabs(normalize_angle(a - b)) < 1e-6
}

impl DrivetrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("wheel circumference", self.wheel_circumference_cm)?;
        positive("encoder ticks per rotation", self.encoder_ticks_per_rotation)?;
        positive("max speed", self.max_speed_cm_per_s)?;
        positive("acceleration time", self.accel_time_s)?;
        positive("deceleration time", self.decel_time_s)?;
        positive("control period", self.control_period.as_secs_f64())?;
        positive("odometry period", self.odometry_period.as_secs_f64())?;
        non_negative("positional tolerance", self.positional_tolerance_cm)?;
        non_negative("directional tolerance", self.directional_tolerance_rad)?;
        non_negative("minimum profiled speed", self.min_profiled_speed)?;
        non_negative("pid interval", self.heading_pid.min_interval)?;

        let (min, max) = self.heading_pid.integral_bounds;
        if !(min <= max) {
            return Err(ConfigError::IntegralBounds { min, max });
        }

        let [w1, w2, w3, w4] = self.wheels;
        if !same_angle(w1.mount_angle, w3.mount_angle) || !same_angle(w2.mount_angle, w4.mount_angle) {
            return Err(ConfigError::WheelLayout("diagonal wheels must share a mount angle"));
        }
        if !same_angle(w2.mount_angle - w1.mount_angle, FRAC_PI_2) {
            return Err(ConfigError::WheelLayout(
                "second diagonal must sit a quarter turn counter-clockwise of the first",
            ));
        }
        if w1.inverted == w3.inverted || w2.inverted == w4.inverted {
            return Err(ConfigError::WheelLayout("diagonal wheels must spin in opposite senses"));
        }
        Ok(())
    }
}
