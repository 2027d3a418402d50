use thiserror::Error;

/// A configuration the drivetrain refuses to start with.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("integral bounds are inverted: {min} > {max}")]
    IntegralBounds { min: f64, max: f64 },
    #[error("slip table has no entries")]
    EmptySlipTable,
    #[error("slip table direction {0} lies outside [-pi, pi]")]
    SlipDirectionOutOfRange(f64),
    #[error("slip table direction {0} appears more than once")]
    DuplicateSlipDirection(f64),
    #[error("slip coefficient {0} lies outside (0, 1]")]
    SlipCoefficientOutOfRange(f64),
    #[error("wheel layout is not an X drive: {0}")]
    WheelLayout(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("device is not connected")]
    Disconnected,
    #[error("device is still calibrating")]
    Calibrating,
    #[error("device reported a fault")]
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MotionError {
    #[error("motion did not settle within {elapsed_s:.2} s")]
    TimedOut { elapsed_s: f64 },
}
