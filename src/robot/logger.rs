//! Console logger for the `log` facade.
//!
//! Every record goes to the brain's serial output with the time since the
//! logger was installed:
//!
//! ```text
//! INFO [12.345s] hurricanes_holonomic::drivetrain - moving to (0.0, 60.9) at 0.50
//! ```
use alloc::boxed::Box;

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use vexide::{prelude::*, time::Instant};

pub struct RobotLogger {
    start: Instant,
}

impl log::Log for RobotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!(
                "{} [{:.3}s] {} - {}",
                record.level(),
                self.start.elapsed().as_secs_f64(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Installs the logger. Call once, before anything logs.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = Box::leak(Box::new(RobotLogger {
        start: Instant::now(),
    }));
    log::set_logger(logger).map(|()| log::set_max_level(level))
}
