use alloc::vec::Vec;
use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use log::{debug, info, warn};

use crate::{
    config::DrivetrainConfig,
    error::ConfigError,
    hardware::{HeadingSensor, WheelEncoder},
    utils::{hypot, interpolate, wrap_angle},
};

/// Field position in centimeters and heading in radians, counter-clockwise
/// positive. Heading accumulates and is never wrapped.
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, heading: 0.0 }
    }
    pub fn with_heading(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        hypot(x - self.x, y - self.y)
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct WheelSample {
    pub last_turns: f64,
    pub delta_cm: f64,
}

/// Measured fraction of commanded travel that actually happens, by direction
/// of travel in the robot frame.
///
/// Directions are sorted radians in `[-pi, pi]`; lookups between two keys
/// interpolate linearly and lookups past either end wrap around to the other.
#[derive(Clone, Debug, PartialEq)]
pub struct SlipTable {
    entries: Vec<(f64, f64)>,
}

impl SlipTable {
    pub fn new(entries: &[(f64, f64)]) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptySlipTable);
        }
        let mut sorted = entries.to_vec();
        for &(direction, scalar) in &sorted {
            if !(-PI..=PI).contains(&direction) {
                return Err(ConfigError::SlipDirectionOutOfRange(direction));
            }
            if !(scalar > 0.0 && scalar <= 1.0) {
                return Err(ConfigError::SlipCoefficientOutOfRange(scalar));
            }
        }
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ConfigError::DuplicateSlipDirection(pair[0].0));
            }
        }
        Ok(Self { entries: sorted })
    }

    /// A table that leaves every direction unscaled.
    pub fn uniform() -> Self {
        Self {
            entries: alloc::vec![(0.0, 1.0)],
        }
    }

    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    pub fn scalar(&self, direction: f64) -> f64 {
        let entries = &self.entries;
        let (first, last) = (entries[0], entries[entries.len() - 1]);
        if entries.len() == 1 {
            return first.1;
        }

        match entries.iter().position(|&(key, _)| key >= direction) {
            Some(i) if entries[i].0 == direction => entries[i].1,
            // before the first key, wrap back to the last one
            Some(0) => interpolate(last.0 - TAU, first.0, last.1, first.1, direction),
            Some(i) => {
                let (lo, hi) = (entries[i - 1], entries[i]);
                interpolate(lo.0, hi.0, lo.1, hi.1, direction)
            }
            None => interpolate(last.0, first.0 + TAU, last.1, first.1, direction),
        }
    }
}

impl Default for SlipTable {
    /// Strafing loses the most travel, driving straight the least.
    fn default() -> Self {
        Self {
            entries: alloc::vec![
                (-PI, 0.7071),
                (-3.0 * FRAC_PI_4, 0.9239),
                (-FRAC_PI_2, 1.0),
                (-FRAC_PI_4, 0.9239),
                (0.0, 0.7071),
                (FRAC_PI_4, 0.9239),
                (FRAC_PI_2, 1.0),
                (3.0 * FRAC_PI_4, 0.9239),
                (PI, 0.7071),
            ],
        }
    }
}

/// Anything the drivetrain can ask where the robot is.
pub trait PoseEstimator {
    fn pose(&self) -> Pose;
    fn set_position(&mut self, x: f64, y: f64);
    fn set_heading(&mut self, heading: f64);
    fn reset(&mut self);
}

/// Dead reckoning for an X-drive from four drive encoders and an optional
/// heading sensor.
///
/// Each diagonal pair of wheels shares a mount angle and spins in opposite
/// senses when the robot rotates, so averaging a pair cancels rotation and
/// leaves the projection of the robot's travel onto that pair's axis.
pub struct Odometry<E, H> {
    encoders: [E; 4],
    heading_sensor: Option<H>,
    pose: Pose,
    wheels: [WheelSample; 4],
    wheel_circumference: f64,
    ticks_per_rotation: f64,
    /// Angle from the robot's x axis to the first diagonal's drive axis.
    rotation_offset: f64,
    slip_table: SlipTable,
    auto_update: bool,
}

impl<E: WheelEncoder, H: HeadingSensor> Odometry<E, H> {
    pub fn new(
        config: &DrivetrainConfig,
        encoders: [E; 4],
        heading_sensor: Option<H>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut odometry = Self {
            encoders,
            heading_sensor,
            pose: Pose::default(),
            wheels: [WheelSample::default(); 4],
            wheel_circumference: config.wheel_circumference_cm,
            ticks_per_rotation: config.encoder_ticks_per_rotation,
            rotation_offset: config.wheels[0].mount_angle,
            slip_table: config.slip_table.clone(),
            auto_update: true,
        };
        odometry.reset();
        Ok(odometry)
    }

    /// Stores the latest cumulative wheel positions, in wheel turns.
    pub fn update_displacements(&mut self, turns: [f64; 4]) {
        for (wheel, turns) in self.wheels.iter_mut().zip(turns) {
            wheel.delta_cm = (turns - wheel.last_turns) * self.wheel_circumference;
            wheel.last_turns = turns;
        }
    }

    /// Folds the stored wheel deltas into the pose.
    ///
    /// `heading` is the sensor heading in radians, counter-clockwise positive.
    /// `None` keeps whatever heading the pose already has. Travel is rotated
    /// into the field frame by the heading after this update.
    pub fn update_state(&mut self, heading: Option<f64>) {
        if let Some(heading) = heading {
            self.pose.heading = heading;
        }

        let [d1, d2, d3, d4] = self.wheels.map(|w| w.delta_cm);
        let along_a = (d1 + d3) / 2.0;
        let along_b = (d2 + d4) / 2.0;

        let (sin_o, cos_o) = libm::sincos(self.rotation_offset);
        let mut dx = along_a * cos_o - along_b * sin_o;
        let mut dy = along_a * sin_o + along_b * cos_o;

        if dx != 0.0 || dy != 0.0 {
            let scalar = self.slip_table.scalar(libm::atan2(dy, dx));
            dx *= scalar;
            dy *= scalar;
        }

        let (sin_h, cos_h) = libm::sincos(self.pose.heading);
        self.pose.x += dx * cos_h - dy * sin_h;
        self.pose.y += dx * sin_h + dy * cos_h;
    }

    fn read_heading(&self) -> Option<f64> {
        let sensor = self.heading_sensor.as_ref()?;
        if sensor.is_calibrating() {
            return None;
        }
        match sensor.rotation() {
            // sensor reads clockwise positive
            Ok(degrees) => Some(-degrees.to_radians()),
            Err(e) => {
                debug!("heading sensor read failed: {}", e);
                None
            }
        }
    }

    fn read_turns(&self) -> [f64; 4] {
        let mut turns = [0.0; 4];
        for (i, encoder) in self.encoders.iter().enumerate() {
            turns[i] = match encoder.position() {
                Ok(ticks) => ticks / self.ticks_per_rotation,
                // a missed reading counts as no travel
                Err(e) => {
                    debug!("wheel {} encoder read failed: {}", i + 1, e);
                    self.wheels[i].last_turns
                }
            };
        }
        turns
    }

    /// One pass of the background loop: sample every device and integrate.
    pub fn tick(&mut self) {
        let turns = self.read_turns();
        self.update_displacements(turns);
        if self.auto_update {
            let heading = self.read_heading();
            self.update_state(heading);
        }
    }

    /// While paused, ticks keep the wheel baseline current without moving the pose.
    pub fn set_auto_update(&mut self, enabled: bool) {
        self.auto_update = enabled;
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn heading_deg(&self) -> f64 {
        self.pose.heading.to_degrees()
    }

    /// Heading wrapped into `[0, 2pi)`.
    pub fn wrapped_heading(&self) -> f64 {
        wrap_angle(self.pose.heading)
    }

    pub fn wheels(&self) -> &[WheelSample; 4] {
        &self.wheels
    }

    pub fn has_heading_sensor(&self) -> bool {
        self.heading_sensor.is_some()
    }
}

impl<E: WheelEncoder, H: HeadingSensor> PoseEstimator for Odometry<E, H> {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_position(&mut self, x: f64, y: f64) {
        self.pose.x = x;
        self.pose.y = y;
    }

    fn set_heading(&mut self, heading: f64) {
        self.pose.heading = heading;
        if let Some(sensor) = self.heading_sensor.as_mut()
            && let Err(e) = sensor.set_rotation(-heading.to_degrees())
        {
            warn!("could not set heading sensor rotation: {}", e);
        }
    }

    /// Zeroes the pose and re-baselines the wheels at their current positions.
    fn reset(&mut self) {
        self.pose = Pose::default();
        if let Some(sensor) = self.heading_sensor.as_mut()
            && let Err(e) = sensor.set_rotation(0.0)
        {
            warn!("could not zero heading sensor: {}", e);
        }
        let turns = self.read_turns();
        for (wheel, turns) in self.wheels.iter_mut().zip(turns) {
            wheel.last_turns = turns;
            wheel.delta_cm = 0.0;
        }
        info!("odometry reset");
    }
}
