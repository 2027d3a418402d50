#![no_main]
#![no_std]
extern crate alloc;
use alloc::rc::Rc;
use core::{array, cell::RefCell, time::Duration};

use hurricanes_holonomic::{
    ConfigError, Drivetrain, DrivetrainConfig, Odometry,
    task::{StopHandle, run_odometry},
    utils::{hypot, units::tile},
};
use log::{LevelFilter, error, info, warn};
use vexide::{
    devices::smart::imu::{InertialError, InertialSensor},
    prelude::*,
    sync::Mutex,
    task::Task,
};

use crate::robot::{
    devices::{Imu, SharedMotor, VexClock},
    logger,
};

mod robot;

/// Front-left, front-right, rear-right, rear-left.
const DRIVE_PORTS: [u8; 4] = [1, 10, 20, 11];
const IMU_PORT: u8 = 12;
const STICK_DEADZONE: f64 = 0.05;
const DRIVER_PERIOD: Duration = Duration::from_millis(10);

type RobotDrivetrain = Drivetrain<SharedMotor, Odometry<SharedMotor, Imu>, VexClock>;

#[vexide::main]
async fn main(peripherals: Peripherals) {
    if let Err(e) = logger::init(LevelFilter::Info) {
        println!("logger already installed: {}", e);
    }
    let mut peripherals = DynamicPeripherals::new(peripherals);
    match Robot::new(&mut peripherals).await {
        Ok(robot) => robot.compete().await,
        Err(e) => error!("refusing to start with a bad drivetrain configuration: {}", e),
    }
}

pub struct Robot {
    controller: Controller,
    drivetrain: Rc<Mutex<RobotDrivetrain>>,
}

impl Robot {
    async fn new(peripherals: &mut DynamicPeripherals) -> Result<Self, ConfigError> {
        let config = DrivetrainConfig {
            motion_timeout: Some(Duration::from_secs(15)),
            ..Default::default()
        };
        config.validate()?;

        let motors: [SharedMotor; 4] = array::from_fn(|i| {
            let port = peripherals
                .take_smart_port(DRIVE_PORTS[i])
                .expect("drive motor port");
            let direction = if config.wheels[i].inverted {
                Direction::Reverse
            } else {
                Direction::Forward
            };
            SharedMotor::new(Motor::new(port, Gearset::Green, direction))
        });

        let mut imu = InertialSensor::new(peripherals.take_smart_port(IMU_PORT).expect("imu port"));
        let heading_sensor = match imu.calibrate().await {
            Ok(_) => {
                info!("IMU calibration successful");
                Some(Imu(imu))
            }
            Err(e) => {
                let msg = match e {
                    InertialError::CalibrationTimedOut => "IMU calibration timed out",
                    InertialError::Port { .. } => "IMU not detected on the configured port",
                    InertialError::BadStatus => "IMU failed to report status",
                    _ => "IMU calibration error",
                };
                warn!("{}: {:?}", msg, e);
                // without a sensor heading is held wherever it was last set
                match e {
                    InertialError::Port { .. } => None,
                    _ => Some(Imu(imu)),
                }
            }
        };

        let clock = VexClock::new();
        let odometry = Rc::new(RefCell::new(Odometry::new(
            &config,
            motors.clone(),
            heading_sensor,
        )?));
        let drivetrain = Drivetrain::new(&config, motors, Rc::clone(&odometry), clock)?;

        vexide::task::spawn(run_odometry(
            odometry,
            clock,
            config.odometry_period,
            StopHandle::new(),
        ))
        .detach();

        Ok(Self {
            controller: peripherals
                .take_primary_controller()
                .expect("primary controller"),
            drivetrain: Rc::new(Mutex::new(drivetrain)),
        })
    }
}

/// One tile square from wherever the robot stands, ending where it started.
fn diagnostic_square(origin: (f64, f64)) -> [(f64, f64); 4] {
    let (x, y) = origin;
    let side = tile(1.0);
    [(x, y + side), (x + side, y + side), (x + side, y), (x, y)]
}

impl Compete for Robot {
    async fn autonomous(&mut self) {
        let mut dt = self.drivetrain.lock().await;
        dt.reset();
        let result = async {
            dt.forward(tile(1.0), 0.6).await?;
            dt.strafe_right(tile(1.0), 0.5).await?;
            dt.turn_to_face_heading_deg(180.0, true).await?;
            let square = diagnostic_square(dt.current_position());
            dt.follow_path(&square, 0.5).await
        }
        .await;
        match result {
            Ok(status) => info!("autonomous finished: {:?}", status),
            Err(e) => warn!("autonomous stopped early: {}", e),
        }
    }

    async fn disabled(&mut self) {
        self.drivetrain.lock().await.cancel();
    }

    async fn driver(&mut self) {
        let mut last_a = false;
        let mut last_b = false;
        // dropping the handle when driver control ends cancels a running square
        let mut diagnostic: Option<Task<()>> = None;
        loop {
            let state = self.controller.state().unwrap_or_default();
            {
                let mut dt = self.drivetrain.lock().await;

                let (x, y) = (state.left_stick.x(), state.left_stick.y());
                let magnitude = hypot(x, y).min(1.0);
                let speed = if magnitude < STICK_DEADZONE { 0.0 } else { magnitude };
                let direction = libm::atan2(y, x);

                let turn = state.right_stick.x();
                let spin = if libm::fabs(turn) > STICK_DEADZONE {
                    // hold whatever heading the driver lets go at
                    let heading = dt.current_heading();
                    dt.set_target_heading_rad(heading);
                    Some(-turn)
                } else {
                    dt.update_heading_pid();
                    None
                };
                dt.move_headless(direction, speed, spin);

                let a = state.button_a.is_pressed();
                if a && !last_a {
                    dt.reset();
                }
                last_a = a;
            }

            let b = state.button_b.is_pressed();
            let idle = diagnostic.as_ref().is_none_or(|task| task.is_finished());
            if b && !last_b && idle {
                let drivetrain = Rc::clone(&self.drivetrain);
                diagnostic = Some(vexide::task::spawn(async move {
                    let mut dt = drivetrain.lock().await;
                    let square = diagnostic_square(dt.current_position());
                    if let Err(e) = dt.follow_path(&square, 0.5).await {
                        warn!("diagnostic square stopped early: {}", e);
                    }
                }));
            }
            last_b = b;

            sleep(DRIVER_PERIOD).await;
        }
    }
}
