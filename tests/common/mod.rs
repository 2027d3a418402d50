//! A simulated X-drive: ideal motors, no slip, perfect sensors.
#![allow(dead_code)]

use std::{
    cell::RefCell,
    future::{Future, poll_fn},
    rc::Rc,
    task::Poll,
    time::Duration,
};

use embassy_futures::{
    block_on,
    join::join,
    select::{Either, select},
};
use hurricanes_holonomic::{
    Drivetrain, DrivetrainConfig, Odometry, SlipTable,
    error::DeviceError,
    hardware::{Clock, DriveMotor, HeadingSensor, StoppingMode, WheelEncoder},
    task::{StopHandle, run_odometry},
};

/// Wheel distance from the centre of rotation.
pub const TRACK_RADIUS_CM: f64 = 20.0;
const STEP_S: f64 = 0.001;
const GIVE_UP_S: f64 = 120.0;

#[derive(Default)]
struct Body {
    time: f64,
    x: f64,
    y: f64,
    theta: f64,
    percent: [f64; 4],
    travel_cm: [f64; 4],
    imu_offset_deg: f64,
    modes: [Option<StoppingMode>; 4],
}

pub struct SimRobot {
    config: DrivetrainConfig,
    body: RefCell<Body>,
}

impl SimRobot {
    pub fn now(&self) -> f64 {
        self.body.borrow().time
    }

    /// Ground truth `(x, y, heading)`.
    pub fn pose(&self) -> (f64, f64, f64) {
        let body = self.body.borrow();
        (body.x, body.y, body.theta)
    }

    pub fn stopping_modes(&self) -> [Option<StoppingMode>; 4] {
        self.body.borrow().modes
    }

    fn step(&self, dt: f64) {
        let mut body = self.body.borrow_mut();
        let wheels = self.config.wheels;
        let speed = body.percent.map(|p| p / 100.0 * self.config.max_speed_cm_per_s);

        // pair averages cancel spin and leave travel along each diagonal
        let along_a = (speed[0] + speed[2]) / 2.0;
        let along_b = (speed[1] + speed[3]) / 2.0;
        let spin: f64 = speed
            .iter()
            .zip(wheels)
            .map(|(v, w)| v * w.spin_sign())
            .sum::<f64>()
            / 4.0;
        let omega = spin / TRACK_RADIUS_CM;

        let (sin_a, cos_a) = wheels[0].mount_angle.sin_cos();
        let (sin_b, cos_b) = wheels[1].mount_angle.sin_cos();
        let vx = along_a * cos_a + along_b * cos_b;
        let vy = along_a * sin_a + along_b * sin_b;

        for (i, wheel) in wheels.iter().enumerate() {
            let (s, c) = wheel.mount_angle.sin_cos();
            let surface = vx * c + vy * s + wheel.spin_sign() * spin;
            body.travel_cm[i] += surface * dt;
        }

        let mid = body.theta + omega * dt / 2.0;
        body.x += (vx * mid.cos() - vy * mid.sin()) * dt;
        body.y += (vx * mid.sin() + vy * mid.cos()) * dt;
        body.theta += omega * dt;
        body.time += dt;
    }
}

pub struct SimMotor {
    robot: Rc<SimRobot>,
    index: usize,
}

impl DriveMotor for SimMotor {
    fn set_velocity(&mut self, percent: f64) -> Result<(), DeviceError> {
        self.robot.body.borrow_mut().percent[self.index] = percent.clamp(-100.0, 100.0);
        Ok(())
    }

    fn set_stopping_mode(&mut self, mode: StoppingMode) -> Result<(), DeviceError> {
        self.robot.body.borrow_mut().modes[self.index] = Some(mode);
        Ok(())
    }
}

pub struct SimEncoder {
    robot: Rc<SimRobot>,
    index: usize,
}

impl WheelEncoder for SimEncoder {
    fn position(&self) -> Result<f64, DeviceError> {
        let travel = self.robot.body.borrow().travel_cm[self.index];
        Ok(travel / self.robot.config.wheel_circumference_cm * self.robot.config.encoder_ticks_per_rotation)
    }
}

pub struct SimImu {
    robot: Rc<SimRobot>,
}

impl HeadingSensor for SimImu {
    fn rotation(&self) -> Result<f64, DeviceError> {
        let body = self.robot.body.borrow();
        Ok(body.imu_offset_deg - body.theta.to_degrees())
    }

    fn set_rotation(&mut self, degrees: f64) -> Result<(), DeviceError> {
        let mut body = self.robot.body.borrow_mut();
        body.imu_offset_deg = degrees + body.theta.to_degrees();
        Ok(())
    }

    fn is_calibrating(&self) -> bool {
        false
    }
}

#[derive(Clone)]
pub struct SimClock {
    robot: Rc<SimRobot>,
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        self.robot.now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        let robot = Rc::clone(&self.robot);
        let deadline = robot.now() + duration.as_secs_f64();
        poll_fn(move |_| {
            if robot.now() + 1e-9 >= deadline {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}

pub type SimOdometry = Odometry<SimEncoder, SimImu>;
pub type SimDrivetrain = Drivetrain<SimMotor, SimOdometry, SimClock>;

pub struct Sim {
    pub robot: Rc<SimRobot>,
    pub odometry: Rc<RefCell<SimOdometry>>,
    config: DrivetrainConfig,
}

pub fn sim_config() -> DrivetrainConfig {
    DrivetrainConfig {
        slip_table: SlipTable::uniform(),
        ..Default::default()
    }
}

impl Sim {
    pub fn new(config: DrivetrainConfig) -> (Self, SimDrivetrain) {
        let robot = Rc::new(SimRobot {
            config: config.clone(),
            body: RefCell::new(Body::default()),
        });
        let encoders = [0, 1, 2, 3].map(|index| SimEncoder {
            robot: Rc::clone(&robot),
            index,
        });
        let imu = SimImu {
            robot: Rc::clone(&robot),
        };
        let odometry = Rc::new(RefCell::new(
            Odometry::new(&config, encoders, Some(imu)).unwrap(),
        ));
        let motors = [0, 1, 2, 3].map(|index| SimMotor {
            robot: Rc::clone(&robot),
            index,
        });
        let drivetrain = Drivetrain::new(&config, motors, Rc::clone(&odometry), self_clock(&robot)).unwrap();
        (
            Self {
                robot,
                odometry,
                config,
            },
            drivetrain,
        )
    }

    pub fn clock(&self) -> SimClock {
        self_clock(&self.robot)
    }

    /// Drives `fut` to completion while odometry and physics run alongside it.
    pub fn run<F: Future>(&self, fut: F) -> F::Output {
        let stop = StopHandle::new();
        let odometry = run_odometry(
            Rc::clone(&self.odometry),
            self.clock(),
            self.config.odometry_period,
            stop,
        );
        let robot = Rc::clone(&self.robot);
        let physics = poll_fn(move |_| {
            robot.step(STEP_S);
            assert!(robot.now() < GIVE_UP_S, "simulation ran away");
            Poll::<()>::Pending
        });
        block_on(async {
            match select(fut, join(odometry, physics)).await {
                Either::First(output) => output,
                Either::Second(_) => panic!("simulation ended before the motion did"),
            }
        })
    }
}

fn self_clock(robot: &Rc<SimRobot>) -> SimClock {
    SimClock {
        robot: Rc::clone(robot),
    }
}

/// Difference between two headings, folded into `(-pi, pi]`.
pub fn heading_error(a: f64, b: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let d = (a - b).rem_euclid(tau);
    if d > std::f64::consts::PI { d - tau } else { d }
}
