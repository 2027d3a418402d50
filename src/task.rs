//! Fixed-period background loops.
use alloc::rc::Rc;
use core::{
    cell::{Cell, RefCell},
    time::Duration,
};

use log::info;

use crate::{
    hardware::{Clock, HeadingSensor, WheelEncoder},
    odometry::Odometry,
};

/// Shared flag that asks a periodic loop to return.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.get()
    }
}

/// Runs `body` once per `period` until `stop` is raised.
///
/// Wakeups are scheduled against absolute deadlines so a slow iteration does
/// not push every later one back. If the loop falls a whole period behind it
/// starts counting again from now instead of firing a burst to catch up.
pub async fn run_periodic<C: Clock>(
    clock: &C,
    period: Duration,
    stop: &StopHandle,
    mut body: impl FnMut(),
) {
    let period_s = period.as_secs_f64();
    let mut deadline = clock.now();
    while !stop.is_stopped() {
        body();
        deadline += period_s;
        let now = clock.now();
        if deadline > now {
            clock.sleep(Duration::from_secs_f64(deadline - now)).await;
        } else {
            deadline = now;
            clock.sleep(Duration::ZERO).await;
        }
    }
}

/// Keeps `odometry` integrating every `period` until `stop` is raised.
///
/// The odometry borrow is released before every sleep, so other tasks can
/// read the pose between ticks.
pub async fn run_odometry<E, H, C>(
    odometry: Rc<RefCell<Odometry<E, H>>>,
    clock: C,
    period: Duration,
    stop: StopHandle,
) where
    E: WheelEncoder,
    H: HeadingSensor,
    C: Clock,
{
    info!("odometry loop started, period {:?}", period);
    run_periodic(&clock, period, &stop, || odometry.borrow_mut().tick()).await;
    info!("odometry loop stopped");
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::{
        future::Future,
        pin::pin,
        task::{Context, Poll, Waker},
    };

    use super::*;

    /// A clock whose sleeps complete instantly and move time forward.
    struct SteppingClock {
        now: Cell<f64>,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> f64 {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
            self.now.set(self.now.get() + duration.as_secs_f64());
            core::future::ready(())
        }
    }

    fn poll_to_end(fut: impl Future<Output = ()>) {
        let mut fut = pin!(fut);
        let mut cx = Context::from_waker(Waker::noop());
        while fut.as_mut().poll(&mut cx).is_pending() {}
    }

    #[test]
    fn test_periodic_loop_stops_on_request() {
        let clock = SteppingClock { now: Cell::new(0.0) };
        let stop = StopHandle::new();
        let mut runs = 0;
        poll_to_end(run_periodic(&clock, Duration::from_millis(5), &stop, || {
            runs += 1;
            if runs == 10 {
                stop.stop();
            }
        }));
        assert_eq!(runs, 10);
        assert!(stop.is_stopped());
        assert!(libm::fabs(clock.now() - 0.05) < 1e-9);
    }

    #[test]
    fn test_stopped_handle_never_runs_body() {
        let clock = SteppingClock { now: Cell::new(0.0) };
        let stop = StopHandle::new();
        stop.clone().stop();
        let mut runs = 0;
        poll_to_end(run_periodic(&clock, Duration::from_millis(5), &stop, || runs += 1));
        assert_eq!(runs, 0);
    }
}
