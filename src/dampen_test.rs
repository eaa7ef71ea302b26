use serde_json::json;

use super::*;
use crate::channel::Change;
use crate::memory::{ManualScheduler, MemoryDevice};
use crate::retention::Retention;

const DELAY: Duration = Duration::from_millis(100);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn recorder() -> (Rc<RefCell<Vec<(u128, i32)>>>, ManualScheduler, impl Fn(i32) + 'static) {
    let scheduler = ManualScheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let clock = scheduler.clone();
    (log, scheduler, move |value: i32| sink.borrow_mut().push((clock.now().as_millis(), value)))
}

#[test]
fn throttle_runs_first_call_immediately() {
    let (log, scheduler, action) = recorder();
    let throttle = Throttle::new(DELAY, Rc::new(scheduler.clone()), action);
    throttle.call(1);
    assert_eq!(*log.borrow(), vec![(0, 1)]);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn throttle_coalesces_a_burst_into_one_trailing_call() {
    let (log, scheduler, action) = recorder();
    let throttle = Throttle::new(DELAY, Rc::new(scheduler.clone()), action);

    throttle.call(1);
    scheduler.advance(ms(10));
    throttle.call(2);
    scheduler.advance(ms(10));
    throttle.call(3);
    assert!(throttle.has_pending());

    scheduler.advance(ms(200));
    assert_eq!(*log.borrow(), vec![(0, 1), (100, 3)]);
    assert!(!throttle.has_pending());
}

#[test]
fn throttle_window_restarts_after_trailing_call() {
    let (log, scheduler, action) = recorder();
    let throttle = Throttle::new(DELAY, Rc::new(scheduler.clone()), action);

    throttle.call(1);
    scheduler.advance(ms(50));
    throttle.call(2);
    scheduler.advance(ms(60));
    // The trailing call ran at 100, so 110 is still inside its window.
    throttle.call(3);
    scheduler.advance(ms(200));
    assert_eq!(*log.borrow(), vec![(0, 1), (100, 2), (200, 3)]);
}

#[test]
fn throttle_calls_spaced_beyond_delay_all_run_immediately() {
    let (log, scheduler, action) = recorder();
    let throttle = Throttle::new(DELAY, Rc::new(scheduler.clone()), action);
    for value in 0..3 {
        throttle.call(value);
        scheduler.advance(ms(150));
    }
    assert_eq!(*log.borrow(), vec![(0, 0), (150, 1), (300, 2)]);
}

#[test]
fn throttle_cancel_drops_the_trailing_call() {
    let (log, scheduler, action) = recorder();
    let throttle = Throttle::new(DELAY, Rc::new(scheduler.clone()), action);
    throttle.call(1);
    throttle.call(2);
    throttle.cancel();
    scheduler.advance(ms(500));
    assert_eq!(*log.borrow(), vec![(0, 1)]);
}

#[test]
fn debounce_runs_only_the_last_call_after_quiet_period() {
    let (log, scheduler, action) = recorder();
    let debounce = Debounce::new(DELAY, Rc::new(scheduler.clone()), action);

    debounce.call(1);
    scheduler.advance(ms(60));
    debounce.call(2);
    scheduler.advance(ms(60));
    debounce.call(3);
    scheduler.advance(ms(99));
    assert!(log.borrow().is_empty());

    scheduler.advance(ms(1));
    assert_eq!(*log.borrow(), vec![(220, 3)]);
}

#[test]
fn debounce_flush_and_cancel() {
    let (log, scheduler, action) = recorder();
    let debounce = Debounce::new(DELAY, Rc::new(scheduler.clone()), action);

    debounce.call(1);
    debounce.flush();
    assert_eq!(*log.borrow(), vec![(0, 1)]);

    debounce.call(2);
    debounce.cancel();
    assert!(!debounce.has_pending());
    scheduler.advance(ms(500));
    assert_eq!(*log.borrow(), vec![(0, 1)]);
}

#[test]
fn dropped_dampeners_ignore_their_timers() {
    let (log, scheduler, action) = recorder();
    let debounce = Debounce::new(DELAY, Rc::new(scheduler.clone()), action);
    debounce.call(1);
    drop(debounce);
    scheduler.advance(ms(500));
    assert!(log.borrow().is_empty());
}

#[test]
fn debounced_cross_window_handler_sees_only_the_final_value() {
    let device = MemoryDevice::new();
    let window_a = device.open_window("https://app.test/");
    let retention_a = Retention::new(window_a.host());
    let retention_b = Retention::new(device.open_window("https://app.test/").host());

    let scheduler = ManualScheduler::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let debounce = Debounce::new(DELAY, Rc::new(scheduler.clone()), move |change: Change| {
        sink.borrow_mut().push(change.new_value);
    });
    let handler = debounce.clone();
    retention_a
        .register_change_handler("zoom", move |change| handler.call(change.clone()), true)
        .unwrap();

    for zoom in 1..=5 {
        retention_b.set("zoom", &json!(zoom), false).unwrap();
    }
    window_a.dispatch(&retention_a).unwrap();
    assert!(seen.borrow().is_empty());

    scheduler.advance(DELAY);
    assert_eq!(*seen.borrow(), vec![Some(json!(5))]);
}
