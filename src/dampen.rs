//! Rate limiting for change handlers.
//!
//! Cross-window notifications can arrive in bursts (another window dragging
//! a slider, say). Wrap the reaction in a [`Throttle`] or [`Debounce`] to keep
//! the work bounded.
//!
//! - [`Throttle`]: the first call in a quiet period runs at once; later calls
//!   inside `delay` collapse into one trailing run with the latest arguments.
//! - [`Debounce`]: every call restarts the quiet period; only the last
//!   arguments run, `delay` after the last call.
//!
//! Timers are never cancelled. A pending run is invalidated by bumping a
//! generation counter, and the stale timer does nothing when it fires.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;

/// Clock and one-shot timers.
pub trait Scheduler {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
    /// Run `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

struct Shared<A, S> {
    delay: Duration,
    scheduler: Rc<dyn Scheduler>,
    action: Rc<dyn Fn(A)>,
    state: RefCell<S>,
}

struct ThrottleState<A> {
    last_run: Option<Duration>,
    pending: Option<A>,
    trailing_scheduled: bool,
    generation: u64,
}

/// Leading and trailing edge throttle.
pub struct Throttle<A> {
    shared: Rc<Shared<A, ThrottleState<A>>>,
}

impl<A> Clone for Throttle<A> {
    fn clone(&self) -> Self {
        Self { shared: Rc::clone(&self.shared) }
    }
}

impl<A: 'static> Throttle<A> {
    pub fn new(delay: Duration, scheduler: Rc<dyn Scheduler>, action: impl Fn(A) + 'static) -> Self {
        Self {
            shared: Rc::new(Shared {
                delay,
                scheduler,
                action: Rc::new(action),
                state: RefCell::new(ThrottleState {
                    last_run: None,
                    pending: None,
                    trailing_scheduled: false,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn call(&self, args: A) {
        let shared = &self.shared;
        let now = shared.scheduler.now();
        let (run_now, deferred) = {
            let mut state = shared.state.borrow_mut();
            state.pending = Some(args);
            if state.trailing_scheduled {
                return;
            }
            let elapsed = state.last_run.map(|last| now.saturating_sub(last));
            match elapsed {
                Some(elapsed) if elapsed < shared.delay => {
                    state.trailing_scheduled = true;
                    (None, Some((shared.delay - elapsed, state.generation)))
                }
                _ => {
                    state.last_run = Some(now);
                    (state.pending.take(), None)
                }
            }
        };
        if let Some(args) = run_now {
            (shared.action)(args);
        }
        if let Some((wait, generation)) = deferred {
            trace!(?wait, "throttled call deferred to trailing edge");
            let weak = Rc::downgrade(shared);
            shared.scheduler.schedule(wait, Box::new(move || Self::run_trailing(&weak, generation)));
        }
    }

    fn run_trailing(shared: &Weak<Shared<A, ThrottleState<A>>>, generation: u64) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let args = {
            let mut state = shared.state.borrow_mut();
            if state.generation != generation {
                return;
            }
            state.trailing_scheduled = false;
            let args = state.pending.take();
            if args.is_some() {
                state.last_run = Some(shared.scheduler.now());
            }
            args
        };
        if let Some(args) = args {
            (shared.action)(args);
        }
    }

    /// Drop the pending trailing call, if any.
    pub fn cancel(&self) {
        let mut state = self.shared.state.borrow_mut();
        state.generation += 1;
        state.pending = None;
        state.trailing_scheduled = false;
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.borrow().pending.is_some()
    }
}

struct DebounceState<A> {
    pending: Option<A>,
    generation: u64,
}

/// Trailing edge debounce.
pub struct Debounce<A> {
    shared: Rc<Shared<A, DebounceState<A>>>,
}

impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self { shared: Rc::clone(&self.shared) }
    }
}

impl<A: 'static> Debounce<A> {
    pub fn new(delay: Duration, scheduler: Rc<dyn Scheduler>, action: impl Fn(A) + 'static) -> Self {
        Self {
            shared: Rc::new(Shared {
                delay,
                scheduler,
                action: Rc::new(action),
                state: RefCell::new(DebounceState { pending: None, generation: 0 }),
            }),
        }
    }

    pub fn call(&self, args: A) {
        let generation = {
            let mut state = self.shared.state.borrow_mut();
            state.generation += 1;
            state.pending = Some(args);
            state.generation
        };
        let weak = Rc::downgrade(&self.shared);
        self.shared
            .scheduler
            .schedule(self.shared.delay, Box::new(move || Self::run(&weak, generation)));
    }

    fn run(shared: &Weak<Shared<A, DebounceState<A>>>, generation: u64) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let args = {
            let mut state = shared.state.borrow_mut();
            if state.generation != generation {
                return;
            }
            state.pending.take()
        };
        if let Some(args) = args {
            (shared.action)(args);
        }
    }

    /// Run the pending call now instead of waiting.
    pub fn flush(&self) {
        let args = {
            let mut state = self.shared.state.borrow_mut();
            state.generation += 1;
            state.pending.take()
        };
        if let Some(args) = args {
            (self.shared.action)(args);
        }
    }

    pub fn cancel(&self) {
        let mut state = self.shared.state.borrow_mut();
        state.generation += 1;
        state.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.borrow().pending.is_some()
    }
}

#[cfg(test)]
#[path = "dampen_test.rs"]
mod tests;
