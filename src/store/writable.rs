//! The default [`Store`]: a shared value with change notification.
//!
//! Cloning a `Writable` yields another handle to the same value and
//! subscribers. Subscribers run outside of any internal borrow, so they may
//! read or write the store they observe.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{Store, Subscription};

type Listener<T> = Rc<dyn Fn(&T)>;
/// Called when the first subscriber arrives; may return a callback to run
/// once the last subscriber leaves.
type StartNotifier<T> = Rc<dyn Fn(&Writable<T>) -> Option<Box<dyn FnOnce()>>>;

struct WritableInner<T> {
    value: T,
    version: u64,
    next_id: u64,
    subscribers: Vec<(u64, Listener<T>)>,
    start: Option<StartNotifier<T>>,
    stop: Option<Box<dyn FnOnce()>>,
}

pub struct Writable<T> {
    inner: Rc<RefCell<WritableInner<T>>>,
}

impl<T> Clone for Writable<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: fmt::Debug> fmt::Debug for Writable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Writable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Writable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(WritableInner {
                value,
                version: 0,
                next_id: 0,
                subscribers: Vec::new(),
                start: None,
                stop: None,
            })),
        }
    }

    /// A writable whose `start` runs when it gains its first subscriber. The
    /// callback `start` returns, if any, runs when the last one leaves.
    pub fn with_start(
        value: T,
        start: impl Fn(&Writable<T>) -> Option<Box<dyn FnOnce()>> + 'static,
    ) -> Self {
        let writable = Self::new(value);
        writable.inner.borrow_mut().start = Some(Rc::new(start));
        writable
    }

    /// Incremented once per value-changing write.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn notify(&self) {
        let (value, listeners): (T, Vec<Listener<T>>) = {
            let inner = self.inner.borrow();
            (inner.value.clone(), inner.subscribers.iter().map(|(_, l)| Rc::clone(l)).collect())
        };
        for listener in listeners {
            listener(&value);
        }
    }

    fn unsubscribe(inner: &RefCell<WritableInner<T>>, id: u64) {
        let stop = {
            let mut inner = inner.borrow_mut();
            inner.subscribers.retain(|(sid, _)| *sid != id);
            if inner.subscribers.is_empty() { inner.stop.take() } else { None }
        };
        if let Some(stop) = stop {
            stop();
        }
    }
}

impl<T: Clone + PartialEq + 'static> Store<T> for Writable<T> {
    fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        let listener: Listener<T> = Rc::from(listener);
        // `start` runs before the listener is added, so its writes notify nobody.
        let start = {
            let inner = self.inner.borrow();
            if inner.subscribers.is_empty() { inner.start.clone() } else { None }
        };
        if let Some(start) = start {
            let stop = start(self);
            self.inner.borrow_mut().stop = stop;
        }
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Rc::clone(&listener)));
            id
        };
        listener(&self.get());

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                Self::unsubscribe(&inner, id);
            }
        })
    }

    /// Writing a value equal to the current one changes nothing and notifies
    /// no one.
    fn replace(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    fn transform(&self, f: Box<dyn FnOnce(&T) -> T + '_>) {
        let current = self.get();
        self.replace(f(&current));
    }
}

#[cfg(test)]
#[path = "writable_test.rs"]
mod tests;
