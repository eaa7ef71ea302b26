//! Reactive stores and their persistence bindings.
//!
//! [`Store`] is the capability every binding works against. [`Writable`] is
//! the default implementation; [`Normalized`] and [`PersistentStore`] are
//! decorators that own an inner store and implement [`Store`] themselves, so
//! they stack in any order:
//!
//! ```text
//! PersistentStore ─┬─ replace/transform: persist, then forward
//!                  └─ external change:   inner.replace (no persist)
//!   └─ Normalized ── replace/transform: normalize, then forward
//!        └─ Writable ── holds the value, notifies subscribers
//! ```

pub mod normalize;
pub mod persistent;
pub mod writable;

use std::rc::Rc;

pub use normalize::Normalized;
pub use persistent::{PersistentStore, SplitCodec, persistent_writable};
pub use writable::Writable;

/// A readable, writable, observable value.
pub trait Store<T> {
    /// Current value.
    fn get(&self) -> T;

    /// Call `listener` with the current value now and after every change,
    /// until the returned [`Subscription`] is dropped.
    fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription;

    /// Set a new value.
    fn replace(&self, value: T);

    /// Set a value computed from the current one.
    fn transform(&self, f: Box<dyn FnOnce(&T) -> T + '_>);
}

impl<T, S: Store<T> + ?Sized> Store<T> for Rc<S> {
    fn get(&self) -> T {
        (**self).get()
    }

    fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        (**self).subscribe(listener)
    }

    fn replace(&self, value: T) {
        (**self).replace(value);
    }

    fn transform(&self, f: Box<dyn FnOnce(&T) -> T + '_>) {
        (**self).transform(f);
    }
}

/// Guard for a store listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Keep the listener registered for the store's whole lifetime.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
