//! Store decorator that keeps the value in canonical form.

use std::rc::Rc;

use super::{Store, Subscription};

/// Applies `normalize` to the initial value and to every value written
/// through it. Writes made directly to the inner store are not normalized.
pub struct Normalized<T, S> {
    store: S,
    normalize: Rc<dyn Fn(T) -> T>,
}

impl<T, S: Store<T>> Normalized<T, S> {
    pub fn new(store: S, normalize: impl Fn(T) -> T + 'static) -> Self {
        store.replace(normalize(store.get()));
        Self { store, normalize: Rc::new(normalize) }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

impl<T, S: Store<T>> Store<T> for Normalized<T, S> {
    fn get(&self) -> T {
        self.store.get()
    }

    fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        self.store.subscribe(listener)
    }

    fn replace(&self, value: T) {
        self.store.replace((self.normalize)(value));
    }

    fn transform(&self, f: Box<dyn FnOnce(&T) -> T + '_>) {
        let normalize = &self.normalize;
        self.store.transform(Box::new(move |current| normalize(f(current))));
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
