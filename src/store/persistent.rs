//! Bind a store to retained state.
//!
//! A [`PersistentStore`] owns the store it wraps. Writes made through the
//! binding are persisted first and then forwarded to the inner store. When
//! the inner store adjusts the value (a [`super::Normalized`] clamp, say),
//! the adjusted value is persisted too, so retained state always matches the
//! store. Changes
//! reported by the orchestrator (a fragment edit, or another window when
//! cross-window notification is on) go straight to the inner store, so they
//! are never written back.
//!
//! One store may span several retention keys. A [`SplitCodec`] then says how
//! the value splits into per-key parts (`encode`) and how one part merges
//! back into the store (`decode_and_sync`).

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{Store, Subscription, Writable};
use crate::channel::HandlerId;
use crate::config::PersistOptions;
use crate::error::{CodecError, Result, RetentionError, check_key};
use crate::retention::Retention;

type EncodeFn<T> = dyn Fn(&str, &T) -> Result<Value>;
type DecodeAndSyncFn<T> = dyn Fn(&str, Value, &dyn Store<T>) -> Result<()>;

/// Per-key conversion between a store value and retained values.
pub struct SplitCodec<T> {
    encode: Rc<EncodeFn<T>>,
    decode_and_sync: Rc<DecodeAndSyncFn<T>>,
    custom: bool,
}

impl<T> Clone for SplitCodec<T> {
    fn clone(&self) -> Self {
        Self {
            encode: Rc::clone(&self.encode),
            decode_and_sync: Rc::clone(&self.decode_and_sync),
            custom: self.custom,
        }
    }
}

impl<T> SplitCodec<T> {
    /// `encode` extracts the part of the value retained under a key;
    /// `decode_and_sync` applies a retained part back onto the store.
    pub fn new(
        encode: impl Fn(&str, &T) -> Result<Value> + 'static,
        decode_and_sync: impl Fn(&str, Value, &dyn Store<T>) -> Result<()> + 'static,
    ) -> Self {
        Self {
            encode: Rc::new(encode),
            decode_and_sync: Rc::new(decode_and_sync),
            custom: true,
        }
    }
}

impl<T: Serialize + DeserializeOwned + 'static> SplitCodec<T> {
    /// The whole value under a single key.
    pub fn whole() -> Self {
        Self {
            encode: Rc::new(encode_whole::<T>),
            decode_and_sync: Rc::new(decode_and_sync_whole::<T>),
            custom: false,
        }
    }
}

fn encode_whole<T: Serialize>(_key: &str, value: &T) -> Result<Value> {
    Ok(codec::to_json(value)?)
}

fn decode_and_sync_whole<T: DeserializeOwned>(_key: &str, value: Value, store: &dyn Store<T>) -> Result<()> {
    store.replace(codec::from_json(value)?);
    Ok(())
}

/// Apply a retained part to the store, skipping parts that no longer fit.
fn sync<T>(codec: &SplitCodec<T>, key: &str, value: Value, store: &dyn Store<T>) {
    if let Err(err) = (codec.decode_and_sync)(key, value, store) {
        warn!(%key, code = err.error_code(), %err, "retained value does not fit the store; keeping the current value");
    }
}

pub struct PersistentStore<T, S> {
    store: Rc<S>,
    retention: Rc<Retention>,
    keys: Vec<String>,
    codec: SplitCodec<T>,
    options: PersistOptions,
    handlers: Vec<(String, HandlerId)>,
}

impl<T, S> PersistentStore<T, S>
where
    T: Serialize + DeserializeOwned + 'static,
    S: Store<T> + 'static,
{
    /// Bind `store` to a single key, retaining the whole value.
    ///
    /// # Errors
    ///
    /// See [`PersistentStore::with_keys`].
    pub fn new(retention: Rc<Retention>, key: &str, store: S, options: PersistOptions) -> Result<Self> {
        Self::with_keys(retention, &[key], store, SplitCodec::whole(), options)
    }
}

impl<T, S> PersistentStore<T, S>
where
    T: 'static,
    S: Store<T> + 'static,
{
    /// Bind `store` to one or more keys.
    ///
    /// Retained values are loaded into the store, then the current value is
    /// encoded once to make sure it can be persisted at all.
    ///
    /// # Errors
    ///
    /// - [`RetentionError::ParameterViolation`] for an empty key list, an
    ///   empty key, or several keys with the default codec.
    /// - [`RetentionError::Codec`] when the value cannot be encoded.
    pub fn with_keys(
        retention: Rc<Retention>,
        keys: &[&str],
        store: S,
        codec: SplitCodec<T>,
        options: PersistOptions,
    ) -> Result<Self> {
        const FUNCTION: &str = "PersistentStore::with_keys";
        if keys.is_empty() {
            return Err(RetentionError::ParameterViolation {
                function: FUNCTION,
                message: "keys are required (at least one key)".to_owned(),
            });
        }
        for key in keys {
            check_key(FUNCTION, key)?;
        }
        if keys.len() > 1 && !codec.custom {
            return Err(RetentionError::ParameterViolation {
                function: FUNCTION,
                message: "multiple keys require a custom SplitCodec (encode and decode_and_sync)".to_owned(),
            });
        }

        let store = Rc::new(store);
        for key in keys {
            if let Some(value) = retention.get(key)? {
                sync(&codec, key, value, &*store);
            }
        }

        let current = store.get();
        for key in keys {
            let part = (codec.encode)(key, &current)?;
            codec::encode(Some(&part), options.safeguard)?;
        }

        let mut binding = Self {
            store,
            retention,
            keys: keys.iter().map(|key| (*key).to_owned()).collect(),
            codec,
            options,
            handlers: Vec::new(),
        };
        binding.register_handlers()?;
        debug!(keys = ?binding.keys, "store bound to retained state");
        Ok(binding)
    }

    fn register_handlers(&mut self) -> Result<()> {
        for key in &self.keys {
            let store = Rc::downgrade(&self.store);
            let codec = self.codec.clone();
            let handler_key = key.clone();
            let id = self.retention.register_change_handler(
                key,
                move |change| {
                    let Some(store) = store.upgrade() else {
                        return;
                    };
                    match &change.new_value {
                        Some(value) => sync(&codec, &handler_key, value.clone(), &*store),
                        None => debug!(key = %handler_key, "retained value removed; keeping the current value"),
                    }
                },
                self.options.cross_window,
            )?;
            if let Some(id) = id {
                self.handlers.push((key.clone(), id));
            }
        }
        Ok(())
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of orchestrator change handlers this binding holds.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Retain each part of `value`, skipping parts already retained as
    /// `written`. Returns the parts now retained (`None` where that failed).
    fn persist(&self, value: &T, written: &[Option<Value>]) -> Vec<Option<Value>> {
        self.keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let part = match (self.codec.encode)(key, value) {
                    Ok(part) => part,
                    Err(err) => {
                        error!(%key, code = err.error_code(), %err, "failed to encode store value");
                        return None;
                    }
                };
                if written.get(index).is_some_and(|prev| prev.as_ref() == Some(&part)) {
                    return Some(part);
                }
                match self.retention.set(key, &part, self.options.safeguard) {
                    Ok(()) => Some(part),
                    Err(err) => {
                        error!(%key, code = err.error_code(), %err, "failed to persist store value");
                        None
                    }
                }
            })
            .collect()
    }

    /// Retain the value the inner store settled on.
    fn settle(&self, written: &[Option<Value>]) {
        self.persist(&self.store.get(), written);
    }
}

impl<T, S> Store<T> for PersistentStore<T, S>
where
    T: 'static,
    S: Store<T> + 'static,
{
    fn get(&self) -> T {
        self.store.get()
    }

    fn subscribe(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        self.store.subscribe(listener)
    }

    fn replace(&self, value: T) {
        let written = self.persist(&value, &[]);
        self.store.replace(value);
        self.settle(&written);
    }

    fn transform(&self, f: Box<dyn FnOnce(&T) -> T + '_>) {
        let mut written = Vec::new();
        self.store.transform(Box::new(|current| {
            let next = f(current);
            written = self.persist(&next, &[]);
            next
        }));
        self.settle(&written);
    }
}

impl<T, S> Drop for PersistentStore<T, S> {
    fn drop(&mut self) {
        for (key, id) in &self.handlers {
            self.retention.unregister_change_handler(key, *id);
        }
    }
}

/// Create a [`Writable`] bound to `key`, starting from the retained value or
/// from `fallback` when nothing usable is retained.
///
/// # Errors
///
/// See [`PersistentStore::with_keys`].
pub fn persistent_writable<T>(
    retention: Rc<Retention>,
    key: &str,
    fallback: T,
    options: PersistOptions,
) -> Result<PersistentStore<T, Writable<T>>>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
{
    check_key("persistent_writable", key)?;
    let initial = match retention.get_as::<T>(key) {
        Ok(Some(value)) => value,
        Ok(None) => fallback,
        Err(RetentionError::Codec(CodecError::Mismatch(reason))) => {
            warn!(%key, %reason, "retained value does not fit the store; using the fallback");
            fallback
        }
        Err(err) => return Err(err),
    };
    PersistentStore::new(retention, key, Writable::new(initial), options)
}

#[cfg(test)]
#[path = "persistent_test.rs"]
mod tests;
