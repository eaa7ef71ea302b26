//! Local device storage channel.
//!
//! A thin wrapper over a [`StorageArea`]. Availability is probed once at
//! construction; when storage cannot be used every operation quietly becomes
//! a no-op and a single warning is logged.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{Change, ChannelKind, HandlerId, HandlerRegistry, notify};
use crate::config::RetentionConfig;
use crate::error::{Result, check_key};
use crate::platform::{StorageArea, StorageChange, StorageFault};

/// Result of the storage feature probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// The probe write hit the quota, but the storage already holds data:
    /// it works and is merely full.
    OverQuota,
    Unavailable,
}

impl Availability {
    pub fn is_usable(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Write and remove `probe_key` to find out whether `storage` works.
pub fn probe(storage: Option<&dyn StorageArea>, probe_key: &str) -> Availability {
    let Some(storage) = storage else {
        return Availability::Unavailable;
    };
    match storage
        .set_item(probe_key, probe_key)
        .and_then(|()| storage.remove_item(probe_key))
    {
        Ok(()) => Availability::Available,
        Err(StorageFault::QuotaExceeded) if storage.length().is_ok_and(|len| len > 0) => {
            Availability::OverQuota
        }
        Err(fault) => {
            debug!(%fault, "local storage probe failed");
            Availability::Unavailable
        }
    }
}

pub struct LocalStorageChannel {
    storage: Option<Rc<dyn StorageArea>>,
    availability: Availability,
    handlers: RefCell<HandlerRegistry>,
}

impl LocalStorageChannel {
    pub fn new(storage: Option<Rc<dyn StorageArea>>, config: &RetentionConfig) -> Self {
        let availability = probe(storage.as_deref(), &config.storage_probe_key);
        if !availability.is_usable() {
            warn!("local storage is unavailable; state will not be retained on this device");
        }
        Self {
            storage: storage.filter(|_| availability.is_usable()),
            availability,
            handlers: RefCell::new(HandlerRegistry::new(ChannelKind::LocalStorage)),
        }
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Decoded value for `key`; `None` when unset, empty, or unavailable.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        check_key("LocalStorageChannel::get", key)?;
        decode_entry(self.get_raw(key).as_deref())
    }

    pub(crate) fn get_raw(&self, key: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;
        match storage.get_item(key) {
            Ok(raw) => raw.filter(|raw| !raw.is_empty()),
            Err(fault) => {
                debug!(%key, %fault, "local storage read failed");
                None
            }
        }
    }

    /// Encode and store `value`. A write the storage refuses is logged and
    /// dropped.
    pub fn set(&self, key: &str, value: &Value, safeguard: bool) -> Result<()> {
        check_key("LocalStorageChannel::set", key)?;
        let raw = codec::encode(Some(value), safeguard)?;
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if let Err(fault) = storage.set_item(key, &raw) {
            warn!(%key, %fault, "local storage write dropped");
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        check_key("LocalStorageChannel::remove", key)?;
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if let Err(fault) = storage.remove_item(key) {
            warn!(%key, %fault, "local storage remove failed");
        }
        Ok(())
    }

    pub fn register_change_handler(
        &self,
        key: &str,
        handler: impl Fn(&Change) + 'static,
    ) -> Result<HandlerId> {
        check_key("LocalStorageChannel::register_change_handler", key)?;
        Ok(self.handlers.borrow_mut().register(key, Rc::new(handler)))
    }

    pub fn unregister_change_handler(&self, key: &str, id: HandlerId) -> bool {
        self.handlers.borrow_mut().unregister(key, id)
    }

    /// React to a change made by another window. Clear-all events (no key)
    /// are ignored.
    pub fn handle_storage_event(&self, change: &StorageChange) -> Result<()> {
        let Some(key) = change.key.as_deref() else {
            return Ok(());
        };
        let handlers = self.handlers.borrow().snapshot(key);
        if handlers.is_empty() {
            return Ok(());
        }
        let change = Change {
            old_value: decode_entry(change.old_value.as_deref())?,
            new_value: decode_entry(change.new_value.as_deref())?,
        };
        debug!(%key, handlers = handlers.len(), "local storage entry changed in another window");
        notify(&handlers, &change);
        Ok(())
    }
}

fn decode_entry(raw: Option<&str>) -> Result<Option<Value>> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(codec::decode(raw)?),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "local_storage_test.rs"]
mod tests;
