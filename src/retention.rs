//! State orchestrator: one API over both channels.
//!
//! READ PATH
//! =========
//! The URL fragment wins when it holds a defined value for the key;
//! otherwise local storage answers.
//!
//! WRITE PATH
//! ==========
//! Each key is owned by exactly one channel, decided on first use: keys
//! present in the launch fragment belong to the fragment, everything else to
//! local storage. Ownership is cached and never changes for the session, so
//! a fragment key added by hand after launch does not capture writes.
//!
//! Every key passing through [`Retention::get`] or [`Retention::set`] is
//! recorded in the keys-in-use ledger, which [`Retention::shareable_url`]
//! turns into a fragment carrying the whole session state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::channel::{Change, ChannelKind, HandlerId, LocalStorageChannel, UrlHashChannel};
use crate::config::RetentionConfig;
use crate::error::{Result, check_key};
use crate::fragment::{Fragment, split_url};
use crate::platform::{Host, Location, PlatformEvent};

pub struct Retention {
    location: Rc<dyn Location>,
    url_hash: UrlHashChannel,
    local: LocalStorageChannel,
    owners: RefCell<HashMap<String, ChannelKind>>,
    keys_in_use: RefCell<Vec<String>>,
}

impl Retention {
    pub fn new(host: Host) -> Self {
        Self::with_config(host, &RetentionConfig::default())
    }

    pub fn with_config(host: Host, config: &RetentionConfig) -> Self {
        let url_hash = UrlHashChannel::new(Rc::clone(&host.location), config);
        let local = LocalStorageChannel::new(host.storage, config);
        info!(local_storage = ?local.availability(), "retention ready");
        Self {
            location: host.location,
            url_hash,
            local,
            owners: RefCell::new(HashMap::new()),
            keys_in_use: RefCell::new(Vec::new()),
        }
    }

    pub fn url_hash(&self) -> &UrlHashChannel {
        &self.url_hash
    }

    pub fn local_storage(&self) -> &LocalStorageChannel {
        &self.local
    }

    /// The channel that owns `key`, resolving and caching it on first use.
    pub fn owner(&self, key: &str) -> ChannelKind {
        if let Some(kind) = self.owners.borrow().get(key) {
            return *kind;
        }
        let kind = if self.url_hash.was_defined_at_launch(key) {
            ChannelKind::UrlHash
        } else {
            ChannelKind::LocalStorage
        };
        debug!(%key, owner = ?kind, "key ownership resolved");
        self.owners.borrow_mut().insert(key.to_owned(), kind);
        kind
    }

    /// Keys accessed so far, in first-use order.
    pub fn keys_in_use(&self) -> Vec<String> {
        self.keys_in_use.borrow().clone()
    }

    fn track(&self, key: &str) {
        let mut keys = self.keys_in_use.borrow_mut();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_owned());
        }
    }

    /// Current value of `key`: the fragment's if defined there, else local
    /// storage's.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        check_key("Retention::get", key)?;
        self.track(key);
        if let Some(value) = self.url_hash.get(key)? {
            return Ok(Some(value));
        }
        self.local.get(key)
    }

    /// [`Retention::get`], deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => Ok(Some(codec::from_json(value)?)),
            None => Ok(None),
        }
    }

    /// Write `value` to the channel that owns `key`.
    pub fn set(&self, key: &str, value: &Value, safeguard: bool) -> Result<()> {
        check_key("Retention::set", key)?;
        self.track(key);
        match self.owner(key) {
            ChannelKind::UrlHash if self.url_hash.update(key, value, safeguard)? => Ok(()),
            _ => self.local.set(key, value, safeguard),
        }
    }

    /// [`Retention::set`] for any serializable value.
    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T, safeguard: bool) -> Result<()> {
        let json = codec::to_json(value)?;
        self.set(key, &json, safeguard)
    }

    /// Observe changes to `key`.
    ///
    /// Fragment-owned keys always register. Keys owned by local storage only
    /// register when `cross_window` is set, since their changes come from
    /// other windows and can feed back into this one; otherwise `None` is
    /// returned and nothing is registered.
    pub fn register_change_handler(
        &self,
        key: &str,
        handler: impl Fn(&Change) + 'static,
        cross_window: bool,
    ) -> Result<Option<HandlerId>> {
        check_key("Retention::register_change_handler", key)?;
        self.track(key);
        match self.owner(key) {
            ChannelKind::UrlHash => self.url_hash.register_change_handler(key, handler).map(Some),
            ChannelKind::LocalStorage if cross_window => {
                self.local.register_change_handler(key, handler).map(Some)
            }
            ChannelKind::LocalStorage => Ok(None),
        }
    }

    pub fn unregister_change_handler(&self, key: &str, id: HandlerId) -> bool {
        match id.channel() {
            ChannelKind::UrlHash => self.url_hash.unregister_change_handler(key, id),
            ChannelKind::LocalStorage => self.local.unregister_change_handler(key, id),
        }
    }

    /// The current URL with a fragment holding every key in use, so opening
    /// it elsewhere reproduces this session's state.
    ///
    /// Entries are copied as stored, keeping safeguarding intact. Keys with
    /// no value are written as the undefined sentinel.
    pub fn shareable_url(&self) -> Result<String> {
        let href = self.location.href();
        let (base, _) = split_url(&href);
        let mut fragment = Fragment::default();
        for key in self.keys_in_use() {
            let raw = match self.raw_entry(&key)? {
                Some(raw) => raw,
                None => codec::encode(None, false)?,
            };
            fragment.insert(key, raw);
        }
        if fragment.is_empty() {
            return Ok(base.to_owned());
        }
        Ok(format!("{base}#{fragment}"))
    }

    /// Stored entry that [`Retention::get`] would decode for `key`.
    fn raw_entry(&self, key: &str) -> Result<Option<String>> {
        if let Some(raw) = self.url_hash.get_raw(key) {
            if codec::decode(&raw)?.is_some() {
                return Ok(Some(raw));
            }
        }
        Ok(self.local.get_raw(key))
    }

    /// Route a host signal to the channel it concerns.
    pub fn handle_event(&self, event: &PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::HashChange => self.url_hash.handle_hash_change(),
            PlatformEvent::Storage(change) => self.local.handle_storage_event(change),
        }
    }
}

#[cfg(test)]
#[path = "retention_test.rs"]
mod tests;
