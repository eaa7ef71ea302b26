//! URL fragment channel.
//!
//! The fragment is the source of truth: it is re-parsed on every access, so
//! user edits in the address bar are visible immediately. Writes rewrite the
//! whole fragment in one step, keeping the existing key order.
//!
//! Two snapshots are kept:
//! - the *launch* key set, fixed at construction, which decides what
//!   [`UrlHashChannel::update`] may write;
//! - the *previous* fragment, which [`UrlHashChannel::handle_hash_change`]
//!   diffs against to find changed keys.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{Change, ChannelKind, HandlerId, HandlerRegistry, notify};
use crate::config::RetentionConfig;
use crate::error::{Result, check_key};
use crate::fragment::Fragment;
use crate::platform::Location;

pub struct UrlHashChannel {
    location: Rc<dyn Location>,
    placeholder: String,
    launch_keys: HashSet<String>,
    previous: RefCell<Fragment>,
    handlers: RefCell<HandlerRegistry>,
}

impl UrlHashChannel {
    pub fn new(location: Rc<dyn Location>, config: &RetentionConfig) -> Self {
        let launch = Fragment::parse(&location.fragment(), &config.missing_value_placeholder);
        let launch_keys: HashSet<String> = launch.keys().map(str::to_owned).collect();
        debug!(keys = launch_keys.len(), "URL hash snapshot taken");
        Self {
            location,
            placeholder: config.missing_value_placeholder.clone(),
            launch_keys,
            previous: RefCell::new(launch),
            handlers: RefCell::new(HandlerRegistry::new(ChannelKind::UrlHash)),
        }
    }

    fn current(&self) -> Fragment {
        Fragment::parse(&self.location.fragment(), &self.placeholder)
    }

    /// Whether `key` is present in the fragment right now.
    pub fn is_defined(&self, key: &str) -> Result<bool> {
        check_key("UrlHashChannel::is_defined", key)?;
        Ok(self.current().contains_key(key))
    }

    /// Whether `key` was present when the channel was constructed.
    pub fn was_defined_at_launch(&self, key: &str) -> bool {
        self.launch_keys.contains(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        check_key("UrlHashChannel::get", key)?;
        match self.get_raw(key) {
            Some(raw) => Ok(codec::decode(&raw)?),
            None => Ok(None),
        }
    }

    /// Unescaped but still encoded entry for `key`.
    pub(crate) fn get_raw(&self, key: &str) -> Option<String> {
        self.current().get(key).map(str::to_owned)
    }

    /// Write `key` unconditionally and navigate to the new fragment.
    pub fn set(&self, key: &str, value: &Value, safeguard: bool) -> Result<()> {
        check_key("UrlHashChannel::set", key)?;
        let raw = codec::encode(Some(value), safeguard)?;
        let mut fragment = self.current();
        fragment.insert(key, raw);
        self.location.set_fragment(&fragment.to_string());
        Ok(())
    }

    /// Write `key` only if it was present at launch. Returns whether the
    /// write happened.
    pub fn update(&self, key: &str, value: &Value, safeguard: bool) -> Result<bool> {
        check_key("UrlHashChannel::update", key)?;
        if !self.was_defined_at_launch(key) {
            return Ok(false);
        }
        self.set(key, value, safeguard)?;
        Ok(true)
    }

    pub fn register_change_handler(
        &self,
        key: &str,
        handler: impl Fn(&Change) + 'static,
    ) -> Result<HandlerId> {
        check_key("UrlHashChannel::register_change_handler", key)?;
        Ok(self.handlers.borrow_mut().register(key, Rc::new(handler)))
    }

    pub fn unregister_change_handler(&self, key: &str, id: HandlerId) -> bool {
        self.handlers.borrow_mut().unregister(key, id)
    }

    /// React to a fragment change: report every present key whose entry
    /// differs from the previous fragment. Removed keys are not reported.
    ///
    /// A changed entry that cannot be decoded is logged and skipped; the
    /// remaining keys are still reported.
    ///
    /// # Errors
    ///
    /// Currently never fails.
    pub fn handle_hash_change(&self) -> Result<()> {
        let current = self.current();
        let changed: Vec<(String, Option<String>, String)> = {
            let previous = self.previous.borrow();
            current
                .iter()
                .filter(|(key, raw)| previous.get(key) != Some(*raw))
                .map(|(key, raw)| (key.to_owned(), previous.get(key).map(str::to_owned), raw.to_owned()))
                .collect()
        };
        *self.previous.borrow_mut() = current;

        for (key, old_raw, new_raw) in changed {
            let handlers = self.handlers.borrow().snapshot(&key);
            if handlers.is_empty() {
                continue;
            }
            let change = match decode_change(old_raw.as_deref(), &new_raw) {
                Ok(change) => change,
                Err(err) => {
                    warn!(%key, %err, "changed URL hash entry cannot be decoded; skipping it");
                    continue;
                }
            };
            debug!(%key, handlers = handlers.len(), "URL hash entry changed");
            notify(&handlers, &change);
        }
        Ok(())
    }
}

fn decode_change(old_raw: Option<&str>, new_raw: &str) -> Result<Change> {
    let old_value = match old_raw {
        Some(raw) => codec::decode(raw)?,
        None => None,
    };
    Ok(Change { old_value, new_value: codec::decode(new_raw)? })
}

#[cfg(test)]
#[path = "url_hash_test.rs"]
mod tests;
