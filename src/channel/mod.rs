//! Storage channels: the two independent devices state is retained in.
//!
//! Both channels speak the codec's string form on the device side and
//! decoded `serde_json::Value`s on the API side, and both keep a per-key
//! registry of change handlers. Handlers are always invoked outside of any
//! internal borrow, so a handler may call back into its channel.

pub mod local_storage;
pub mod url_hash;

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

pub use local_storage::{Availability, LocalStorageChannel};
pub use url_hash::UrlHashChannel;

/// A key's value before and after a change, already decoded. `None` means
/// undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

pub type ChangeHandler = Rc<dyn Fn(&Change)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    UrlHash,
    LocalStorage,
}

/// Token returned by handler registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId {
    channel: ChannelKind,
    seq: u64,
}

impl HandlerId {
    /// The channel the handler was registered with.
    pub fn channel(self) -> ChannelKind {
        self.channel
    }
}

/// Per-key handler lists for one channel.
pub(crate) struct HandlerRegistry {
    channel: ChannelKind,
    next_seq: u64,
    handlers: HashMap<String, Vec<(u64, ChangeHandler)>>,
}

impl HandlerRegistry {
    pub(crate) fn new(channel: ChannelKind) -> Self {
        Self { channel, next_seq: 0, handlers: HashMap::new() }
    }

    pub(crate) fn register(&mut self, key: &str, handler: ChangeHandler) -> HandlerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.handlers.entry(key.to_owned()).or_default().push((seq, handler));
        HandlerId { channel: self.channel, seq }
    }

    pub(crate) fn unregister(&mut self, key: &str, id: HandlerId) -> bool {
        if id.channel != self.channel {
            return false;
        }
        let Some(list) = self.handlers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(seq, _)| *seq != id.seq);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(key);
        }
        removed
    }

    /// Handlers for `key` in registration order, cloned so the caller can
    /// release the registry before invoking them.
    pub(crate) fn snapshot(&self, key: &str) -> Vec<ChangeHandler> {
        self.handlers
            .get(key)
            .map(|list| list.iter().map(|(_, handler)| Rc::clone(handler)).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, key: &str) -> usize {
        self.handlers.get(key).map_or(0, Vec::len)
    }
}

pub(crate) fn notify(handlers: &[ChangeHandler], change: &Change) {
    for handler in handlers {
        handler(change);
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
