//! Host abstraction: the two devices state is retained in, and the two
//! signals the host raises when they change.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser implementation lives in [`crate::web`] (`hydrate` feature);
//! [`crate::memory`] provides an in-process stand-in that models several
//! same-origin windows. Channels only ever see these traits.
//!
//! Signals are plain values ([`PlatformEvent`]) handed to
//! [`crate::Retention::handle_event`]. The host decides when to deliver them,
//! which mirrors the browser queueing `hashchange`/`storage` between turns.

use std::rc::Rc;

/// The window's address, of which only the fragment is ever written.
pub trait Location {
    /// Full URL, including any fragment.
    fn href(&self) -> String;
    /// Fragment text without the leading `#`, empty when there is none.
    fn fragment(&self) -> String;
    /// Navigate to a new fragment (text without the leading `#`).
    fn set_fragment(&self, fragment: &str);
}

/// Failure reported by a [`StorageArea`] operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageFault {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage access denied: {0}")]
    Denied(String),
}

/// Synchronous, origin-scoped key/value storage (`window.localStorage`).
pub trait StorageArea {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageFault>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageFault>;
    fn remove_item(&self, key: &str) -> Result<(), StorageFault>;
    /// Number of stored entries.
    fn length(&self) -> Result<usize, StorageFault>;
}

/// Devices of one window. `storage` is `None` when the host has no storage
/// at all (e.g. it threw on access).
#[derive(Clone)]
pub struct Host {
    pub location: Rc<dyn Location>,
    pub storage: Option<Rc<dyn StorageArea>>,
}

/// Payload of a `storage` signal. `key` is `None` when the storage was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Signals raised by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The fragment changed, programmatically or by the user. Raised only in
    /// the window whose location changed, never on initial load.
    HashChange,
    /// Another same-origin window changed local storage. Never raised in the
    /// window that made the change.
    Storage(StorageChange),
}
