//! keepsake: application state retention across reloads, windows, and
//! shared links.
//!
//! State lives in two places. The URL fragment carries state that should
//! travel with a link; local storage carries state private to the device.
//! [`Retention`] puts one key/value API over both, and
//! [`store::PersistentStore`] binds reactive stores to it.
//!
//! | Module | Role |
//! |---|---|
//! | [`codec`] | self-describing string encoding of JSON values (separate crate) |
//! | [`fragment`] | `#k=v&...` grammar and reserved-character escaping |
//! | [`channel`] | URL fragment and local storage channels |
//! | [`retention`] | precedence, key ownership, shareable URLs |
//! | [`store`] | `Store` trait, `Writable`, decorators, persistence binding |
//! | [`dampen`] | throttle / debounce for change handlers |
//! | [`platform`] | host traits the channels run against |
//! | [`memory`] | in-process host with several windows, plus a virtual clock |
//! | `web` | browser host (`hydrate` feature) |

pub mod channel;
pub mod config;
pub mod dampen;
pub mod error;
pub mod fragment;
pub mod memory;
pub mod platform;
pub mod retention;
pub mod store;
#[cfg(feature = "hydrate")]
pub mod web;

#[cfg(test)]
mod testing;

pub use codec;

pub use channel::{Change, ChannelKind, HandlerId};
pub use config::{PersistOptions, RetentionConfig};
pub use error::{CodecError, Result, RetentionError};
pub use platform::{Host, PlatformEvent};
pub use retention::Retention;
pub use store::{Normalized, PersistentStore, SplitCodec, Store, Subscription, Writable, persistent_writable};
