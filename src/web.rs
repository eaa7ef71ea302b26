//! Browser host, compiled with the `hydrate` feature.
//!
//! [`boot`] is the usual entry point: it builds a [`Retention`] over
//! `window.location` and `window.localStorage` and keeps `hashchange` /
//! `storage` listeners attached for as long as the returned [`Session`]
//! lives.

use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DomException, Storage, StorageEvent, Window};

use crate::config::RetentionConfig;
use crate::dampen::Scheduler;
use crate::platform::{Host, Location, PlatformEvent, StorageArea, StorageChange, StorageFault};
use crate::retention::Retention;

pub struct BrowserLocation {
    window: Window,
}

impl Location for BrowserLocation {
    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn fragment(&self) -> String {
        let hash = self.window.location().hash().unwrap_or_default();
        let raw = hash.strip_prefix('#').unwrap_or(&hash);
        // The browser percent-encodes characters it will not keep verbatim.
        match js_sys::decode_uri_component(raw) {
            Ok(decoded) => String::from(decoded),
            Err(_) => raw.to_owned(),
        }
    }

    fn set_fragment(&self, fragment: &str) {
        if let Err(err) = self.window.location().set_hash(fragment) {
            warn!(?err, "failed to update the URL hash");
        }
    }
}

pub struct BrowserStorage {
    storage: Storage,
}

/// Map a storage exception to a fault. Browsers disagree on how a full
/// storage is reported, so both the legacy codes and the names are checked.
fn classify(err: JsValue) -> StorageFault {
    let Some(exception) = err.dyn_ref::<DomException>() else {
        return StorageFault::Denied(format!("{err:?}"));
    };
    let quota = matches!(exception.code(), 22 | 1014)
        || matches!(exception.name().as_str(), "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED");
    if quota { StorageFault::QuotaExceeded } else { StorageFault::Denied(exception.message()) }
}

impl StorageArea for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageFault> {
        self.storage.get_item(key).map_err(classify)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        self.storage.set_item(key, value).map_err(classify)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageFault> {
        self.storage.remove_item(key).map_err(classify)
    }

    fn length(&self) -> Result<usize, StorageFault> {
        self.storage.length().map(|len| len as usize).map_err(classify)
    }
}

/// The current window's devices, or `None` outside a browser window.
/// Storage is left out when the browser refuses access to it.
pub fn browser_host() -> Option<Host> {
    let window = web_sys::window()?;
    let storage: Option<Rc<dyn StorageArea>> = match window.local_storage() {
        Ok(Some(storage)) => Some(Rc::new(BrowserStorage { storage })),
        Ok(None) => None,
        Err(err) => {
            debug!(?err, "window.localStorage threw on access");
            None
        }
    };
    Some(Host { location: Rc::new(BrowserLocation { window }), storage })
}

fn deliver(retention: &Retention, event: &PlatformEvent) {
    if let Err(err) = retention.handle_event(event) {
        error!(code = err.error_code(), %err, "failed to handle host event");
    }
}

/// Window listeners feeding host signals into a [`Retention`]. Removed on
/// drop.
pub struct EventBridge {
    window: Window,
    hash_change: Closure<dyn FnMut()>,
    storage: Closure<dyn FnMut(StorageEvent)>,
}

impl EventBridge {
    /// # Errors
    ///
    /// Fails when there is no window or a listener cannot be added.
    pub fn attach(retention: &Rc<Retention>) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;

        let weak = Rc::downgrade(retention);
        let hash_change = Closure::wrap(Box::new(move || {
            if let Some(retention) = weak.upgrade() {
                deliver(&retention, &PlatformEvent::HashChange);
            }
        }) as Box<dyn FnMut()>);

        let weak = Rc::downgrade(retention);
        let storage = Closure::wrap(Box::new(move |event: StorageEvent| {
            if let Some(retention) = weak.upgrade() {
                let change = StorageChange {
                    key: event.key(),
                    old_value: event.old_value(),
                    new_value: event.new_value(),
                };
                deliver(&retention, &PlatformEvent::Storage(change));
            }
        }) as Box<dyn FnMut(StorageEvent)>);

        window.add_event_listener_with_callback("hashchange", hash_change.as_ref().unchecked_ref())?;
        window.add_event_listener_with_callback("storage", storage.as_ref().unchecked_ref())?;
        Ok(Self { window, hash_change, storage })
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        let listeners: [(&str, &JsValue); 2] =
            [("hashchange", self.hash_change.as_ref()), ("storage", self.storage.as_ref())];
        for (event, callback) in listeners {
            if let Err(err) = self.window.remove_event_listener_with_callback(event, callback.unchecked_ref()) {
                warn!(?err, %event, "failed to remove window listener");
            }
        }
    }
}

/// Wall clock and `setTimeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
    fn now(&self) -> Duration {
        Duration::from_secs_f64(js_sys::Date::now().max(0.0) / 1000.0)
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::callback::Timeout::new(millis, task).forget();
    }
}

/// Route `log`/`tracing` output and panics to the browser console.
pub fn init_console_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(level).is_err() {
        debug!("console logger already installed");
    }
}

/// A retention wired to the browser for the lifetime of the page.
pub struct Session {
    retention: Rc<Retention>,
    _events: EventBridge,
}

impl Session {
    pub fn retention(&self) -> &Rc<Retention> {
        &self.retention
    }
}

/// # Errors
///
/// Fails outside a browser window, or when listeners cannot be attached.
pub fn boot(config: &RetentionConfig) -> Result<Session, JsValue> {
    let host = browser_host().ok_or_else(|| JsValue::from_str("keepsake requires a browser window"))?;
    let retention = Rc::new(Retention::with_config(host, config));
    let events = EventBridge::attach(&retention)?;
    Ok(Session { retention, _events: events })
}
