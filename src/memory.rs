//! In-process host: one origin's storage shared by any number of windows.
//!
//! Mirrors the browser behaviors the engine depends on:
//! - a fragment change queues `HashChange` in the same window, and only when
//!   the fragment actually changed;
//! - a storage write queues `Storage` in every *other* window of the device,
//!   and only when the stored value actually changed;
//! - events are queued, never delivered synchronously with the write. Call
//!   [`MemoryWindow::dispatch`] to deliver them, like the event loop would.
//!
//! [`ManualScheduler`] is the matching virtual clock for [`crate::dampen`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::dampen::Scheduler;
use crate::error::Result;
use crate::fragment::split_url;
use crate::platform::{Host, Location, PlatformEvent, StorageArea, StorageChange, StorageFault};
use crate::retention::Retention;

type EventQueue = RefCell<VecDeque<PlatformEvent>>;

#[derive(Default)]
struct DeviceInner {
    items: BTreeMap<String, String>,
    /// Maximum total characters (keys plus values).
    quota: Option<usize>,
    denied: bool,
    windows: Vec<(u64, Weak<EventQueue>)>,
    next_window: u64,
}

impl DeviceInner {
    fn used_without(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.chars().count() + v.chars().count())
            .sum()
    }

    /// Queues of every live window except `origin`, pruning closed ones.
    fn peers(&mut self, origin: u64) -> Vec<Rc<EventQueue>> {
        self.windows.retain(|(_, queue)| queue.strong_count() > 0);
        self.windows
            .iter()
            .filter(|(id, _)| *id != origin)
            .filter_map(|(_, queue)| queue.upgrade())
            .collect()
    }
}

/// A device (browser profile) holding one origin's local storage.
#[derive(Clone, Default)]
pub struct MemoryDevice {
    inner: Rc<RefCell<DeviceInner>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total stored characters. Writes that would exceed it fail with
    /// [`StorageFault::QuotaExceeded`].
    pub fn set_quota(&self, quota: Option<usize>) {
        self.inner.borrow_mut().quota = quota;
    }

    /// Make every storage access fail, like a privacy mode that blocks storage.
    pub fn deny_access(&self, denied: bool) {
        self.inner.borrow_mut().denied = denied;
    }

    /// Raw stored entry, bypassing access checks.
    pub fn item(&self, key: &str) -> Option<String> {
        self.inner.borrow().items.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Open a window at `url`. A fragment in `url` is the launch fragment and
    /// raises no event.
    pub fn open_window(&self, url: &str) -> MemoryWindow {
        let events: Rc<EventQueue> = Rc::default();
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_window;
            inner.next_window += 1;
            inner.windows.push((id, Rc::downgrade(&events)));
            id
        };
        let (base, fragment) = split_url(url);
        let location = Rc::new(MemoryLocation {
            base: base.to_owned(),
            fragment: RefCell::new(fragment.to_owned()),
            events: Rc::clone(&events),
        });
        let storage = Rc::new(MemoryStorage { device: self.clone(), window: id });
        MemoryWindow { location, storage, events }
    }
}

/// One window of a [`MemoryDevice`].
pub struct MemoryWindow {
    location: Rc<MemoryLocation>,
    storage: Rc<MemoryStorage>,
    events: Rc<EventQueue>,
}

impl MemoryWindow {
    pub fn host(&self) -> Host {
        Host {
            location: self.location.clone(),
            storage: Some(self.storage.clone()),
        }
    }

    pub fn location(&self) -> Rc<MemoryLocation> {
        Rc::clone(&self.location)
    }

    pub fn storage(&self) -> Rc<MemoryStorage> {
        Rc::clone(&self.storage)
    }

    /// Simulate the user typing a new fragment into the address bar.
    pub fn edit_fragment(&self, fragment: &str) {
        self.location.set_fragment(fragment.strip_prefix('#').unwrap_or(fragment));
    }

    /// Number of queued, undelivered events.
    pub fn pending(&self) -> usize {
        self.events.borrow().len()
    }

    /// Deliver the events queued so far to `retention`, in order. Events
    /// raised by the handlers themselves stay queued for the next call.
    ///
    /// # Errors
    ///
    /// Stops at the first event the retention fails to handle.
    pub fn dispatch(&self, retention: &Retention) -> Result<usize> {
        let queued = self.pending();
        let mut delivered = 0;
        while delivered < queued {
            let Some(event) = self.events.borrow_mut().pop_front() else {
                break;
            };
            delivered += 1;
            retention.handle_event(&event)?;
        }
        Ok(delivered)
    }
}

pub struct MemoryLocation {
    base: String,
    fragment: RefCell<String>,
    events: Rc<EventQueue>,
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        let fragment = self.fragment.borrow();
        if fragment.is_empty() {
            self.base.clone()
        } else {
            format!("{}#{fragment}", self.base)
        }
    }

    fn fragment(&self) -> String {
        self.fragment.borrow().clone()
    }

    fn set_fragment(&self, fragment: &str) {
        if *self.fragment.borrow() == fragment {
            return;
        }
        *self.fragment.borrow_mut() = fragment.to_owned();
        self.events.borrow_mut().push_back(PlatformEvent::HashChange);
    }
}

pub struct MemoryStorage {
    device: MemoryDevice,
    window: u64,
}

impl MemoryStorage {
    fn check_access(&self) -> Result<(), StorageFault> {
        if self.device.inner.borrow().denied {
            return Err(StorageFault::Denied("the operation is insecure".to_owned()));
        }
        Ok(())
    }

    fn broadcast(&self, change: StorageChange) {
        let peers = self.device.inner.borrow_mut().peers(self.window);
        for queue in peers {
            queue.borrow_mut().push_back(PlatformEvent::Storage(change.clone()));
        }
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageFault> {
        self.check_access()?;
        Ok(self.device.item(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        self.check_access()?;
        let old_value = {
            let mut inner = self.device.inner.borrow_mut();
            if let Some(quota) = inner.quota {
                let needed = inner.used_without(key) + key.chars().count() + value.chars().count();
                if needed > quota {
                    return Err(StorageFault::QuotaExceeded);
                }
            }
            inner.items.insert(key.to_owned(), value.to_owned())
        };
        if old_value.as_deref() != Some(value) {
            self.broadcast(StorageChange {
                key: Some(key.to_owned()),
                old_value,
                new_value: Some(value.to_owned()),
            });
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageFault> {
        self.check_access()?;
        let old_value = self.device.inner.borrow_mut().items.remove(key);
        if old_value.is_some() {
            self.broadcast(StorageChange {
                key: Some(key.to_owned()),
                old_value,
                new_value: None,
            });
        }
        Ok(())
    }

    fn length(&self) -> Result<usize, StorageFault> {
        self.check_access()?;
        Ok(self.device.len())
    }
}

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    tasks: Vec<(Duration, u64, Task)>,
}

/// Virtual clock. Time only moves through [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
    next_seq: Rc<Cell<u64>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward, running due tasks in deadline order. Tasks
    /// scheduled while advancing run too if they fall inside the window.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                let next = inner
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, (due, _, _))| *due <= target)
                    .min_by_key(|(_, (due, seq, _))| (*due, *seq))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let (due, _, task) = inner.tasks.remove(index);
                        inner.now = due;
                        task
                    }
                    None => break,
                }
            };
            task();
        }
        self.inner.borrow_mut().now = target;
    }

    /// Number of tasks not yet run.
    pub fn pending(&self) -> usize {
        self.inner.borrow().tasks.len()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let mut inner = self.inner.borrow_mut();
        let due = inner.now + delay;
        inner.tasks.push((due, seq, task));
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
