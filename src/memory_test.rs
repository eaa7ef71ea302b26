use super::*;

const URL: &str = "https://app.test/board";

#[test]
fn launch_fragment_raises_no_event() {
    let device = MemoryDevice::new();
    let window = device.open_window("https://app.test/board#theme=Teal-light");
    assert_eq!(window.location().fragment(), "theme=Teal-light");
    assert_eq!(window.location().href(), "https://app.test/board#theme=Teal-light");
    assert_eq!(window.pending(), 0);
}

#[test]
fn fragment_change_queues_one_event_in_the_same_window_only() {
    let device = MemoryDevice::new();
    let a = device.open_window(URL);
    let b = device.open_window(URL);

    a.location().set_fragment("k=1");
    a.location().set_fragment("k=1");
    assert_eq!(a.pending(), 1);
    assert_eq!(b.pending(), 0);

    a.edit_fragment("#k=2");
    assert_eq!(a.location().fragment(), "k=2");
    assert_eq!(a.pending(), 2);
}

#[test]
fn storage_write_notifies_other_windows_only_on_change() {
    let device = MemoryDevice::new();
    let a = device.open_window(URL);
    let b = device.open_window(URL);
    let c = device.open_window(URL);

    a.storage().set_item("sidebar", "open").unwrap();
    a.storage().set_item("sidebar", "open").unwrap();
    assert_eq!(a.pending(), 0);
    assert_eq!(b.pending(), 1);
    assert_eq!(c.pending(), 1);

    b.storage().remove_item("sidebar").unwrap();
    b.storage().remove_item("sidebar").unwrap();
    assert_eq!(a.pending(), 1);
    assert_eq!(b.pending(), 1);
    assert_eq!(c.pending(), 2);
    assert_eq!(device.item("sidebar"), None);
}

#[test]
fn storage_event_carries_old_and_new_values() {
    let device = MemoryDevice::new();
    let a = device.open_window(URL);
    let b = device.open_window(URL);
    a.storage().set_item("k", "1").unwrap();
    a.storage().set_item("k", "2").unwrap();

    let events: Vec<_> = b.events.borrow().iter().cloned().collect();
    assert_eq!(
        events[1],
        PlatformEvent::Storage(StorageChange {
            key: Some("k".into()),
            old_value: Some("1".into()),
            new_value: Some("2".into()),
        })
    );
}

#[test]
fn closed_windows_are_pruned() {
    let device = MemoryDevice::new();
    let a = device.open_window(URL);
    drop(device.open_window(URL));
    a.storage().set_item("k", "v").unwrap();
    assert_eq!(device.inner.borrow().windows.len(), 1);
}

#[test]
fn quota_counts_keys_and_values() {
    let device = MemoryDevice::new();
    device.set_quota(Some(6));
    let window = device.open_window(URL);
    let storage = window.storage();

    storage.set_item("ab", "cd").unwrap();
    assert_eq!(storage.set_item("ef", "ghi"), Err(StorageFault::QuotaExceeded));
    // Replacing an entry only counts the new value.
    storage.set_item("ab", "cdef").unwrap();
    assert_eq!(storage.length(), Ok(1));
}

#[test]
fn denied_access_fails_every_operation() {
    let device = MemoryDevice::new();
    let window = device.open_window(URL);
    device.deny_access(true);
    let storage = window.storage();
    assert!(matches!(storage.get_item("k"), Err(StorageFault::Denied(_))));
    assert!(matches!(storage.set_item("k", "v"), Err(StorageFault::Denied(_))));
    assert!(matches!(storage.remove_item("k"), Err(StorageFault::Denied(_))));
    assert!(matches!(storage.length(), Err(StorageFault::Denied(_))));
}

#[test]
fn scheduler_runs_due_tasks_in_deadline_order() {
    let scheduler = ManualScheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for (delay, label) in [(30, "c"), (10, "a"), (10, "b"), (50, "late")] {
        let log = Rc::clone(&log);
        scheduler.schedule(Duration::from_millis(delay), Box::new(move || log.borrow_mut().push(label)));
    }

    scheduler.advance(Duration::from_millis(30));
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    assert_eq!(scheduler.now(), Duration::from_millis(30));
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn scheduler_runs_tasks_scheduled_during_advance() {
    let scheduler = ManualScheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let inner_log = Rc::clone(&log);
    let inner_scheduler = scheduler.clone();
    scheduler.schedule(
        Duration::from_millis(5),
        Box::new(move || {
            inner_log.borrow_mut().push(inner_scheduler.now().as_millis());
            let log = Rc::clone(&inner_log);
            let clock = inner_scheduler.clone();
            inner_scheduler.schedule(
                Duration::from_millis(5),
                Box::new(move || log.borrow_mut().push(clock.now().as_millis())),
            );
        }),
    );

    scheduler.advance(Duration::from_millis(20));
    assert_eq!(*log.borrow(), vec![5, 10]);
    assert_eq!(scheduler.now(), Duration::from_millis(20));
}
