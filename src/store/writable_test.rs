use std::cell::{Cell, RefCell};

use super::*;

fn collect(store: &Writable<i32>) -> (Rc<RefCell<Vec<i32>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let subscription = store.subscribe(Box::new(move |value| sink.borrow_mut().push(*value)));
    (seen, subscription)
}

#[test]
fn subscribe_delivers_current_value_immediately() {
    let store = Writable::new(7);
    let (seen, _subscription) = collect(&store);
    assert_eq!(*seen.borrow(), vec![7]);
}

#[test]
fn replace_notifies_in_registration_order() {
    let store = Writable::new(0);
    let order = Rc::new(RefCell::new(Vec::new()));
    let mut subscriptions = Vec::new();
    for label in ["first", "second"] {
        let order = Rc::clone(&order);
        subscriptions.push(store.subscribe(Box::new(move |value| order.borrow_mut().push((label, *value)))));
    }

    store.replace(1);
    assert_eq!(*order.borrow(), vec![("first", 0), ("second", 0), ("first", 1), ("second", 1)]);
    assert_eq!(store.version(), 1);
}

#[test]
fn equal_value_is_a_no_op() {
    let store = Writable::new(3);
    let (seen, _subscription) = collect(&store);
    store.replace(3);
    store.transform(Box::new(|value| *value));
    assert_eq!(*seen.borrow(), vec![3]);
    assert_eq!(store.version(), 0);
}

#[test]
fn transform_computes_from_current_value() {
    let store = Writable::new(2);
    let (seen, _subscription) = collect(&store);
    store.transform(Box::new(|value| value * 10));
    assert_eq!(store.get(), 20);
    assert_eq!(*seen.borrow(), vec![2, 20]);
}

#[test]
fn dropping_the_subscription_unsubscribes() {
    let store = Writable::new(0);
    let (seen, subscription) = collect(&store);
    assert_eq!(store.subscriber_count(), 1);
    drop(subscription);
    assert_eq!(store.subscriber_count(), 0);
    store.replace(5);
    assert_eq!(*seen.borrow(), vec![0]);
}

#[test]
fn detached_subscription_stays_registered() {
    let store = Writable::new(0);
    let (seen, subscription) = collect(&store);
    subscription.detach();
    store.replace(1);
    assert_eq!(*seen.borrow(), vec![0, 1]);
}

#[test]
fn clones_share_value_and_subscribers() {
    let store = Writable::new(0);
    let handle = store.clone();
    let (seen, _subscription) = collect(&store);
    handle.replace(9);
    assert_eq!(store.get(), 9);
    assert_eq!(*seen.borrow(), vec![0, 9]);
}

#[test]
fn subscribers_may_write_back_to_the_store() {
    let store = Writable::new(1);
    let handle = store.clone();
    let _clamp = store.subscribe(Box::new(move |value| {
        if *value > 10 {
            handle.replace(10);
        }
    }));
    store.replace(50);
    assert_eq!(store.get(), 10);
}

#[test]
fn start_and_stop_bracket_the_subscribed_period() {
    let starts = Rc::new(Cell::new(0));
    let stops = Rc::new(Cell::new(0));
    let store = {
        let starts = Rc::clone(&starts);
        let stops = Rc::clone(&stops);
        Writable::with_start(0, move |writable: &Writable<i32>| {
            starts.set(starts.get() + 1);
            writable.replace(42);
            let stops = Rc::clone(&stops);
            Some(Box::new(move || stops.set(stops.get() + 1)) as Box<dyn FnOnce()>)
        })
    };

    let (seen, first) = collect(&store);
    let (_, second) = collect(&store);
    assert_eq!(starts.get(), 1);
    assert_eq!(*seen.borrow(), vec![42], "start runs before the first listener call");

    drop(first);
    assert_eq!(stops.get(), 0);
    drop(second);
    assert_eq!(stops.get(), 1);

    let (_, _third) = collect(&store);
    assert_eq!(starts.get(), 2);
}
