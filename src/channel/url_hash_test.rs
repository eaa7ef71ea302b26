use std::cell::RefCell;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::error::RetentionError;
use crate::memory::{MemoryDevice, MemoryWindow};

fn open(url: &str) -> (MemoryWindow, UrlHashChannel) {
    let window = MemoryDevice::new().open_window(url);
    let channel = UrlHashChannel::new(window.location(), &RetentionConfig::default());
    (window, channel)
}

fn record(channel: &UrlHashChannel, key: &str) -> Rc<RefCell<Vec<Change>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    channel
        .register_change_handler(key, move |change| sink.borrow_mut().push(change.clone()))
        .unwrap();
    seen
}

#[test]
fn reads_values_present_at_launch() {
    let (_window, channel) = open("https://app.test/#theme=Teal-light&zoom=2");
    assert!(channel.is_defined("theme").unwrap());
    assert!(channel.was_defined_at_launch("theme"));
    assert_eq!(channel.get("theme").unwrap(), Some(json!("Teal-light")));
    assert_eq!(channel.get("missing").unwrap(), None);
    assert!(!channel.is_defined("missing").unwrap());
}

#[test]
fn segment_without_value_reads_as_placeholder() {
    let (_window, channel) = open("https://app.test/#theme");
    assert!(channel.is_defined("theme").unwrap());
    assert_eq!(channel.get("theme").unwrap(), Some(json!("UNKNOWN")));
}

#[test]
fn placeholder_is_configurable() {
    let window = MemoryDevice::new().open_window("https://app.test/#theme=");
    let config = RetentionConfig { missing_value_placeholder: "?".into(), ..RetentionConfig::default() };
    let channel = UrlHashChannel::new(window.location(), &config);
    assert_eq!(channel.get("theme").unwrap(), Some(json!("?")));
}

#[test]
fn set_rewrites_the_fragment_keeping_key_order() {
    let (window, channel) = open("https://app.test/#a=1&b=2");
    channel.set("a", &json!("x"), false).unwrap();
    channel.set("c", &json!(3), false).unwrap();
    assert_eq!(window.location().fragment(), "a=x&b=2&c=asonja@LS@@Q@apwra@Q@@C@3@RS@");
    assert_eq!(channel.get("c").unwrap(), Some(json!(3)));
}

#[test]
fn update_writes_only_launch_keys() {
    let (window, channel) = open("https://app.test/#theme=Teal-light");
    assert!(channel.update("theme", &json!("Cool-dark"), false).unwrap());
    assert!(!channel.update("sidebar", &json!("open"), false).unwrap());
    assert_eq!(window.location().fragment(), "theme=Cool-dark");

    // A key added after launch still does not qualify.
    channel.set("sidebar", &json!("open"), false).unwrap();
    assert!(!channel.update("sidebar", &json!("closed"), false).unwrap());
    assert_eq!(channel.get("sidebar").unwrap(), Some(json!("open")));
}

#[test]
fn reserved_characters_round_trip() {
    let (window, channel) = open("https://app.test/");
    channel.set("q", &json!("a&b=c"), false).unwrap();
    channel.set("obj", &json!({"k": "v#1 100%"}), false).unwrap();
    assert_eq!(window.location().fragment().matches('&').count(), 1);
    assert_eq!(channel.get("q").unwrap(), Some(json!("a&b=c")));
    assert_eq!(channel.get("obj").unwrap(), Some(json!({"k": "v#1 100%"})));
}

#[cfg(feature = "safeguard")]
#[test]
fn safeguarded_values_are_obfuscated_in_the_fragment() {
    let (window, channel) = open("https://app.test/");
    channel.set("token", &json!("secret"), true).unwrap();
    let fragment = window.location().fragment();
    assert!(fragment.starts_with("token=afesa"));
    assert!(!fragment.contains("secret"));
    assert_eq!(channel.get("token").unwrap(), Some(json!("secret")));
}

#[test]
fn empty_key_is_a_parameter_violation() {
    let (_window, channel) = open("https://app.test/");
    for err in [
        channel.get("").unwrap_err(),
        channel.set("", &json!(1), false).unwrap_err(),
        channel.update("", &json!(1), false).unwrap_err(),
        channel.register_change_handler("", |_| {}).unwrap_err(),
    ] {
        assert!(matches!(err, RetentionError::ParameterViolation { .. }), "{err}");
    }
}

#[test]
fn hash_change_reports_changed_keys_once() {
    let (window, channel) = open("https://app.test/#theme=Teal-light");
    let seen = record(&channel, "theme");

    channel.handle_hash_change().unwrap();
    assert!(seen.borrow().is_empty(), "no change since launch");

    channel.set("theme", &json!("Cool-dark"), false).unwrap();
    assert!(seen.borrow().is_empty(), "notification is queued, not synchronous");
    assert_eq!(window.pending(), 1);

    channel.handle_hash_change().unwrap();
    channel.handle_hash_change().unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![Change { old_value: Some(json!("Teal-light")), new_value: Some(json!("Cool-dark")) }]
    );
}

#[test]
fn added_keys_are_reported_and_removed_keys_are_not() {
    let (window, channel) = open("https://app.test/#a=1");
    let seen_a = record(&channel, "a");
    let seen_b = record(&channel, "b");

    window.edit_fragment("b=2");
    channel.handle_hash_change().unwrap();

    assert!(seen_a.borrow().is_empty());
    assert_eq!(*seen_b.borrow(), vec![Change { old_value: None, new_value: Some(json!("2")) }]);
}

#[cfg(not(feature = "safeguard"))]
#[test]
fn undecodable_entry_does_not_hide_later_changes() {
    let (window, channel) = open("https://app.test/#a=1&b=1");
    let seen_a = record(&channel, "a");
    let seen_b = record(&channel, "b");

    window.edit_fragment("a=afesaYQ&b=2");
    channel.handle_hash_change().unwrap();

    assert!(seen_a.borrow().is_empty());
    assert_eq!(*seen_b.borrow(), vec![Change { old_value: Some(json!("1")), new_value: Some(json!("2")) }]);
}

#[test]
fn handlers_may_reenter_the_channel() {
    let (window, channel) = open("https://app.test/#n=1");
    let channel = Rc::new(channel);
    let reads = Rc::new(RefCell::new(Vec::new()));
    {
        let weak = Rc::downgrade(&channel);
        let reads = Rc::clone(&reads);
        channel
            .register_change_handler("n", move |_| {
                if let Some(channel) = weak.upgrade() {
                    reads.borrow_mut().push(channel.get("n").unwrap());
                    channel.set("echo", &json!(true), false).unwrap();
                }
            })
            .unwrap();
    }

    window.edit_fragment("n=2");
    channel.handle_hash_change().unwrap();
    assert_eq!(*reads.borrow(), vec![Some(json!("2"))]);
    assert_eq!(window.location().fragment(), "n=2&echo=asonja@LS@@Q@apwra@Q@@C@true@RS@");
}

#[test]
fn unregistered_handlers_stop_firing() {
    let (window, channel) = open("https://app.test/#k=1");
    let seen = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&seen);
    let id = channel.register_change_handler("k", move |_| *sink.borrow_mut() += 1).unwrap();
    assert!(channel.unregister_change_handler("k", id));

    window.edit_fragment("k=2");
    channel.handle_hash_change().unwrap();
    assert_eq!(*seen.borrow(), 0);
}
