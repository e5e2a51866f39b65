use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rtc_signal::{
    Mailbox, PeerId, SignalConfig, SignalHandle, SignalMessage, StreamChange,
};

fn loopback() -> SignalConfig {
    SignalConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..SignalConfig::default()
    }
}

/// Delivers everything `from` queued for `to_id` into `to`, as coming from
/// `from_id`.
fn deliver(from: &Mailbox, to_id: &str, to: &SignalHandle, from_id: &str) {
    for message in from.drain(to_id) {
        match message {
            SignalMessage::Offer(offer) => to.set_remote_description(offer, from_id, true).unwrap(),
            SignalMessage::Answer(answer) => {
                to.set_remote_description(answer, from_id, false).unwrap()
            }
            SignalMessage::Candidate(c) => to.add_ice_candidate(c, from_id).unwrap(),
        }
    }
}

fn wait_for_streams(mailbox: &Mailbox, count: usize) -> Vec<StreamChange> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = vec![];
    while seen.len() < count && Instant::now() < deadline {
        seen.extend(mailbox.drain_streams());
        thread::sleep(Duration::from_millis(10));
    }
    seen
}

#[test]
fn two_drivers_negotiate_over_loopback() {
    let alice_box = Arc::new(Mailbox::default());
    let bob_box = Arc::new(Mailbox::default());
    let alice = SignalHandle::spawn(loopback(), &alice_box).unwrap();
    let bob = SignalHandle::spawn(loopback(), &bob_box).unwrap();

    alice.add_connection("bob").unwrap();
    bob.add_connection("alice").unwrap();

    alice.create_offer("bob").unwrap();
    deliver(&alice_box, "bob", &bob, "alice");
    deliver(&bob_box, "alice", &alice, "bob");

    for mailbox in [&alice_box, &bob_box] {
        let added = wait_for_streams(mailbox, 2);
        assert_eq!(added.len(), 2, "{added:?}");
        assert!(added.iter().all(|n| matches!(n, StreamChange::Added(_))));
    }

    assert!(bob.remove_connection("alice").unwrap());
    let removed = wait_for_streams(&bob_box, 2);
    assert_eq!(removed.len(), 2);
    assert!(removed.iter().all(
        |n| matches!(n, StreamChange::Removed(s) if s.peer_id == PeerId::from("alice"))
    ));

    alice.shutdown();
    bob.shutdown();
}

#[test]
fn dropped_delegate_does_not_stop_the_driver() {
    let mailbox = Arc::new(Mailbox::default());
    let handle = SignalHandle::spawn(loopback(), &mailbox).unwrap();
    drop(mailbox);

    handle.add_connection("alice").unwrap();
    handle.create_offer("alice").unwrap();
    assert!(handle.remove_connection("alice").unwrap());
}
