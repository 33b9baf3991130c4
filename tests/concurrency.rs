//! Concurrent mutation and subscription tests.

use notehub::{
    ChangeKind, HubConfig, NoteHub, NoteId, NotePatch, OverflowPolicy, Topic, TopicConfig,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_concurrent_deletes_single_winner() {
    init_tracing();
    let hub = Arc::new(NoteHub::new(HubConfig::default()).unwrap());
    let changes = hub.note_changed().unwrap();
    let note = hub.create_note("T", "C", "A");
    changes.recv_timeout(Duration::from_millis(500)).unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hub = Arc::clone(&hub);
            let barrier = Arc::clone(&barrier);
            let id = note.id.clone();
            thread::spawn(move || {
                barrier.wait();
                hub.delete_note(&id).is_some()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    let event = changes.recv_timeout(Duration::from_millis(500)).unwrap();
    assert_eq!(event.kind(), ChangeKind::Deleted);
    assert!(changes.try_recv().is_err());
}

#[test]
fn test_concurrent_creates_publish_in_mutation_order() {
    let hub = Arc::new(NoteHub::new(HubConfig::default()).unwrap());
    let changes = hub.note_changed().unwrap();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let hub = Arc::clone(&hub);
            thread::spawn(move || {
                for i in 0..100 {
                    hub.create_note(format!("w{}-{}", w, i), "", "");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let ids: Vec<u64> = (0..400)
        .map(|_| {
            let event = changes.recv_timeout(Duration::from_millis(500)).unwrap();
            event.record().id.as_str().parse().unwrap()
        })
        .collect();

    let expected: Vec<u64> = (1..=400).collect();
    assert_eq!(ids, expected);
    assert_eq!(hub.notes().len(), 400);
}

#[test]
fn test_consumer_thread_sees_update_after_create() {
    let hub = Arc::new(NoteHub::new(HubConfig::default()).unwrap());
    let changes = hub.note_changed().unwrap();

    let consumer = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            let mut seen = Vec::new();
            for change in changes.iter() {
                // Re-querying sees a state at least as new as the event
                let id: u64 = change.record().id.as_str().parse().unwrap();
                assert!(hub.stats().next_id > id);
                seen.push(change.kind());
                if seen.len() == 3 {
                    break;
                }
            }
            seen
        })
    };

    let note = hub.create_note("T", "C", "A");
    hub.update_note(&note.id, NotePatch::default().title("T2"));
    hub.delete_note(&note.id);

    let seen = consumer.join().unwrap();
    assert_eq!(
        seen,
        vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
    );
}

#[test]
fn test_subscribe_churn_during_publish() {
    init_tracing();
    let topic: Arc<Topic<u64>> = Topic::new(
        "churn",
        TopicConfig {
            buffer_size: 16,
            overflow_policy: OverflowPolicy::DropNewest,
        },
    )
    .unwrap();
    let steady = topic.subscribe().unwrap();

    let publisher = {
        let topic = Arc::clone(&topic);
        thread::spawn(move || {
            for i in 0..2000u64 {
                topic.publish(i);
            }
        })
    };

    let churners: Vec<_> = (0..4)
        .map(|_| {
            let topic = Arc::clone(&topic);
            thread::spawn(move || {
                for _ in 0..200 {
                    let handle = topic.subscribe().unwrap();
                    // Whatever arrives must be in publish order
                    let got: Vec<u64> = std::iter::from_fn(|| handle.try_recv().ok()).collect();
                    assert!(got.windows(2).all(|w| w[0] < w[1]));
                    handle.cancel();
                    assert!(handle.try_recv().is_err());
                }
            })
        })
        .collect();

    let mut last = None;
    let mut received = 0;
    while received < 16 {
        if let Ok(value) = steady.recv_timeout(Duration::from_millis(200)) {
            if let Some(prev) = last {
                assert!(value > prev);
            }
            last = Some(value);
            received += 1;
        } else {
            break;
        }
    }

    publisher.join().unwrap();
    for churner in churners {
        churner.join().unwrap();
    }

    assert_eq!(topic.subscriber_count(), 1);
    assert_eq!(topic.stats().published, 2000);
}

#[test]
fn test_cancel_racing_publish_never_delivers_after_close() {
    let topic: Arc<Topic<u64>> = Topic::new("race", TopicConfig::default()).unwrap();

    for _ in 0..50 {
        let handle = topic.subscribe().unwrap();
        let publisher = {
            let topic = Arc::clone(&topic);
            thread::spawn(move || {
                for i in 0..100 {
                    topic.publish(i);
                }
            })
        };

        handle.cancel();
        assert!(handle.try_recv().is_err());
        publisher.join().unwrap();
        assert!(handle.try_recv().is_err());
        assert!(handle.recv().is_err());
    }

    assert_eq!(topic.subscriber_count(), 0);
}

#[test]
fn test_readers_during_writes() {
    let hub = Arc::new(NoteHub::new(HubConfig::default()).unwrap());

    let writer = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            for i in 0..200 {
                let note = hub.create_note(format!("{}", i), "", "");
                if i % 2 == 0 {
                    hub.delete_note(&note.id);
                }
            }
        })
    };

    let reader = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || {
            for _ in 0..200 {
                let ids: Vec<u64> = hub
                    .notes()
                    .iter()
                    .map(|n| n.id.as_str().parse().unwrap())
                    .collect();
                assert!(ids.windows(2).all(|w| w[0] < w[1]));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(hub.notes().len(), 100);
    assert!(hub.note(&NoteId::from(1)).is_none());
    assert!(hub.note(&NoteId::from(2)).is_some());
}
