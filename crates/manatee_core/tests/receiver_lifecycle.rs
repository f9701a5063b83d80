use manatee_core::{
    ArgType, Args, DispatchSystem, HandlerDecl, MessageDecl, MessageReceiver, MessageSender,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

struct Clock;

impl MessageSender for Clock {
    fn messages() -> Vec<MessageDecl> {
        vec![MessageDecl::new("tick", [ArgType::of::<u64>()])]
    }
}

#[derive(Default)]
struct Listener {
    total: AtomicUsize,
}

impl MessageReceiver for Listener {
    fn handlers() -> Vec<HandlerDecl<Self>> {
        vec![
            HandlerDecl::method("on_tick", [ArgType::of::<u64>()], |r: &Self, args| {
                let step = *args.get::<u64>(0)?;
                r.total.fetch_add(step as usize, Ordering::SeqCst);
                Ok(())
            })
            .receives::<Clock>("tick"),
        ]
    }
}

/// Unsubscribes itself from `bus` on the first tick it sees.
struct OneShot {
    bus: Arc<DispatchSystem>,
    me: Weak<OneShot>,
    hits: AtomicUsize,
}

impl OneShot {
    fn subscribe(bus: &Arc<DispatchSystem>) -> Arc<Self> {
        let listener = Arc::new_cyclic(|me| Self {
            bus: Arc::clone(bus),
            me: me.clone(),
            hits: AtomicUsize::new(0),
        });
        bus.add_receiver(&listener);
        listener
    }
}

impl MessageReceiver for OneShot {
    fn handlers() -> Vec<HandlerDecl<Self>> {
        vec![
            HandlerDecl::method("on_tick", [ArgType::of::<u64>()], |r: &Self, _| {
                r.hits.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = r.me.upgrade() {
                    r.bus.remove_receiver(&me);
                }
                Ok(())
            })
            .receives::<Clock>("tick"),
        ]
    }
}

fn tick(system: &DispatchSystem, step: u64) -> usize {
    system.emit(&Clock, "tick", Args::new().with(step))
}

#[test]
fn dropping_the_last_owner_ends_delivery_without_removal() {
    let system = DispatchSystem::new("lifecycle-drop");
    let kept = Arc::new(Listener::default());
    let dropped = Arc::new(Listener::default());
    system.add_receiver(&kept);
    system.add_receiver(&dropped);
    assert_eq!(system.receiver_count(), 2);

    drop(dropped);

    assert_eq!(system.receiver_count(), 1);
    assert_eq!(tick(&system, 1), 1);
    assert_eq!(kept.total.load(Ordering::SeqCst), 1);
}

#[test]
fn explicit_removal_is_reported_once() {
    let system = DispatchSystem::new("lifecycle-remove");
    let listener = Arc::new(Listener::default());
    system.add_receiver(&listener);

    assert!(system.remove_receiver(&listener));
    assert!(!system.remove_receiver(&listener));
    assert_eq!(tick(&system, 3), 0);
    assert_eq!(listener.total.load(Ordering::SeqCst), 0);
}

#[test]
fn removing_an_unknown_instance_returns_false() {
    let system = DispatchSystem::new("lifecycle-unknown");
    let tracked = Arc::new(Listener::default());
    let stranger = Arc::new(Listener::default());
    system.add_receiver(&tracked);

    assert!(!system.remove_receiver(&stranger));
    assert_eq!(system.receiver_count(), 1);
}

#[test]
fn bus_does_not_keep_receivers_alive() {
    let system = DispatchSystem::new("lifecycle-strong-count");
    let listener = Arc::new(Listener::default());
    system.add_receiver(&listener);

    assert_eq!(Arc::strong_count(&listener), 1);
    assert_eq!(Arc::weak_count(&listener), 1);
}

#[test]
fn concurrent_emitters_deliver_every_message() {
    let system = Arc::new(DispatchSystem::new("lifecycle-concurrent"));
    let listeners: Vec<_> = (0..4).map(|_| Arc::new(Listener::default())).collect();
    for listener in &listeners {
        system.add_receiver(listener);
    }

    let emitters: Vec<_> = (0..8)
        .map(|_| {
            let system = Arc::clone(&system);
            thread::spawn(move || {
                for _ in 0..50 {
                    tick(&system, 1);
                }
            })
        })
        .collect();
    for emitter in emitters {
        emitter.join().expect("emitter thread");
    }

    for listener in &listeners {
        assert_eq!(listener.total.load(Ordering::SeqCst), 400);
    }
}

#[test]
fn receivers_added_from_another_thread_are_seen() {
    let system = Arc::new(DispatchSystem::new("lifecycle-cross-thread"));
    let listener = Arc::new(Listener::default());

    {
        let system = Arc::clone(&system);
        let listener = Arc::clone(&listener);
        thread::spawn(move || system.add_receiver(&listener))
            .join()
            .expect("registration thread");
    }

    assert_eq!(tick(&system, 2), 1);
    assert_eq!(listener.total.load(Ordering::SeqCst), 2);
}

#[test]
fn receiver_removing_itself_does_not_skip_the_next_one() {
    let system = Arc::new(DispatchSystem::new("lifecycle-self-removal"));
    let one_shot = OneShot::subscribe(&system);
    let after = Arc::new(Listener::default());
    system.add_receiver(&after);

    assert_eq!(tick(&system, 1), 2);
    assert_eq!(one_shot.hits.load(Ordering::SeqCst), 1);
    assert_eq!(after.total.load(Ordering::SeqCst), 1);

    assert_eq!(tick(&system, 1), 1);
    assert_eq!(one_shot.hits.load(Ordering::SeqCst), 1);
    assert_eq!(after.total.load(Ordering::SeqCst), 2);
}

#[test]
fn purge_during_emission_does_not_skip_later_receivers() {
    /// Releases the only owner of `victim`, then purges the bus list.
    struct Reaper {
        bus: Arc<DispatchSystem>,
        victim: Mutex<Option<Arc<Listener>>>,
        seen: AtomicUsize,
    }

    impl MessageReceiver for Reaper {
        fn handlers() -> Vec<HandlerDecl<Self>> {
            vec![
                HandlerDecl::method("on_tick", [ArgType::of::<u64>()], |r: &Self, _| {
                    r.victim.lock().expect("victim lock").take();
                    r.bus.receiver_count();
                    r.seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .receives::<Clock>("tick"),
            ]
        }
    }

    let system = Arc::new(DispatchSystem::new("lifecycle-purge-mid-emission"));
    let victim = Arc::new(Listener::default());
    let reaper = Arc::new(Reaper {
        bus: Arc::clone(&system),
        victim: Mutex::new(None),
        seen: AtomicUsize::new(0),
    });
    let last = Arc::new(Listener::default());
    system.add_receiver(&victim);
    system.add_receiver(&reaper);
    system.add_receiver(&last);
    *reaper.victim.lock().expect("victim lock") = Some(victim);

    assert_eq!(tick(&system, 1), 3);
    assert_eq!(reaper.seen.load(Ordering::SeqCst), 1);
    assert_eq!(last.total.load(Ordering::SeqCst), 1);
    assert_eq!(system.receiver_count(), 2);
}
