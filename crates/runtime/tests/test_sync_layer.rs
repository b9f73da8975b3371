//! End-to-end tests for the sync layer
//!
//! Every scenario is written once against `SyncBackend` and run on each
//! backend compiled for this host, so the native and emulated primitives are
//! held to the same observable behavior.

use alecci_runtime::backend::emulated::Emulated;
use alecci_runtime::{
    ArrayStore, RuntimeConfig, SyncBackend, SyncError, SyncLayer, Tag, Variant, expect_handle,
    kind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn layer<B: SyncBackend>() -> Arc<SyncLayer<B>> {
    Arc::new(SyncLayer::with_backend(RuntimeConfig::default()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Before,
    After,
}

fn barrier_orders_rounds<B: SyncBackend>() {
    const PARTICIPANTS: usize = 3;
    const ROUNDS: usize = 2;

    let layer = layer::<B>();
    let barrier = layer.barrier_init(PARTICIPANTS as u32).unwrap();
    let log: Arc<Mutex<Vec<(usize, Phase)>>> = Arc::new(Mutex::new(Vec::new()));
    let leaders = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..PARTICIPANTS)
        .map(|_| {
            let inner = Arc::clone(&layer);
            let log = Arc::clone(&log);
            let leaders = Arc::clone(&leaders);
            layer
                .spawn(
                    move |barrier: Variant<'static>| {
                        let barrier = expect_handle::<kind::Barrier>(&barrier).unwrap();
                        for round in 0..ROUNDS {
                            log.lock().unwrap().push((round, Phase::Before));
                            if inner.barrier_wait(barrier).unwrap().is_leader() {
                                leaders.fetch_add(1, Ordering::SeqCst);
                            }
                            log.lock().unwrap().push((round, Phase::After));
                        }
                        0
                    },
                    Variant::barrier(barrier),
                )
                .unwrap()
        })
        .collect();

    for thread in threads {
        layer.join(thread).unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), PARTICIPANTS * ROUNDS * 2);
    for round in 0..ROUNDS {
        let last_before = log
            .iter()
            .rposition(|entry| *entry == (round, Phase::Before))
            .unwrap();
        let first_after = log
            .iter()
            .position(|entry| *entry == (round, Phase::After))
            .unwrap();
        assert!(
            last_before < first_after,
            "round {} released before every participant arrived: {:?}",
            round,
            *log
        );
    }
    assert_eq!(leaders.load(Ordering::SeqCst), ROUNDS);
    layer.barrier_destroy(barrier).unwrap();
}

fn semaphore_release_wakes_one<B: SyncBackend>() {
    let layer = layer::<B>();
    let sem = layer.semaphore_init(0).unwrap();
    let passed = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let inner = Arc::clone(&layer);
            let passed = Arc::clone(&passed);
            layer
                .spawn(
                    move |_: ()| {
                        inner.semaphore_acquire(sem).unwrap();
                        passed.fetch_add(1, Ordering::SeqCst);
                        0
                    },
                    (),
                )
                .unwrap()
        })
        .collect();

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(passed.load(Ordering::SeqCst), 0);

    layer.semaphore_release(sem).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(passed.load(Ordering::SeqCst), 1);

    layer.semaphore_release(sem).unwrap();
    for waiter in waiters {
        layer.join(waiter).unwrap();
    }
    assert_eq!(passed.load(Ordering::SeqCst), 2);
    assert_eq!(layer.semaphore_value(sem).unwrap(), 0);
    layer.semaphore_destroy(sem).unwrap();
}

fn mutex_ownership_rules<B: SyncBackend>() {
    let layer = layer::<B>();
    let mutex = layer.mutex_init().unwrap();

    assert!(matches!(
        layer.mutex_unlock(mutex),
        Err(SyncError::NotOwner { .. })
    ));
    layer.mutex_lock(mutex).unwrap();
    assert!(matches!(
        layer.mutex_lock(mutex),
        Err(SyncError::Deadlock { .. })
    ));

    let inner = Arc::clone(&layer);
    let foreign = layer
        .spawn(
            move |_: ()| {
                let refused = matches!(inner.mutex_unlock(mutex), Err(SyncError::NotOwner { .. }));
                let busy = !inner.mutex_try_lock(mutex).unwrap();
                usize::from(refused && busy)
            },
            (),
        )
        .unwrap();
    assert_eq!(layer.join(foreign).unwrap(), 1);

    layer.mutex_unlock(mutex).unwrap();
    assert!(layer.mutex_try_lock(mutex).unwrap());
    layer.mutex_unlock(mutex).unwrap();
    layer.mutex_destroy(mutex).unwrap();
}

// Bounded buffer: semaphores count slots and items, a mutex guards the indices.
fn producer_consumer<B: SyncBackend>() {
    const CAPACITY: usize = 4;
    const ITEMS: i64 = 100;

    let layer = layer::<B>();
    let store = Arc::new(ArrayStore::default());
    let buffer = store.create(CAPACITY).unwrap();
    let empty = layer.semaphore_init(CAPACITY as i64).unwrap();
    let full = layer.semaphore_init(0).unwrap();
    let guard = layer.mutex_init().unwrap();
    let cursor = Arc::new(Mutex::new((0usize, 0usize)));

    let producer = {
        let layer2 = Arc::clone(&layer);
        let store = Arc::clone(&store);
        let cursor = Arc::clone(&cursor);
        layer
            .spawn(
                move |_: ()| {
                    for item in 1..=ITEMS {
                        layer2.semaphore_acquire(empty).unwrap();
                        layer2.mutex_lock(guard).unwrap();
                        let slot = {
                            let mut cursor = cursor.lock().unwrap();
                            let slot = cursor.0;
                            cursor.0 = (slot + 1) % CAPACITY;
                            slot
                        };
                        store.set(buffer, slot, Variant::int(item)).unwrap();
                        layer2.mutex_unlock(guard).unwrap();
                        layer2.semaphore_release(full).unwrap();
                    }
                    0
                },
                (),
            )
            .unwrap()
    };

    let consumer = {
        let layer2 = Arc::clone(&layer);
        let store = Arc::clone(&store);
        let cursor = Arc::clone(&cursor);
        layer
            .spawn(
                move |_: ()| {
                    let mut sum = 0i64;
                    for _ in 0..ITEMS {
                        layer2.semaphore_acquire(full).unwrap();
                        layer2.mutex_lock(guard).unwrap();
                        let slot = {
                            let mut cursor = cursor.lock().unwrap();
                            let slot = cursor.1;
                            cursor.1 = (slot + 1) % CAPACITY;
                            slot
                        };
                        sum += store.get(buffer, slot).unwrap().get_int();
                        layer2.mutex_unlock(guard).unwrap();
                        layer2.semaphore_release(empty).unwrap();
                    }
                    sum as usize
                },
                (),
            )
            .unwrap()
    };

    layer.join(producer).unwrap();
    assert_eq!(layer.join(consumer).unwrap() as i64, ITEMS * (ITEMS + 1) / 2);
    assert_eq!(layer.semaphore_value(empty).unwrap(), CAPACITY as u32);
    assert_eq!(layer.semaphore_value(full).unwrap(), 0);
}

fn destroy_waits_for_holders<B: SyncBackend>() {
    let layer = layer::<B>();
    let sem = layer.semaphore_init(0).unwrap();

    let inner = Arc::clone(&layer);
    let waiter = layer
        .spawn(
            move |_: ()| {
                inner.semaphore_acquire(sem).unwrap();
                0
            },
            (),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    match layer.semaphore_destroy(sem) {
        Err(SyncError::InUse { kind, holders, .. }) => {
            assert_eq!(kind, Tag::Semaphore);
            assert_eq!(holders, 1);
        }
        other => panic!("expected InUse, got {:?}", other),
    }

    layer.semaphore_release(sem).unwrap();
    layer.join(waiter).unwrap();
    layer.semaphore_destroy(sem).unwrap();
    assert!(matches!(
        layer.semaphore_release(sem),
        Err(SyncError::StaleHandle { .. })
    ));
}

macro_rules! backend_tests {
    ($module:ident, $backend:ty) => {
        mod $module {
            use super::*;

            #[test]
            fn test_barrier_orders_rounds() {
                barrier_orders_rounds::<$backend>();
            }

            #[test]
            fn test_semaphore_release_wakes_one() {
                semaphore_release_wakes_one::<$backend>();
            }

            #[test]
            fn test_mutex_ownership_rules() {
                mutex_ownership_rules::<$backend>();
            }

            #[test]
            fn test_producer_consumer() {
                producer_consumer::<$backend>();
            }

            #[test]
            fn test_destroy_waits_for_holders() {
                destroy_waits_for_holders::<$backend>();
            }
        }
    };
}

backend_tests!(emulated, Emulated);

#[cfg(target_os = "linux")]
backend_tests!(native, alecci_runtime::backend::native::Native);

#[test]
#[cfg(target_pointer_width = "64")]
fn test_join_returns_full_pointer_width_result() {
    let layer = layer::<Emulated>();
    let handle = layer.spawn(|x: usize| x, 0x1_0000_0001).unwrap();
    assert_eq!(layer.join(handle).unwrap(), 0x1_0000_0001);
}

#[test]
fn test_thread_handle_travels_in_variant() {
    let layer = layer::<Emulated>();
    let worker = layer.spawn(|_: ()| 9, ()).unwrap();
    let value = Variant::thread(worker);
    assert!(value.is_thread());

    let inner = Arc::clone(&layer);
    let joiner = layer
        .spawn(
            move |value: Variant<'static>| {
                let worker = expect_handle::<kind::Thread>(&value).unwrap();
                inner.join(worker).unwrap() + 1
            },
            value,
        )
        .unwrap();
    assert_eq!(layer.join(joiner).unwrap(), 10);
    assert!(matches!(
        layer.join(worker),
        Err(SyncError::StaleHandle { .. })
    ));
}

#[test]
fn test_handles_are_not_interchangeable_across_kinds() {
    let layer = layer::<Emulated>();
    let sem = layer.semaphore_init(1).unwrap();
    let value = Variant::semaphore(sem);
    assert!(matches!(
        expect_handle::<kind::Mutex>(&value),
        Err(SyncError::WrongKind {
            expected: Tag::Mutex,
            found: Tag::Semaphore
        })
    ));
}

#[test]
fn test_global_layer_is_shared() {
    let a = SyncLayer::global();
    let b = SyncLayer::global();
    assert!(std::ptr::eq(a, b));

    let sem = a.semaphore_init(1).unwrap();
    assert!(b.semaphore_try_acquire(sem).unwrap());
    b.semaphore_destroy(sem).unwrap();
}
