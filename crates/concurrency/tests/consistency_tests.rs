//! Multi-threaded tests for the consistency controller
//!
//! These race real threads against one controller to verify:
//!
//! 1. **Exclusive arbitration** - at most one exclusive handle wins a URI
//! 2. **Shared registration** - concurrent shared opens all succeed
//! 3. **Cleanup** - dropping every sentry empties the registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tessera_concurrency::{ArrayId, ConsistencyController};
use tessera_core::{ArrayUri, QueryType};

// ============================================================================
// SECTION 1: Exclusive Arbitration
// ============================================================================

mod exclusive_arbitration {
    use super::*;

    /// Many threads try to open the same URI exclusively at once.
    /// Exactly one may hold it; the rest must see a conflict.
    #[test]
    fn only_one_exclusive_open_wins() {
        const THREADS: usize = 16;
        let controller = Arc::new(ConsistencyController::new());
        let uri = ArrayUri::new("mem://contended");
        let barrier = Arc::new(Barrier::new(THREADS));
        let winners = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let controller = Arc::clone(&controller);
                let uri = uri.clone();
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                let release = Arc::clone(&release);
                thread::spawn(move || {
                    barrier.wait();
                    let result =
                        controller.make_sentry(&uri, ArrayId::next(), QueryType::ModifyExclusive);
                    if result.is_ok() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    } else {
                        assert!(result.as_ref().unwrap_err().is_conflict());
                    }
                    // Hold any sentry until every thread has tried.
                    release.wait();
                    drop(result);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(controller.is_empty());
    }

    /// Readers and an exclusive opener race; the registry must never hold
    /// an exclusive entry next to any other entry.
    #[test]
    fn exclusive_never_coexists_with_readers() {
        const READERS: usize = 8;
        const ROUNDS: usize = 200;
        let controller = Arc::new(ConsistencyController::new());
        let uri = ArrayUri::new("mem://mixed");
        let barrier = Arc::new(Barrier::new(READERS + 1));

        let mut handles = Vec::new();
        for _ in 0..READERS {
            let controller = Arc::clone(&controller);
            let uri = uri.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                let mut opened = 0;
                for _ in 0..ROUNDS {
                    if let Ok(sentry) =
                        controller.make_sentry(&uri, ArrayId::next(), QueryType::Read)
                    {
                        opened += 1;
                        drop(sentry);
                    }
                }
                opened
            }));
        }

        let exclusive = {
            let controller = Arc::clone(&controller);
            let uri = uri.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut held = 0;
                for _ in 0..ROUNDS {
                    if let Ok(sentry) =
                        controller.make_sentry(&uri, ArrayId::next(), QueryType::ModifyExclusive)
                    {
                        assert_eq!(controller.open_count(&uri), 1);
                        held += 1;
                        drop(sentry);
                    }
                }
                held
            })
        };

        let opened: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let held = exclusive.join().unwrap();
        assert!(opened + held > 0);
        assert!(controller.is_empty());
    }
}

// ============================================================================
// SECTION 2: Shared Registration
// ============================================================================

mod shared_registration {
    use super::*;

    #[test]
    fn concurrent_shared_opens_all_succeed() {
        const THREADS: usize = 12;
        let controller = Arc::new(ConsistencyController::new());
        let uri = ArrayUri::new("mem://shared");
        let registered = Arc::new(Barrier::new(THREADS + 1));
        let release = Arc::new(Barrier::new(THREADS + 1));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let controller = Arc::clone(&controller);
                let uri = uri.clone();
                let registered = Arc::clone(&registered);
                let release = Arc::clone(&release);
                thread::spawn(move || {
                    let mode = if i % 2 == 0 {
                        QueryType::Read
                    } else {
                        QueryType::Write
                    };
                    let sentry = controller.make_sentry(&uri, ArrayId::next(), mode).unwrap();
                    registered.wait();
                    release.wait();
                    drop(sentry);
                })
            })
            .collect();

        registered.wait();
        assert_eq!(controller.open_count(&uri), THREADS);
        assert!(controller
            .make_sentry(&uri, ArrayId::next(), QueryType::ModifyExclusive)
            .is_err());
        release.wait();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!controller.is_open(&uri));
    }
}

// ============================================================================
// SECTION 3: Cleanup
// ============================================================================

mod cleanup {
    use super::*;

    #[test]
    fn sentries_dropped_on_other_threads_deregister() {
        let controller = Arc::new(ConsistencyController::new());
        let sentries: Vec<_> = (0..32)
            .map(|i| {
                let uri = ArrayUri::new(format!("mem://array-{}", i % 4));
                controller
                    .make_sentry(&uri, ArrayId::next(), QueryType::Read)
                    .unwrap()
            })
            .collect();
        assert_eq!(controller.len(), 4);

        let handles: Vec<_> = sentries
            .into_iter()
            .map(|sentry| thread::spawn(move || drop(sentry)))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(controller.is_empty());
    }
}
