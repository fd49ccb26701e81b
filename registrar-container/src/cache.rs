//! Instance cache for Managed and Singleton registrations.
//!
//! Each (contract, provider) pair owns a slot holding a
//! [`OnceCell`]. Concurrent first resolutions of a pair race on the same
//! cell, so exactly one of them constructs the instance and the others
//! wait for it. The map shard lock is released before construction runs.
//!
//! A thread filling a slot may itself block on a slot another thread is
//! filling. The [`WaitGraph`] records who fills which slot and who waits on
//! what, so a wait that would close a loop between threads fails with
//! [`RegistrarError::CyclicDependency`] instead of blocking forever.
//!
//! Invalidation swaps in a fresh empty cell instead of clearing the old
//! one in place. A construction still running against the old cell
//! finishes normally; its result is simply not seen by later lookups.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{ChainLink, CyclicDependencyError, RegistrarError, Result};
use crate::key::RegistrationKey;
use crate::provider::Instance;
use crate::scope::Scope;

type Slot = Arc<OnceCell<Instance>>;

#[derive(Debug, Default)]
pub(crate) struct InstanceCache {
    slots: DashMap<RegistrationKey, Slot>,
    graph: Mutex<WaitGraph>,
}

#[derive(Debug, Clone, Copy)]
struct Builder {
    thread: ThreadId,
    scope: Scope,
}

/// Slots under construction and the threads blocked on them.
#[derive(Debug, Default)]
struct WaitGraph {
    builders: HashMap<RegistrationKey, Builder>,
    waiting: HashMap<ThreadId, RegistrationKey>,
    /// Threads whose pending wait belongs to a detected cycle. They fail
    /// instead of retrying once the slot they wait on is released.
    aborted: HashMap<ThreadId, Vec<ChainLink>>,
}

impl WaitGraph {
    /// Follows builder -> awaited slot -> builder from `wanted`. Returns the
    /// chain and the other threads on it if the walk comes back to `me`.
    fn find_cycle(&self, wanted: ChainLink, me: ThreadId) -> Option<(Vec<ChainLink>, Vec<ThreadId>)> {
        let mut chain = vec![wanted];
        let mut threads = Vec::new();
        let mut owner = self.builders.get(&wanted.key)?.thread;

        while owner != me {
            if threads.contains(&owner) {
                return None;
            }
            threads.push(owner);

            let awaited = *self.waiting.get(&owner)?;
            let builder = self.builders.get(&awaited)?;
            chain.push(ChainLink {
                key: awaited,
                scope: builder.scope,
            });
            owner = builder.thread;
        }

        chain.push(wanted);
        Some((chain, threads))
    }
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached instance for `key`, building it with `init` if the
    /// slot is empty.
    ///
    /// A failed `init` leaves the slot empty, so the next call retries.
    ///
    /// # Errors
    /// [`RegistrarError::CyclicDependency`] when waiting for the slot would
    /// deadlock with another thread, or whatever `init` returns.
    pub fn get_or_try_init<F>(&self, link: ChainLink, init: F) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        let slot = self.slot(link.key);

        if let Some(instance) = slot.get() {
            trace!(key = %link.key, "Cache hit");
            return Ok(instance.clone());
        }

        let thread = thread::current().id();
        let _waiting = self.wait_for(link, thread)?;

        slot.get_or_try_init(|| {
            let _building = self.claim(link, thread)?;
            init()
        })
        .cloned()
    }

    /// Returns the cached instance for `key` without building one.
    pub fn get(&self, key: &RegistrationKey) -> Option<Instance> {
        self.slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of slots currently holding an instance.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Empties the slots of `keys`. Returns how many held an instance.
    pub fn invalidate<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = RegistrationKey>,
    {
        let mut invalidated = 0;

        for key in keys {
            if let Some(mut slot) = self.slots.get_mut(&key) {
                if slot.get().is_some() {
                    invalidated += 1;
                }
                *slot = Arc::new(OnceCell::new());
            }
        }

        debug!(invalidated, "Invalidated cached instances");
        invalidated
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Records that `thread` is about to block on `link`, unless that
    /// closes a loop of threads waiting on each other.
    fn wait_for(&self, link: ChainLink, thread: ThreadId) -> Result<WaitGuard<'_>> {
        let mut graph = self.graph.lock();

        if let Some((chain, threads)) = graph.find_cycle(link, thread) {
            warn!(cycle = ?chain, "Cyclic dependency detected across threads!");
            for other in threads {
                graph.aborted.insert(other, chain.clone());
            }
            return Err(RegistrarError::CyclicDependency(CyclicDependencyError { chain }));
        }

        graph.waiting.insert(thread, link.key);
        Ok(WaitGuard { graph: &self.graph, thread })
    }

    /// Marks `thread` as the builder of `link`'s slot.
    fn claim(&self, link: ChainLink, thread: ThreadId) -> Result<BuildGuard<'_>> {
        let mut graph = self.graph.lock();
        graph.waiting.remove(&thread);

        if let Some(chain) = graph.aborted.remove(&thread) {
            return Err(RegistrarError::CyclicDependency(CyclicDependencyError { chain }));
        }

        graph.builders.insert(
            link.key,
            Builder {
                thread,
                scope: link.scope,
            },
        );
        Ok(BuildGuard {
            graph: &self.graph,
            key: link.key,
            thread,
        })
    }

    fn slot(&self, key: RegistrationKey) -> Slot {
        // Clone out of the entry guard so the shard unlocks before `init` runs.
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }
}

/// Clears the thread's wait once it has an instance or an error.
struct WaitGuard<'a> {
    graph: &'a Mutex<WaitGraph>,
    thread: ThreadId,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut graph = self.graph.lock();
        graph.waiting.remove(&self.thread);
        graph.aborted.remove(&self.thread);
    }
}

struct BuildGuard<'a> {
    graph: &'a Mutex<WaitGraph>,
    key: RegistrationKey,
    thread: ThreadId,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut graph = self.graph.lock();
        // An invalidated slot may already be rebuilt by someone else.
        if graph.builders.get(&self.key).is_some_and(|b| b.thread == self.thread) {
            graph.builders.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Session;
    struct Pool;

    fn session() -> ChainLink {
        ChainLink {
            key: RegistrationKey::of::<Session, Session>(),
            scope: Scope::Managed,
        }
    }

    fn pool() -> ChainLink {
        ChainLink {
            key: RegistrationKey::of::<Pool, Pool>(),
            scope: Scope::Singleton,
        }
    }

    fn value(n: u32) -> Result<Instance> {
        Ok(Arc::new(n) as Instance)
    }

    #[test]
    fn init_runs_once() {
        let cache = InstanceCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let instance = cache
                .get_or_try_init(session(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    value(7)
                })
                .unwrap();
            assert_eq!(instance.downcast_ref::<u32>(), Some(&7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let cache = InstanceCache::new();

        let result = cache.get_or_try_init(session(), || {
            Err(RegistrarError::construction::<Session>("boom"))
        });
        assert!(result.is_err());
        assert_eq!(cache.len(), 0);

        assert!(cache.get_or_try_init(session(), || value(1)).is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_only_touches_given_keys() {
        let cache = InstanceCache::new();
        cache.get_or_try_init(session(), || value(1)).unwrap();
        cache.get_or_try_init(pool(), || value(2)).unwrap();

        assert_eq!(cache.invalidate([session().key]), 1);
        assert!(cache.get(&session().key).is_none());
        assert!(cache.get(&pool().key).is_some());

        let rebuilt = cache.get_or_try_init(session(), || value(3)).unwrap();
        assert_eq!(rebuilt.downcast_ref::<u32>(), Some(&3));
    }

    #[test]
    fn invalidate_unknown_key_is_noop() {
        let cache = InstanceCache::new();
        assert_eq!(cache.invalidate([session().key]), 0);
    }

    #[test]
    fn clear_drops_everything() {
        let cache = InstanceCache::new();
        cache.get_or_try_init(session(), || value(1)).unwrap();
        cache.clear();
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.get(&session().key).is_none());
    }

    #[test]
    fn concurrent_first_access_builds_one_instance() {
        let cache = Arc::new(InstanceCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_try_init(pool(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            value(9)
                        })
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn threads_waiting_on_each_other_fail_instead_of_blocking() {
        let cache = Arc::new(InstanceCache::new());
        let barrier = Arc::new(Barrier::new(2));

        let build = |own: ChainLink, want: ChainLink| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                cache.get_or_try_init(own, || {
                    barrier.wait();
                    cache.get_or_try_init(want, || value(0))
                })
            })
        };

        let first = build(session(), pool());
        let second = build(pool(), session());

        for handle in [first, second] {
            match handle.join().unwrap() {
                Err(RegistrarError::CyclicDependency(err)) => {
                    assert_eq!(err.chain.len(), 3);
                    assert_eq!(err.chain.first(), err.chain.last());
                }
                Err(other) => panic!("Expected CyclicDependency, got: {other:?}"),
                Ok(_) => panic!("Expected CyclicDependency, got an instance"),
            }
        }

        assert_eq!(cache.len(), 0);
        let graph = cache.graph.lock();
        assert!(graph.builders.is_empty());
        assert!(graph.waiting.is_empty());
        assert!(graph.aborted.is_empty());
    }
}
