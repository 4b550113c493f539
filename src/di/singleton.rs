use crate::di::Object;
use crate::error::{MeshweaveError, Result};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, ThreadId};
use std::time::Duration;

const BUILD_POLL: Duration = Duration::from_micros(250);

/// Built singletons keyed by identifier.
///
/// Never evicts; an entry leaves only through `invalidate` or `clear`.
#[derive(Default)]
pub struct SingletonCache {
    instances: DashMap<String, Object>,
    build_locks: DashMap<String, Arc<Mutex<()>>>,
    // identifier -> thread currently building it
    builders: DashMap<String, ThreadId>,
    // thread -> identifier it is waiting to build
    waiters: DashMap<ThreadId, String>,
}

/// Exclusive right to build one singleton; released on drop.
pub(crate) struct BuildTicket<'a> {
    cache: &'a SingletonCache,
    id: String,
    _held: MutexGuard<'a, ()>,
}

impl Drop for BuildTicket<'_> {
    fn drop(&mut self) {
        self.cache.builders.remove(&self.id);
    }
}

impl SingletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Object> {
        self.instances.get(id).map(|o| o.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn insert(&self, id: &str, object: Object) {
        self.instances.insert(id.to_string(), object);
    }

    /// Drops the cached instance and the identifier's build lock. A build
    /// still running for the old definition keeps its own lock.
    pub fn invalidate(&self, id: &str) -> bool {
        self.build_locks.remove(id);
        self.instances.remove(id).is_some()
    }

    /// Drops every cached instance. Build locks survive so builds already in
    /// flight stay serialized against new callers.
    pub fn clear(&self) {
        self.instances.clear();
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Per-identifier lock held while a singleton is being built, so
    /// concurrent first lookups construct it only once.
    pub(crate) fn build_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.build_locks.entry(id.to_string()).or_default().clone()
    }

    /// Take `lock` for building `id`, waiting while another thread holds it.
    ///
    /// Fails with `CircularDependency` when the chain of threads waiting on
    /// each other's builds leads back to the calling thread.
    pub(crate) fn acquire<'a>(&'a self, id: &str, lock: &'a Mutex<()>) -> Result<BuildTicket<'a>> {
        let me = thread::current().id();
        loop {
            let held = match lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            };
            if let Some(held) = held {
                self.waiters.remove(&me);
                self.builders.insert(id.to_string(), me);
                return Ok(BuildTicket {
                    cache: self,
                    id: id.to_string(),
                    _held: held,
                });
            }

            self.waiters.insert(me, id.to_string());
            if let Some(cycle) = self.wait_cycle(me, id) {
                self.waiters.remove(&me);
                tracing::debug!("Cross-thread singleton cycle: {}", cycle);
                return Err(MeshweaveError::CircularDependency { cycle });
            }
            thread::sleep(BUILD_POLL);
        }
    }

    fn wait_cycle(&self, me: ThreadId, id: &str) -> Option<String> {
        let mut path = vec![id.to_string()];
        let mut owner = *self.builders.get(id)?.value();
        for _ in 0..=self.builders.len() {
            if owner == me {
                let held = path.last().cloned().unwrap_or_default();
                return Some(format!("{} -> {}", held, path.join(" -> ")));
            }
            let next = self.waiters.get(&owner)?.value().clone();
            owner = *self.builders.get(&next)?.value();
            path.push(next);
        }
        None
    }
}
