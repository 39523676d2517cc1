use std::borrow::Borrow;
use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::shared::{SharedState, SyncAccess};
use crate::signature::ConcurrencyModel;

type Inner<K, V> = ReentrantMutex<RefCell<FxHashMap<K, V>>>;

/// A map guarded by a re-entrant lock, for preemptible callers.
///
/// Cloning the map yields another handle to the same entries. Every
/// operation holds the lock for its whole duration. Because the lock is
/// re-entrant, a thread holding [`lock`](Self::lock) can keep calling
/// operations on the map, which makes multi-step updates atomic:
///
/// ```
/// # use veritas::SyncMap;
/// let map = SyncMap::<String, i64>::new();
/// {
///     let _guard = map.lock();
///     let n = map.get("counter", 0);
///     map.set("counter".into(), n + 1);
/// }
/// assert_eq!(map.get("counter", 0), 1);
/// ```
pub struct SyncMap<K, V> {
    inner: Arc<Inner<K, V>>,
}

/// Holds a [`SyncMap`]'s lock until dropped.
#[must_use = "the lock is released when the guard is dropped"]
pub struct SyncMapGuard<'a, K, V> {
    _guard: ReentrantMutexGuard<'a, RefCell<FxHashMap<K, V>>>,
}

impl<K, V> SyncMap<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(FxHashMap::default()))),
        }
    }

    /// Take the map's lock, keeping other threads out until the guard drops.
    pub fn lock(&self) -> SyncMapGuard<'_, K, V> {
        SyncMapGuard { _guard: self.inner.lock() }
    }

    /// The value for `key`, or `default` if absent.
    pub fn get<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_opt(key).unwrap_or(default)
    }

    /// The value for `key`, if present.
    pub fn get_opt<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        map.get(key).cloned()
    }

    /// Write a value, returning the previous one.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        let guard = self.inner.lock();
        let mut map = RefCell::borrow_mut(&guard);
        map.insert(key, value)
    }

    /// Remove a value.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.inner.lock();
        let mut map = RefCell::borrow_mut(&guard);
        map.remove(key)
    }

    /// Whether `key` is present.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        map.contains_key(key)
    }

    /// Read, transform and write back one value atomically.
    ///
    /// `f` receives the current value (or `default`) and runs with the lock
    /// held, so it may itself use the map. Returns the new value.
    pub fn update<F>(&self, key: K, default: V, f: F) -> V
    where
        F: FnOnce(V) -> V,
    {
        let guard = self.inner.lock();
        let current = RefCell::borrow(&guard).get(&key).cloned().unwrap_or(default);
        let next = f(current);
        RefCell::borrow_mut(&guard).insert(key, next.clone());
        next
    }

    /// A snapshot of all entries.
    pub fn items(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// A snapshot of all keys.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        map.keys().cloned().collect()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let guard = self.inner.lock();
        RefCell::borrow_mut(&guard).clear();
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        map.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Clone for SyncMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: Hash + Eq, V: Clone> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V: Debug> Debug for SyncMap<K, V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let guard = self.inner.lock();
        let map = RefCell::borrow(&guard);
        f.debug_tuple("SyncMap").field(&*map).finish()
    }
}

impl<K, V> SharedState for SyncMap<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    fn model(&self) -> Option<ConcurrencyModel> {
        Some(ConcurrencyModel::Preemptible)
    }

    fn type_name(&self) -> &'static str {
        "SyncMap"
    }
}

impl<K, V> SyncAccess<K, V> for SyncMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn try_get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.get_opt(key))
    }

    fn try_set(&self, key: K, value: V) -> Result<Option<V>> {
        Ok(self.set(key, value))
    }

    fn try_delete(&self, key: &K) -> Result<Option<V>> {
        Ok(self.delete(key))
    }

    fn try_contains(&self, key: &K) -> Result<bool> {
        Ok(self.contains(key))
    }

    fn try_items(&self) -> Result<Vec<(K, V)>> {
        Ok(self.items())
    }

    fn try_clear(&self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn try_len(&self) -> Result<usize> {
        Ok(self.len())
    }
}
