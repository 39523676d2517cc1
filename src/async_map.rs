use std::borrow::Borrow;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::sync::Arc;

use futures::stream::{self, Stream};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::shared::{SharedState, SyncAccess};
use crate::signature::ConcurrencyModel;

/// A map guarded by an async lock, for cooperative callers.
///
/// Same contract as [`SyncMap`](crate::SyncMap), but every operation is a
/// suspension point: waiting for the lock yields to the scheduler instead of
/// blocking the thread. Synchronous access through [`SyncAccess`] is
/// rejected with [`Error::WrongConcurrencyModel`].
pub struct AsyncMap<K, V> {
    inner: Arc<Mutex<FxHashMap<K, V>>>,
}

impl<K, V> AsyncMap<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(FxHashMap::default())) }
    }

    /// The value for `key`, or `default` if absent.
    pub async fn get<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_opt(key).await.unwrap_or(default)
    }

    /// The value for `key`, if present.
    pub async fn get_opt<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().await.get(key).cloned()
    }

    /// Write a value, returning the previous one.
    pub async fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().await.insert(key, value)
    }

    /// Remove a value.
    pub async fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().await.remove(key)
    }

    /// Whether `key` is present.
    pub async fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().await.contains_key(key)
    }

    /// Read, transform and write back one value atomically.
    ///
    /// `f` runs with the lock held. It must not use this map, since the
    /// async lock is not re-entrant.
    pub async fn update<F>(&self, key: K, default: V, f: F) -> V
    where
        F: FnOnce(V) -> V,
    {
        let mut map = self.inner.lock().await;
        let next = f(map.get(&key).cloned().unwrap_or(default));
        map.insert(key, next.clone());
        next
    }

    /// A snapshot of all entries.
    pub async fn items(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        let map = self.inner.lock().await;
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Lazily enumerate the keys.
    ///
    /// The first step snapshots the key set. Every further step re-acquires
    /// the lock before yielding the next key from that snapshot, so writers
    /// can interleave without changing what is enumerated. Call again to
    /// restart from a fresh snapshot.
    pub fn keys(&self) -> impl Stream<Item = K> + '_
    where
        K: Clone,
    {
        stream::unfold(None, move |snapshot: Option<std::vec::IntoIter<K>>| async move {
            let mut keys = match snapshot {
                Some(keys) => {
                    drop(self.inner.lock().await);
                    keys
                }
                None => {
                    let map = self.inner.lock().await;
                    map.keys().cloned().collect::<Vec<_>>().into_iter()
                }
            };
            let key = keys.next()?;
            Some((key, Some(keys)))
        })
    }

    /// Remove all entries.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// The number of entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> AsyncMap<K, V> {
    fn wrong_model() -> Error {
        Error::WrongConcurrencyModel {
            container: "AsyncMap",
            expected: ConcurrencyModel::Cooperative,
        }
    }
}

impl<K, V> Clone for AsyncMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: Hash + Eq, V: Clone> Default for AsyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for AsyncMap<K, V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("AsyncMap").field(&Arc::as_ptr(&self.inner)).finish()
    }
}

impl<K, V> SharedState for AsyncMap<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    fn model(&self) -> Option<ConcurrencyModel> {
        Some(ConcurrencyModel::Cooperative)
    }

    fn type_name(&self) -> &'static str {
        "AsyncMap"
    }
}

impl<K, V> SyncAccess<K, V> for AsyncMap<K, V> {
    fn try_get(&self, _: &K) -> Result<Option<V>> {
        Err(Self::wrong_model())
    }

    fn try_set(&self, _: K, _: V) -> Result<Option<V>> {
        Err(Self::wrong_model())
    }

    fn try_delete(&self, _: &K) -> Result<Option<V>> {
        Err(Self::wrong_model())
    }

    fn try_contains(&self, _: &K) -> Result<bool> {
        Err(Self::wrong_model())
    }

    fn try_items(&self) -> Result<Vec<(K, V)>> {
        Err(Self::wrong_model())
    }

    fn try_clear(&self) -> Result<()> {
        Err(Self::wrong_model())
    }

    fn try_len(&self) -> Result<usize> {
        Err(Self::wrong_model())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn crud() {
        let map = AsyncMap::<String, i64>::new();
        assert!(map.is_empty().await);
        assert_eq!(map.set("a".into(), 1).await, None);
        assert_eq!(map.get("a", 0).await, 1);
        assert_eq!(map.get("b", 9).await, 9);
        assert!(map.contains("a").await);
        assert_eq!(map.update("a".into(), 0, |v| v * 10).await, 10);
        assert_eq!(map.items().await, [("a".to_string(), 10)]);
        assert_eq!(map.delete("a").await, Some(10));
        map.set("b".into(), 2).await;
        map.clear().await;
        assert_eq!(map.len().await, 0);
    }

    #[tokio::test]
    async fn keys_enumerate_the_starting_snapshot() {
        let map = AsyncMap::<String, i64>::new();
        map.set("a".into(), 1).await;
        map.set("b".into(), 2).await;

        let keys = map.keys();
        futures::pin_mut!(keys);
        let first = keys.next().await.unwrap();

        map.set("c".into(), 3).await;
        map.delete("a").await;

        let mut seen = vec![first];
        while let Some(key) = keys.next().await {
            seen.push(key);
        }
        seen.sort();
        assert_eq!(seen, ["a", "b"]);

        let mut restarted: Vec<_> = map.keys().collect().await;
        restarted.sort();
        assert_eq!(restarted, ["b", "c"]);
    }

    #[test]
    fn synchronous_use_fails_fast() {
        let map = AsyncMap::<String, i64>::new();
        let access: &dyn SyncAccess<String, i64> = &map;
        assert_eq!(
            access.try_get(&"a".into()),
            Err(AsyncMap::<String, i64>::wrong_model())
        );
        assert!(matches!(
            access.try_items(),
            Err(Error::WrongConcurrencyModel { container: "AsyncMap", .. })
        ));
        assert!(access.try_len().is_err());
        assert!(access.try_set("a".into(), 1).is_err());
    }
}
