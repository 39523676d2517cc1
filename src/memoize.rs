use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};

use crate::args::Args;
use crate::error::{Error, Result};
use crate::function::{Call, Function};
use crate::key::{CacheKey, CacheOptions, KeyBuilder, KeyMap};
use crate::signature::FnMeta;

/// The global list of reset functions of macro-generated caches.
static RESETS: RwLock<Vec<fn()>> = RwLock::new(Vec::new());

/// Clear every cache created by [`#[memoize]`](macro@crate::memoize).
///
/// Caches of [`Memoized`] and [`AsyncMemoized`] wrappers are owned by their
/// wrapper and cleared through it.
pub fn reset() {
    let resets = RESETS.read();
    for reset in resets.iter() {
        reset();
    }
    tracing::debug!(caches = resets.len(), "reset memoized functions");
}

/// Register a reset function in the global list.
pub fn register_reset(reset: fn()) {
    RESETS.write().push(reset);
}

/// A once-initialized result slot.
trait Slot: Default {
    /// Whether a result has been stored.
    fn is_set(&self) -> bool;
}

impl<T> Slot for once_cell::sync::OnceCell<T> {
    fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

impl<T> Slot for tokio::sync::OnceCell<T> {
    fn is_set(&self) -> bool {
        self.initialized()
    }
}

/// Maps keys to result slots.
///
/// The map's lock is only held to look up or create a slot. Computing a
/// result happens under the slot's own initialization lock, so concurrent
/// misses on one key compute once while misses on other keys proceed.
struct Store<C> {
    slots: Mutex<KeyMap<Arc<C>>>,
}

impl<C: Slot> Store<C> {
    fn new() -> Self {
        Self { slots: Mutex::new(KeyMap::default()) }
    }

    /// The slot for a key, created empty if missing.
    fn slot(&self, key: CacheKey) -> Pending<'_, C> {
        let slot = Arc::clone(self.slots.lock().entry(key.clone()).or_default());
        Pending { store: self, key, slot }
    }

    /// Remove a slot that is still empty and that no other caller holds.
    fn discard(&self, key: &CacheKey, slot: &Arc<C>) {
        let mut slots = self.slots.lock();
        if slots.get(key).is_some_and(|held| Arc::ptr_eq(held, slot))
            && !slot.is_set()
            && Arc::strong_count(slot) == 2
        {
            slots.remove(key);
        }
    }

    fn contains(&self, key: &CacheKey) -> bool {
        self.slots.lock().get(key).is_some_and(|slot| slot.is_set())
    }

    fn len(&self) -> usize {
        self.slots.lock().values().filter(|slot| slot.is_set()).count()
    }

    /// Drop all slots. Computations still in flight finish into their
    /// detached slot and are not stored.
    fn clear(&self) {
        self.slots.lock().clear();
    }
}

/// A slot handed out by a [`Store`].
///
/// If the slot is still empty when the last caller lets go of it, because
/// the computation failed, panicked or was cancelled, it is removed again.
struct Pending<'a, C: Slot> {
    store: &'a Store<C>,
    key: CacheKey,
    slot: Arc<C>,
}

impl<C: Slot> Deref for Pending<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.slot
    }
}

impl<C: Slot> Drop for Pending<'_, C> {
    fn drop(&mut self) {
        if !self.slot.is_set() {
            self.store.discard(&self.key, &self.slot);
        }
    }
}

/// Record the outcome of a lookup.
fn record(meta: &FnMeta, missed: bool) {
    if missed {
        #[cfg(feature = "testing")]
        crate::testing::register_miss();
    } else {
        tracing::trace!(function = meta.name(), "cache hit");
        #[cfg(feature = "testing")]
        crate::testing::register_hit();
    }
}

/// The entry store of one memoized function, for preemptible callers.
pub struct Cache<Out> {
    keys: KeyBuilder,
    store: Store<once_cell::sync::OnceCell<Out>>,
}

impl<Out: Clone> Cache<Out> {
    /// Create an empty cache.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Ok(Self::with_keys(KeyBuilder::new(options)?))
    }

    /// Create an empty cache with a prepared key builder.
    pub fn with_keys(keys: KeyBuilder) -> Self {
        Self { keys, store: Store::new() }
    }

    /// Return the stored result for a call, or compute and store it.
    ///
    /// Concurrent misses on the same key run `f` exactly once. The other
    /// callers wait for and return that result. If `f` panics, nothing is
    /// stored and the next caller computes again.
    pub fn get_or_compute<F>(&self, meta: &FnMeta, args: &Args, f: F) -> Result<Out>
    where
        F: FnOnce() -> Out,
    {
        let slot = self.store.slot(self.keys.build(meta, args)?);
        let mut missed = false;
        let output = slot
            .get_or_init(|| {
                missed = true;
                tracing::debug!(function = meta.name(), "cache miss");
                f()
            })
            .clone();
        record(meta, missed);
        Ok(output)
    }

    /// Like [`get_or_compute`](Self::get_or_compute), for fallible functions.
    ///
    /// Errors are returned to the caller and not stored.
    pub fn try_get_or_compute<F, E>(&self, meta: &FnMeta, args: &Args, f: F) -> Result<Out, E>
    where
        F: FnOnce() -> Result<Out, E>,
        E: From<Error>,
    {
        let slot = self.store.slot(self.keys.build(meta, args)?);
        let mut missed = false;
        let output = slot
            .get_or_try_init(|| {
                missed = true;
                tracing::debug!(function = meta.name(), "cache miss");
                f()
            })?
            .clone();
        record(meta, missed);
        Ok(output)
    }

    /// The key a call would be stored under.
    pub fn key(&self, meta: &FnMeta, args: &Args) -> Result<CacheKey> {
        self.keys.build(meta, args)
    }

    /// Whether a result is stored for `key`.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    /// The number of stored results.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no results are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all stored results.
    pub fn clear(&self) {
        self.store.clear();
    }
}

/// The entry store of one memoized function, for cooperative callers.
pub struct AsyncCache<Out> {
    keys: KeyBuilder,
    store: Store<tokio::sync::OnceCell<Out>>,
}

impl<Out: Clone> AsyncCache<Out> {
    /// Create an empty cache.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Ok(Self::with_keys(KeyBuilder::new(options)?))
    }

    /// Create an empty cache with a prepared key builder.
    pub fn with_keys(keys: KeyBuilder) -> Self {
        Self { keys, store: Store::new() }
    }

    /// Return the stored result for a call, or compute and store it.
    ///
    /// Concurrent misses on the same key await a single computation. If the
    /// computing future is dropped before it finishes, the next waiter takes
    /// over.
    pub async fn get_or_compute<F, Fut>(&self, meta: &FnMeta, args: &Args, f: F) -> Result<Out>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Out>,
    {
        let slot = self.store.slot(self.keys.build(meta, args)?);
        let mut missed = false;
        let output = slot
            .get_or_init(|| {
                missed = true;
                tracing::debug!(function = meta.name(), "cache miss");
                f()
            })
            .await
            .clone();
        record(meta, missed);
        Ok(output)
    }

    /// Like [`get_or_compute`](Self::get_or_compute), for fallible functions.
    pub async fn try_get_or_compute<F, Fut, E>(
        &self,
        meta: &FnMeta,
        args: &Args,
        f: F,
    ) -> Result<Out, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Out, E>>,
        E: From<Error>,
    {
        let slot = self.store.slot(self.keys.build(meta, args)?);
        let mut missed = false;
        let output = slot
            .get_or_try_init(|| {
                missed = true;
                tracing::debug!(function = meta.name(), "cache miss");
                f()
            })
            .await?
            .clone();
        record(meta, missed);
        Ok(output)
    }

    /// The key a call would be stored under.
    pub fn key(&self, meta: &FnMeta, args: &Args) -> Result<CacheKey> {
        self.keys.build(meta, args)
    }

    /// Whether a result is stored for `key`.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    /// The number of stored results.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no results are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all stored results.
    pub fn clear(&self) {
        self.store.clear();
    }
}

/// A memoized preemptible function.
///
/// Every call derives a key from its arguments and either returns the stored
/// result or runs the wrapped function and stores what it returns. The
/// wrapper reports the wrapped function's metadata as its own.
pub struct Memoized<F, Out> {
    func: F,
    cache: Cache<Out>,
}

impl<F: Function, Out: Clone> Memoized<F, Out> {
    /// Memoize a function with the default key policy.
    pub fn new(func: F) -> Self {
        Self { func, cache: Cache::with_keys(KeyBuilder::default()) }
    }

    /// Memoize a function with the given options.
    pub fn with_options(func: F, options: CacheOptions) -> Result<Self> {
        Ok(Self { func, cache: Cache::new(options)? })
    }

    /// Call the function, or return the stored result.
    pub fn call(&self, args: &Args) -> Result<Out>
    where
        F: Call<Out>,
    {
        self.cache.get_or_compute(self.func.meta(), args, || self.func.call(args))
    }

    /// Call a fallible function. Errors are not stored.
    pub fn try_call<E>(&self, args: &Args) -> Result<Out, E>
    where
        F: Call<Result<Out, E>>,
        E: From<Error>,
    {
        self.cache
            .try_get_or_compute(self.func.meta(), args, || self.func.call(args))
    }

    /// Whether a result is stored for these arguments.
    pub fn contains(&self, args: &Args) -> Result<bool> {
        Ok(self.cache.contains_key(&self.key(args)?))
    }

    /// The key these arguments map to.
    pub fn key(&self, args: &Args) -> Result<CacheKey> {
        self.cache.key(self.func.meta(), args)
    }

    /// The underlying store.
    pub fn cache(&self) -> &Cache<Out> {
        &self.cache
    }

    /// The number of stored results.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no results are stored.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// The wrapped function.
    pub fn inner(&self) -> &F {
        &self.func
    }

    /// Remove all stored results.
    pub fn clear(&self) {
        self.cache.clear();
        tracing::debug!(function = self.func.meta().name(), "cache cleared");
    }
}

impl<F: Function, Out> Function for Memoized<F, Out> {
    fn meta(&self) -> &FnMeta {
        self.func.meta()
    }
}

impl<F, Out> Call<Result<Out>> for Memoized<F, Out>
where
    F: Call<Out>,
    Out: Clone,
{
    fn call(&self, args: &Args) -> Result<Out> {
        Memoized::call(self, args)
    }
}

/// A memoized cooperative function.
pub struct AsyncMemoized<F, Out> {
    func: F,
    cache: AsyncCache<Out>,
}

impl<F: Function, Out: Clone> AsyncMemoized<F, Out> {
    /// Memoize a function with the default key policy.
    pub fn new(func: F) -> Self {
        Self {
            func,
            cache: AsyncCache::with_keys(KeyBuilder::default()),
        }
    }

    /// Memoize a function with the given options.
    pub fn with_options(func: F, options: CacheOptions) -> Result<Self> {
        Ok(Self { func, cache: AsyncCache::new(options)? })
    }

    /// Call the function, or return the stored result.
    pub async fn call<Fut>(&self, args: &Args) -> Result<Out>
    where
        F: Call<Fut>,
        Fut: Future<Output = Out>,
    {
        self.cache
            .get_or_compute(self.func.meta(), args, || self.func.call(args))
            .await
    }

    /// Call a fallible function. Errors are not stored.
    pub async fn try_call<Fut, E>(&self, args: &Args) -> Result<Out, E>
    where
        F: Call<Fut>,
        Fut: Future<Output = Result<Out, E>>,
        E: From<Error>,
    {
        self.cache
            .try_get_or_compute(self.func.meta(), args, || self.func.call(args))
            .await
    }

    /// Whether a result is stored for these arguments.
    pub fn contains(&self, args: &Args) -> Result<bool> {
        Ok(self.cache.contains_key(&self.key(args)?))
    }

    /// The key these arguments map to.
    pub fn key(&self, args: &Args) -> Result<CacheKey> {
        self.cache.key(self.func.meta(), args)
    }

    /// The underlying store.
    pub fn cache(&self) -> &AsyncCache<Out> {
        &self.cache
    }

    /// The number of stored results.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether no results are stored.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// The wrapped function.
    pub fn inner(&self) -> &F {
        &self.func
    }

    /// Remove all stored results.
    pub fn clear(&self) {
        self.cache.clear();
        tracing::debug!(function = self.func.meta().name(), "cache cleared");
    }
}

impl<F: Function, Out> Function for AsyncMemoized<F, Out> {
    fn meta(&self) -> &FnMeta {
        self.func.meta()
    }
}

/// The cache of a function annotated with `#[memoize]`.
pub struct StaticCache<Out: 'static>(LazyLock<StaticData<Out>>);

impl<Out: 'static> StaticCache<Out> {
    /// Create a lazily initialized cache.
    ///
    /// It must take an initialization function pointer so that the generated
    /// static can register its reset hook from within the initializer.
    pub const fn new(init: fn() -> StaticData<Out>) -> Self {
        Self(LazyLock::new(init))
    }
}

impl<Out: Clone + 'static> StaticCache<Out> {
    /// Remove all stored results.
    pub fn clear(&self) {
        if let Ok(cache) = &self.0.cache {
            cache.clear();
        }
    }
}

/// The metadata and store of a `#[memoize]` function.
pub struct StaticData<Out> {
    meta: FnMeta,
    cache: Result<Cache<Out>>,
}

impl<Out: Clone> StaticData<Out> {
    /// Create the data. Invalid options surface as an error on every call.
    pub fn new(meta: FnMeta, options: CacheOptions) -> Self {
        Self { meta, cache: Cache::new(options) }
    }
}

/// Execute a `#[memoize]` function or use its stored result.
pub fn memoized<Out, F>(cache: &StaticCache<Out>, args: &Args, f: F) -> Result<Out>
where
    Out: Clone + 'static,
    F: FnOnce() -> Out,
{
    let data = &*cache.0;
    let store = data.cache.as_ref().map_err(Clone::clone)?;
    store.get_or_compute(&data.meta, args, f)
}
