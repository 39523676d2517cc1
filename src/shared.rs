use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::error::Result;
use crate::signature::ConcurrencyModel;
use crate::value::Value;

/// A value that can be declared as a function's shared state.
///
/// Synchronized containers report the concurrency model their locking is
/// built for. Everything else reports `None` and is rejected by the guard
/// unless unsafe mode is requested.
pub trait SharedState: Any + Send + Sync {
    /// The model under which this container may be shared.
    fn model(&self) -> Option<ConcurrencyModel>;

    /// A human-readable name for diagnostics.
    fn type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// A type-erased handle to shared state.
#[derive(Clone)]
pub struct Shared(Arc<dyn SharedState>);

impl Shared {
    /// Wrap a container.
    pub fn new(state: impl SharedState) -> Self {
        Self(Arc::new(state))
    }

    /// The model under which the state may be shared, if any.
    pub fn model(&self) -> Option<ConcurrencyModel> {
        self.0.model()
    }

    /// The name of the state's type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Access the state as a concrete type.
    pub fn downcast_ref<T: SharedState>(&self) -> Option<&T> {
        let any: &dyn Any = &*self.0;
        any.downcast_ref()
    }

    /// Whether both handles point to the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Shared {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.type_name()).finish()
    }
}

/// Synchronous map access, shared by both map variants.
///
/// The blocking map always succeeds. The cooperative map fails every call
/// with [`WrongConcurrencyModel`](crate::Error::WrongConcurrencyModel), since
/// taking its lock synchronously would stall the scheduler driving it.
pub trait SyncAccess<K, V> {
    /// Read a value.
    fn try_get(&self, key: &K) -> Result<Option<V>>;

    /// Write a value, returning the previous one.
    fn try_set(&self, key: K, value: V) -> Result<Option<V>>;

    /// Remove a value.
    fn try_delete(&self, key: &K) -> Result<Option<V>>;

    /// Whether a key is present.
    fn try_contains(&self, key: &K) -> Result<bool>;

    /// A snapshot of all entries.
    fn try_items(&self) -> Result<Vec<(K, V)>>;

    /// Remove all entries.
    fn try_clear(&self) -> Result<()>;

    /// The number of entries.
    fn try_len(&self) -> Result<usize>;
}

impl SharedState for Value {
    fn model(&self) -> Option<ConcurrencyModel> {
        None
    }

    fn type_name(&self) -> &'static str {
        self.kind()
    }
}

impl<K, V, S> SharedState for HashMap<K, V, S>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    fn model(&self) -> Option<ConcurrencyModel> {
        None
    }
}

impl<K, V> SharedState for BTreeMap<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn model(&self) -> Option<ConcurrencyModel> {
        None
    }
}

impl<T: Send + Sync + 'static> SharedState for Vec<T> {
    fn model(&self) -> Option<ConcurrencyModel> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_containers_are_unsynchronized() {
        let shared = Shared::new(HashMap::<String, i64>::new());
        assert_eq!(shared.model(), None);
        assert!(shared.type_name().contains("HashMap"));
        assert_eq!(Shared::new(Value::from(vec![1])).type_name(), "list");
    }

    #[test]
    fn downcast_and_identity() {
        let shared = Shared::new(vec![1u8, 2, 3]);
        assert_eq!(shared.downcast_ref::<Vec<u8>>().map(Vec::len), Some(3));
        assert!(shared.downcast_ref::<Vec<u16>>().is_none());

        let copy = shared.clone();
        assert!(shared.ptr_eq(&copy));
        assert!(!shared.ptr_eq(&Shared::new(vec![1u8, 2, 3])));
    }
}
