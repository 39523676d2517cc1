use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};

/// A dynamically shaped argument value.
///
/// Scalars, tuples and frozen sets are hashable. Lists, maps and sets model
/// mutable containers: they can be passed to memoized functions, but the
/// default key policy refuses to hash them. See [`Value::normalized`] for the
/// structural normalization used by experimental hashing.
///
/// # Ordering, equality and hashing
/// Values of different kinds are never equal and order by kind. Floats compare
/// with [`f64::total_cmp`], so `NaN` equals itself and `-0.0` differs from
/// `0.0`. Equality, ordering and the structural `Hash` implementation agree
/// with each other.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// An immutable sequence.
    Tuple(Vec<Value>),
    /// An immutable set.
    FrozenSet(BTreeSet<Value>),
    /// A mutable sequence.
    List(Vec<Value>),
    /// A mutable mapping.
    Map(BTreeMap<Value, Value>),
    /// A mutable set.
    Set(BTreeSet<Value>),
}

impl Value {
    /// Create a byte string value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// The name of this value's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Tuple(_) => "tuple",
            Self::FrozenSet(_) => "frozenset",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
        }
    }

    /// Whether the value, including everything nested in it, is hashable.
    pub fn is_hashable(&self) -> bool {
        self.find_unhashable().is_none()
    }

    /// Find the first mutable container in the value, if any.
    pub(crate) fn find_unhashable(&self) -> Option<&Value> {
        match self {
            Self::List(_) | Self::Map(_) | Self::Set(_) => Some(self),
            Self::Tuple(items) => items.iter().find_map(Value::find_unhashable),
            Self::FrozenSet(items) => items.iter().find_map(Value::find_unhashable),
            _ => None,
        }
    }

    /// Recursively turn mutable containers into hashable ones.
    ///
    /// Maps become frozen sets of `(key, value)` tuples, lists and tuples
    /// become tuples and sets become frozen sets. Everything else is returned
    /// unchanged. The result is always hashable, but identity is lost: a list
    /// normalizes to the same value as an equal tuple.
    pub fn normalized(&self) -> Value {
        match self {
            Self::List(items) | Self::Tuple(items) => {
                Self::Tuple(items.iter().map(Value::normalized).collect())
            }
            Self::Set(items) | Self::FrozenSet(items) => {
                Self::FrozenSet(items.iter().map(Value::normalized).collect())
            }
            Self::Map(map) => Self::FrozenSet(
                map.iter()
                    .map(|(k, v)| Self::Tuple(vec![k.normalized(), v.normalized()]))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// The value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float. Integers are converted.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The items of a list or tuple.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Str(_) => 4,
            Self::Bytes(_) => 5,
            Self::Tuple(_) => 6,
            Self::FrozenSet(_) => 7,
            Self::List(_) => 8,
            Self::Map(_) => 9,
            Self::Set(_) => 10,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::None, Self::None) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Tuple(a), Self::Tuple(b)) | (Self::List(a), Self::List(b)) => a.cmp(b),
            (Self::FrozenSet(a), Self::FrozenSet(b)) | (Self::Set(a), Self::Set(b)) => {
                a.cmp(b)
            }
            (Self::Map(a), Self::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            Self::None => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
            Self::Bytes(v) => v.hash(state),
            Self::Tuple(v) | Self::List(v) => v.hash(state),
            Self::FrozenSet(v) | Self::Set(v) => v.hash(state),
            Self::Map(v) => v.hash(state),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::None => f.pad("None"),
            Self::Bool(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Float(v) => v.fmt(f),
            Self::Str(v) => v.fmt(f),
            Self::Bytes(v) => write!(f, "b{:?}", v),
            Self::Tuple(items) => {
                let mut tuple = f.debug_tuple("");
                for item in items {
                    tuple.field(item);
                }
                tuple.finish()
            }
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Set(items) => f.debug_set().entries(items).finish(),
            Self::FrozenSet(items) => {
                f.write_str("frozenset(")?;
                f.debug_set().entries(items).finish()?;
                f.write_str(")")
            }
        }
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::Int(v.into())
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
    fn from(v: &[T]) -> Self {
        Self::List(v.iter().cloned().map(Into::into).collect())
    }
}

impl<K: Into<Value>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(v: HashMap<K, V, S>) -> Self {
        Self::Map(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(v: BTreeMap<K, V>) -> Self {
        Self::Map(v.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<T: Into<Value>, S> From<HashSet<T, S>> for Value {
    fn from(v: HashSet<T, S>) -> Self {
        Self::Set(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(v: BTreeSet<T>) -> Self {
        Self::Set(v.into_iter().map(Into::into).collect())
    }
}

macro_rules! from_tuple {
    ($($param:tt $idx:tt),*) => {
        #[allow(unused_variables)]
        impl<$($param: Into<Value>),*> From<($($param,)*)> for Value {
            fn from(v: ($($param,)*)) -> Self {
                Self::Tuple(vec![$(v.$idx.into()),*])
            }
        }
    };
}

from_tuple! {}
from_tuple! { A 0 }
from_tuple! { A 0, B 1 }
from_tuple! { A 0, B 1, C 2 }
from_tuple! { A 0, B 1, C 2, D 3 }
from_tuple! { A 0, B 1, C 2, D 3, E 4 }
from_tuple! { A 0, B 1, C 2, D 3, E 4, F 5 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashability() {
        assert!(Value::from(1).is_hashable());
        assert!(Value::from((1, "a")).is_hashable());
        assert!(!Value::from(vec![1, 2]).is_hashable());
        assert!(!Value::Tuple(vec![Value::from(1), Value::from(vec![2])]).is_hashable());
        assert_eq!(
            Value::Tuple(vec![Value::from(1), Value::from(HashSet::from([2]))])
                .find_unhashable()
                .map(Value::kind),
            Some("set"),
        );
    }

    #[test]
    fn normalized_is_hashable() {
        let nested = Value::from(vec![
            Value::from(HashMap::from([("a", vec![1, 2])])),
            Value::from(BTreeSet::from([3])),
        ]);
        assert!(!nested.is_hashable());
        assert!(nested.normalized().is_hashable());
    }

    #[test]
    fn list_and_tuple_normalize_alike() {
        assert_eq!(Value::from(vec![1, 2, 3]).normalized(), Value::from((1, 2, 3)));
        assert_ne!(Value::from(vec![1, 2, 3]), Value::from((1, 2, 3)));
    }

    #[test]
    fn kinds_do_not_mix() {
        assert_ne!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(false), Value::from(0));
        assert!(Value::None < Value::from(false));
    }

    #[test]
    fn floats_compare_totally() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
    }

    #[test]
    fn debug_output() {
        assert_eq!(format!("{:?}", Value::from(vec![1, 2])), "[1, 2]");
        assert_eq!(format!("{:?}", Value::from(("a", None::<i64>))), "(\"a\", None)");
        assert_eq!(format!("{:?}", Value::from(Some(3))), "3");
    }
}
