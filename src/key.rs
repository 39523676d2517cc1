use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use siphasher::sip128::{Hasher128, SipHasher13};

use crate::args::Args;
use crate::error::{Error, Result};
use crate::signature::FnMeta;
use crate::value::Value;

/// A cache key derived from a call's arguments.
///
/// Carries the normalized key material together with its precomputed 128-bit
/// hash. Hashing a key only writes the precomputed hash. Equality compares
/// the hashes first and then the material, so two logically different calls
/// never share a key, even on a hash collision.
#[derive(Clone)]
pub struct CacheKey {
    hash: u128,
    repr: Value,
}

impl CacheKey {
    /// Hash key material. The material must be hashable.
    pub(crate) fn new(repr: Value) -> Self {
        let mut state = SipHasher13::new();
        repr.hash(&mut state);
        Self { hash: state.finish128().as_u128(), repr }
    }

    /// The precomputed hash.
    pub fn hash128(&self) -> u128 {
        self.hash
    }

    /// The key material.
    pub fn repr(&self) -> &Value {
        &self.repr
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u128(self.hash);
    }
}

impl Eq for CacheKey {}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.repr == other.repr
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "CacheKey({:032x}, {:?})", self.hash, self.repr)
    }
}

/// A map keyed by [`CacheKey`] that reuses the precomputed hash.
pub(crate) type KeyMap<V> = HashMap<CacheKey, V, BuildKeyHasher>;

#[derive(Copy, Clone, Default)]
pub(crate) struct BuildKeyHasher;

impl BuildHasher for BuildKeyHasher {
    type Hasher = KeyHasher;

    fn build_hasher(&self) -> KeyHasher {
        KeyHasher::default()
    }
}

/// Folds the 128-bit key hash into 64 bits.
#[derive(Default)]
pub(crate) struct KeyHasher {
    value: u64,
}

impl Hasher for KeyHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.value
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.value = self.value.rotate_left(8) ^ u64::from(byte);
        }
    }

    #[inline]
    fn write_u128(&mut self, i: u128) {
        self.value ^= (i as u64) ^ ((i >> 64) as u64);
    }
}

/// Computes a key from the arguments of a call.
pub type KeyFn = Arc<dyn Fn(&Args) -> Value + Send + Sync>;

/// How a call's arguments are reduced to a cache key.
#[derive(Clone, Default)]
pub enum KeyPolicy {
    /// Hash all positional and named arguments.
    #[default]
    Default,
    /// Key by the named parameters only, in the given order, after binding
    /// the call against the function's signature.
    Fields(Vec<String>),
    /// Key by the result of a function of the arguments.
    Custom(KeyFn),
}

impl KeyPolicy {
    /// Key by the given parameter names.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Key by the result of `f`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Args) -> Value + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl Debug for KeyPolicy {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Default => f.pad("Default"),
            Self::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Self::Custom(_) => f.pad("Custom(..)"),
        }
    }
}

/// Build a policy from a dynamic configuration value.
///
/// `None` selects the default policy and a list or tuple of strings selects
/// explicit fields. Custom key functions cannot be expressed as values.
impl TryFrom<Value> for KeyPolicy {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidKeyConfiguration { reason };
        match value {
            Value::None => Ok(Self::Default),
            Value::List(items) | Value::Tuple(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Str(field) => Ok(field),
                    other => Err(invalid(format!(
                        "key fields must be strings, found {}",
                        other.kind()
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Fields),
            other => Err(invalid(format!(
                "expected no key, a list of field names or a function, found {}",
                other.kind()
            ))),
        }
    }
}

/// Configuration of a memoized function.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// The key policy.
    pub key: KeyPolicy,
    /// Fall back to structural hashing when the default policy meets
    /// arguments that cannot be hashed.
    pub experimental: bool,
}

impl CacheOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key policy.
    pub fn key(mut self, key: KeyPolicy) -> Self {
        self.key = key;
        self
    }

    /// Toggle experimental hashing.
    pub fn experimental(mut self, experimental: bool) -> Self {
        self.experimental = experimental;
        self
    }
}

/// Turns calls into cache keys under one fixed policy.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    options: CacheOptions,
}

impl KeyBuilder {
    /// Validate the options and create a builder.
    pub fn new(options: CacheOptions) -> Result<Self> {
        if let KeyPolicy::Fields(fields) = &options.key {
            if fields.is_empty() {
                return Err(Error::InvalidKeyConfiguration {
                    reason: "the list of key fields is empty".into(),
                });
            }

            if let Some(field) = fields.iter().find(|field| field.is_empty()) {
                return Err(Error::InvalidKeyConfiguration {
                    reason: format!("invalid key field name `{field}`"),
                });
            }
        }

        Ok(Self { options })
    }

    /// The options this builder was created with.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Compute the key of a call to the function described by `meta`.
    pub fn build(&self, meta: &FnMeta, args: &Args) -> Result<CacheKey> {
        let repr = match &self.options.key {
            KeyPolicy::Default => self.default_key(args)?,
            KeyPolicy::Fields(fields) => field_key(meta, fields, args)?,
            KeyPolicy::Custom(f) => {
                let repr = f(args);
                ensure_hashable("key", &repr)?;
                repr
            }
        };

        Ok(CacheKey::new(repr))
    }

    fn default_key(&self, args: &Args) -> Result<Value> {
        let repr = args.to_value();
        match args.find_unhashable() {
            None => Ok(repr),
            Some(_) if self.options.experimental => Ok(repr.normalized()),
            Some((argument, kind)) => Err(Error::UnhashableArguments { argument, kind }),
        }
    }
}

fn field_key(meta: &FnMeta, fields: &[String], args: &Args) -> Result<Value> {
    let bound = meta.signature().bind(meta.name(), args)?;
    let values = fields
        .iter()
        .map(|field| {
            let value = bound
                .get(field)
                .ok_or_else(|| Error::MissingKeyField { field: field.clone() })?;
            ensure_hashable(field, value)?;
            Ok(value.clone())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Value::Tuple(values))
}

fn ensure_hashable(label: &str, value: &Value) -> Result<()> {
    match value.find_unhashable() {
        Some(bad) => Err(Error::UnhashableArguments {
            argument: label.into(),
            kind: bad.kind(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::args;
    use crate::signature::Param;

    fn builder(options: CacheOptions) -> KeyBuilder {
        KeyBuilder::new(options).unwrap()
    }

    fn increment() -> FnMeta {
        FnMeta::new("increment")
            .with_param(Param::new("x"))
            .with_param(Param::with_default("noise", 0))
    }

    #[test]
    fn default_policy_is_deterministic() {
        let keys = builder(CacheOptions::new());
        let meta = FnMeta::new("multiply");
        let a = keys.build(&meta, &args![2, 5]).unwrap();
        let b = keys.build(&meta, &args![2, 5]).unwrap();
        let c = keys.build(&meta, &args![5, 2]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn default_policy_distinguishes_named_from_positional() {
        let keys = builder(CacheOptions::new());
        let meta = FnMeta::new("f");
        let positional = keys.build(&meta, &args![1]).unwrap();
        let named = keys.build(&meta, &args![; x = 1]).unwrap();
        assert_ne!(positional, named);
    }

    #[test]
    fn default_policy_rejects_lists() {
        let keys = builder(CacheOptions::new());
        let err = keys.build(&FnMeta::new("flatten"), &args![vec![1, 2, 3]]).unwrap_err();
        assert_eq!(err, Error::UnhashableArguments { argument: "#0".into(), kind: "list" });
    }

    #[test]
    fn experimental_policy_hashes_lists() {
        let keys = builder(CacheOptions::new().experimental(true));
        let meta = FnMeta::new("flatten");
        let a = keys.build(&meta, &args![vec![1, 2, 3]]).unwrap();
        let b = keys.build(&meta, &args![vec![1, 2, 3]]).unwrap();
        let c = keys.build(&meta, &args![vec![4, 5, 6]]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn field_policy_ignores_other_arguments() {
        let keys = builder(CacheOptions::new().key(KeyPolicy::fields(["x"])));
        let meta = increment();
        let a = keys.build(&meta, &args![1; noise = 99]).unwrap();
        let b = keys.build(&meta, &args![1; noise = 100]).unwrap();
        let c = keys.build(&meta, &args![; x = 1]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.repr(), &Value::Tuple(vec![Value::Int(1)]));
    }

    #[test]
    fn field_policy_applies_defaults() {
        let keys = builder(CacheOptions::new().key(KeyPolicy::fields(["noise", "x"])));
        let key = keys.build(&increment(), &args![3]).unwrap();
        assert_eq!(key.repr(), &Value::from((0, 3)));
    }

    #[test]
    fn field_policy_reports_missing_fields() {
        let keys = builder(CacheOptions::new().key(KeyPolicy::fields(["y"])));
        let err = keys.build(&increment(), &args![1]).unwrap_err();
        assert_eq!(err, Error::MissingKeyField { field: "y".into() });

        let keys = builder(CacheOptions::new().key(KeyPolicy::fields(["x"])));
        let err = keys.build(&increment(), &args![; noise = 1]).unwrap_err();
        assert_eq!(err, Error::MissingKeyField { field: "x".into() });
    }

    #[test]
    fn custom_policy_uses_function_output() {
        let keys = builder(CacheOptions::new().key(KeyPolicy::custom(|args| {
            args.get(0).and_then(Value::as_int).map(|v| v % 2).into()
        })));
        let meta = FnMeta::new("parity");
        let a = keys.build(&meta, &args![1]).unwrap();
        let b = keys.build(&meta, &args![3]).unwrap();
        let c = keys.build(&meta, &args![4]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let keys = builder(CacheOptions::new().key(KeyPolicy::custom(|_| vec![1].into())));
        assert!(matches!(
            keys.build(&meta, &args![]),
            Err(Error::UnhashableArguments { .. })
        ));
    }

    #[test]
    fn invalid_configurations() {
        assert!(matches!(
            KeyBuilder::new(CacheOptions::new().key(KeyPolicy::Fields(vec![]))),
            Err(Error::InvalidKeyConfiguration { .. })
        ));
        assert!(matches!(
            KeyPolicy::try_from(Value::Int(5)),
            Err(Error::InvalidKeyConfiguration { .. })
        ));
        assert!(matches!(
            KeyPolicy::try_from(Value::from(vec![Value::from("x"), Value::Int(1)])),
            Err(Error::InvalidKeyConfiguration { .. })
        ));
        assert!(matches!(KeyPolicy::try_from(Value::None), Ok(KeyPolicy::Default)));
        assert!(matches!(
            KeyPolicy::try_from(Value::from(vec!["x"])),
            Ok(KeyPolicy::Fields(fields)) if fields == ["x"]
        ));
    }

    #[test]
    fn keys_hash_through_key_map() {
        let keys = builder(CacheOptions::new());
        let meta = FnMeta::new("f");
        let mut map = KeyMap::default();
        map.insert(keys.build(&meta, &args![1]).unwrap(), "one");
        map.insert(keys.build(&meta, &args![2]).unwrap(), "two");
        assert_eq!(map.get(&keys.build(&meta, &args![1]).unwrap()), Some(&"one"));
        assert_eq!(map.len(), 2);
    }

    #[quickcheck]
    fn experimental_keys_ignore_map_insertion_order(pairs: Vec<(i64, String)>) -> bool {
        let keys = builder(CacheOptions::new().experimental(true));
        let meta = FnMeta::new("f");
        let unique: HashMap<i64, String> = pairs.into_iter().collect();
        let mut entries: Vec<_> = unique.into_iter().collect();
        let forward: HashMap<_, _> = entries.iter().cloned().collect();
        entries.reverse();
        let backward: HashMap<_, _> = entries.into_iter().collect();
        keys.build(&meta, &args![forward]).unwrap()
            == keys.build(&meta, &args![backward]).unwrap()
    }

    #[quickcheck]
    fn equal_hashable_arguments_give_equal_keys(a: Vec<i64>, b: String) -> bool {
        let keys = builder(CacheOptions::new());
        let meta = FnMeta::new("f");
        let tuple = Value::Tuple(a.into_iter().map(Value::from).collect());
        keys.build(&meta, &args![tuple.clone(); b = b.clone()]).unwrap()
            == keys.build(&meta, &args![tuple; b = b]).unwrap()
    }
}
