use std::collections::BTreeMap;

use crate::value::Value;

/// The positional and named arguments of one call.
///
/// Named arguments are kept sorted by name, so the order in which they were
/// given never influences cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Args {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Add a named argument, replacing an earlier one with the same name.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Append a positional argument in place.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.positional.push(value.into());
    }

    /// Add a named argument in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.named.insert(name.into(), value.into());
    }

    /// The positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// The named arguments, sorted by name.
    pub fn named_args(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// The positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// The named argument called `name`.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// The total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Whether there are no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The arguments as a single value: a tuple of the positional tuple and a
    /// frozen set of `(name, value)` pairs.
    pub(crate) fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::Tuple(self.positional.clone()),
            Value::FrozenSet(
                self.named
                    .iter()
                    .map(|(name, value)| {
                        Value::Tuple(vec![Value::Str(name.clone()), value.clone()])
                    })
                    .collect(),
            ),
        ])
    }

    /// Find the first argument that cannot be hashed.
    ///
    /// Returns a label for the argument (`#index` for positional ones, the
    /// name for named ones) and the kind of the offending value.
    pub(crate) fn find_unhashable(&self) -> Option<(String, &'static str)> {
        let positional = self.positional.iter().enumerate().find_map(|(i, value)| {
            value.find_unhashable().map(|bad| (format!("#{i}"), bad.kind()))
        });

        positional.or_else(|| {
            self.named.iter().find_map(|(name, value)| {
                value.find_unhashable().map(|bad| (name.clone(), bad.kind()))
            })
        })
    }
}

/// Build an [`Args`] list.
///
/// Positional arguments come first, named ones follow after a semicolon.
///
/// ```
/// use veritas::args;
///
/// let args = args![1, "two"; noise = 99];
/// assert_eq!(args.len(), 3);
/// assert_eq!(args.get_named("noise").and_then(|v| v.as_int()), Some(99));
/// ```
#[macro_export]
macro_rules! args {
    ($($value:expr),* $(,)? $(; $($name:ident = $named:expr),* $(,)?)?) => {{
        #[allow(unused_mut)]
        let mut args = $crate::Args::new();
        $(args.push($value);)*
        $($(args.insert(::core::stringify!($name), $named);)*)?
        args
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_order_does_not_matter() {
        let a = Args::new().named("a", 1).named("b", 2);
        let b = Args::new().named("b", 2).named("a", 1);
        assert_eq!(a, b);
        assert_eq!(a.to_value(), b.to_value());
    }

    #[test]
    fn macro_builds_both_kinds() {
        let args = args![2, 5; shared = "x"];
        assert_eq!(args.positional(), &[Value::Int(2), Value::Int(5)]);
        assert_eq!(args.get_named("shared"), Some(&Value::from("x")));
        assert!(args![].is_empty());
    }

    #[test]
    fn unhashable_positional_is_labelled_by_index() {
        let args = args![1, vec![2, 3]];
        assert_eq!(args.find_unhashable(), Some(("#1".into(), "list")));
    }

    #[test]
    fn unhashable_named_is_labelled_by_name() {
        let args = args![1; data = vec![2, 3]];
        assert_eq!(args.find_unhashable(), Some(("data".into(), "list")));
        assert_eq!(args![1; data = (2, 3)].find_unhashable(), None);
    }
}
