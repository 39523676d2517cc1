use crate::signature::ConcurrencyModel;

/// A specialized result type for veritas operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building cache keys or guarding shared state.
///
/// Key errors are raised when a memoized function is called, guard errors when
/// a function is wrapped. None of them are logged by the library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The default key policy was given an argument that cannot be hashed.
    #[error(
        "unhashable argument `{argument}` of kind {kind} passed to cache, \
         enable experimental hashing or provide a custom key"
    )]
    UnhashableArguments {
        /// The argument's position or name.
        argument: String,
        /// The kind of the offending value.
        kind: &'static str,
    },

    /// A key field could neither be found in the call nor in the defaults.
    #[error("missing argument `{field}` for cache key computation")]
    MissingKeyField {
        /// The unresolved field.
        field: String,
    },

    /// The key configuration is neither unset, a field list, nor a function.
    #[error("invalid key configuration: {reason}")]
    InvalidKeyConfiguration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// The call's arguments do not fit the declared signature.
    #[error("cannot bind arguments to `{function}`: {reason}")]
    InvalidArguments {
        /// The function's name.
        function: String,
        /// Why binding failed.
        reason: String,
    },

    /// The guarded function declares no default for its shared parameter.
    #[error("no `{param}` default provided, or not set, use unsafe mode to bypass")]
    MissingSharedArgument {
        /// The name of the shared-state parameter.
        param: &'static str,
    },

    /// The shared default is not a sanctioned container for the function.
    #[error(
        "`{param}` must be one of {expected} but got {found}, \
         use unsafe mode to bypass this check"
    )]
    UnsafeSharedArgument {
        /// The name of the shared-state parameter.
        param: &'static str,
        /// The type that was declared.
        found: String,
        /// The container kinds that would have been accepted.
        expected: String,
    },

    /// A container was used outside of the concurrency model it supports.
    #[error("{container} requires a {expected} context and cannot be used synchronously")]
    WrongConcurrencyModel {
        /// The container's type.
        container: &'static str,
        /// The model the container requires.
        expected: ConcurrencyModel,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhashable_display_names_argument() {
        let err = Error::UnhashableArguments { argument: "#0".into(), kind: "list" };
        let msg = err.to_string();
        assert!(msg.contains("`#0`"));
        assert!(msg.contains("list"));
        assert!(msg.contains("experimental"));
    }

    #[test]
    fn unsafe_shared_display_lists_expected_kinds() {
        let err = Error::UnsafeSharedArgument {
            param: "shared",
            found: "HashMap".into(),
            expected: "[SyncMap, SyncQueue]".into(),
        };
        assert_eq!(
            err.to_string(),
            "`shared` must be one of [SyncMap, SyncQueue] but got HashMap, \
             use unsafe mode to bypass this check"
        );
    }

    #[test]
    fn wrong_model_display() {
        let err = Error::WrongConcurrencyModel {
            container: "AsyncMap",
            expected: ConcurrencyModel::Cooperative,
        };
        assert_eq!(
            err.to_string(),
            "AsyncMap requires a cooperative context and cannot be used synchronously"
        );
    }
}
