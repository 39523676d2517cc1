/*!
Memoization and shared-state guarding for concurrent functions.

A [`Memoized`] function stores its result per distinct argument set and
returns the stored result on later calls with equal arguments. Concurrent
callers that miss on the same key wait for a single computation.

A [`Guarded`] function declares the state it shares with other callers as the
default of a parameter. The guard checks, once, that this state is a container
whose locking suits the function: a [`SyncMap`] or [`SyncQueue`] for plain
functions, an [`AsyncMap`] or [`AsyncQueue`] for functions that return
futures.

# Example
```
use veritas::{args, Args, FnMeta, Func, Param, Memoized};

let multiply = Memoized::new(Func::new(
    FnMeta::new("multiply").with_param(Param::new("x")).with_param(Param::new("y")),
    |args: &Args| {
        let x = args.get(0).and_then(|v| v.as_int()).unwrap_or(0);
        let y = args.get(1).and_then(|v| v.as_int()).unwrap_or(0);
        x * y
    },
));

assert_eq!(multiply.call(&args![2, 5]), Ok(10));
assert!(multiply.contains(&args![2, 5]).unwrap());
```

With the `macros` feature, plain functions can be memoized in place:
```
#[veritas::memoize(key = [x])]
fn increment(x: i64, noise: i64) -> i64 {
    x + 1 + noise
}

assert_eq!(increment(1, 0), Ok(2));
// `noise` is not part of the key, so this is a hit.
assert_eq!(increment(1, 100), Ok(2));
```
*/

mod args;
mod async_map;
mod error;
mod function;
mod guard;
mod key;
mod memoize;
mod queue;
mod shared;
mod signature;
mod sync_map;
mod value;

#[cfg(feature = "testing")]
mod testing;

pub use crate::args::Args;
pub use crate::async_map::AsyncMap;
pub use crate::error::{Error, Result};
pub use crate::function::{Call, Func, Function};
pub use crate::guard::{GuardOptions, Guarded};
pub use crate::key::{CacheKey, CacheOptions, KeyBuilder, KeyFn, KeyPolicy};
pub use crate::memoize::{AsyncCache, AsyncMemoized, Cache, Memoized, reset};
pub use crate::queue::{AsyncQueue, SyncQueue};
pub use crate::shared::{Shared, SharedState, SyncAccess};
pub use crate::signature::{Bound, ConcurrencyModel, FnMeta, Param, ParamDefault, Signature};
pub use crate::sync_map::{SyncMap, SyncMapGuard};
pub use crate::value::Value;

#[cfg(feature = "macros")]
pub use veritas_macros::memoize;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    pub use crate::memoize::{StaticCache, StaticData, memoized, register_reset};

    #[cfg(feature = "testing")]
    pub use crate::testing::{last_was_hit, misses};
}
