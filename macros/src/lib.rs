extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("veritas: ", $fmt) $($tts)*)
        ))
    }
}

mod memoize;
mod utils;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, Result, parse_quote};

/// Memoize a function.
///
/// The function's body runs once per distinct argument set. Later calls with
/// equal arguments return a clone of the stored result. The function's return
/// type is wrapped in `veritas::Result`, since deriving the key can fail.
///
/// Every parameter type must convert into a `veritas::Value`, and the return
/// type must be `Clone + Send + Sync`.
///
/// By default, all arguments form the key. A subset can be selected with
/// `key = [..]`, and `experimental` makes unhashable arguments such as
/// vectors and maps usable by keying on their normalized structure.
///
/// ```ignore
/// /// The frame at which a counter crosses a threshold.
/// #[veritas::memoize(key = [limit])]
/// fn crossing(limit: i64, step: i64) -> i64 {
///     let step = step.max(1);
///     (limit + step - 1) / step
/// }
///
/// #[veritas::memoize(experimental)]
/// fn total(values: Vec<i64>) -> i64 {
///     values.iter().sum()
/// }
///
/// assert_eq!(crossing(10, 3), Ok(4));
/// assert_eq!(total(vec![1, 2, 3]), Ok(6));
/// ```
#[proc_macro_attribute]
pub fn memoize(attr: TokenStream, stream: TokenStream) -> TokenStream {
    let meta = syn::parse_macro_input!(attr as memoize::Meta);
    let func = syn::parse_macro_input!(stream as syn::ItemFn);
    memoize::expand(meta, func)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
