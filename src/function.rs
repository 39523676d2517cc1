use std::fmt::{self, Debug, Formatter};

use crate::args::Args;
use crate::signature::FnMeta;

/// A function that carries its own metadata.
pub trait Function {
    /// The function's name, documentation, signature and concurrency model.
    fn meta(&self) -> &FnMeta;
}

/// A function callable with dynamic arguments.
///
/// Cooperative functions implement this with a future as output.
pub trait Call<Out>: Function {
    /// Invoke the function.
    fn call(&self, args: &Args) -> Out;
}

/// A closure together with its metadata.
///
/// ```
/// use veritas::{args, Call, FnMeta, Func, Param};
///
/// let multiply = Func::new(
///     FnMeta::new("multiply").with_param(Param::new("x")).with_param(Param::new("y")),
///     |args: &veritas::Args| {
///         let x = args.get(0).and_then(|v| v.as_int()).unwrap_or(0);
///         let y = args.get(1).and_then(|v| v.as_int()).unwrap_or(0);
///         x * y
///     },
/// );
/// assert_eq!(multiply.call(&args![2, 5]), 10);
/// ```
#[derive(Clone)]
pub struct Func<F> {
    meta: FnMeta,
    func: F,
}

impl<F> Func<F> {
    /// Attach metadata to a closure.
    pub fn new<Out>(meta: FnMeta, func: F) -> Self
    where
        F: Fn(&Args) -> Out,
    {
        Self { meta, func }
    }
}

impl<F> Function for Func<F> {
    fn meta(&self) -> &FnMeta {
        &self.meta
    }
}

impl<F, Out> Call<Out> for Func<F>
where
    F: Fn(&Args) -> Out,
{
    fn call(&self, args: &Args) -> Out {
        (self.func)(args)
    }
}

impl<F> Debug for Func<F> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("Func").field(&self.meta.name()).finish()
    }
}
