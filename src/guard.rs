use crate::args::Args;
use crate::error::{Error, Result};
use crate::function::{Call, Function};
use crate::shared::Shared;
use crate::signature::{FnMeta, ParamDefault};

/// How a guard validates shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardOptions {
    /// Accept any default, or none at all.
    pub unsafe_shared: bool,
    /// The name of the parameter holding the shared state.
    pub param: &'static str,
}

impl GuardOptions {
    /// Validate the `shared` parameter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip validation.
    pub fn unchecked(mut self) -> Self {
        self.unsafe_shared = true;
        self
    }

    /// Validate a differently named parameter.
    pub fn param(mut self, param: &'static str) -> Self {
        self.param = param;
        self
    }
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self { unsafe_shared: false, param: "shared" }
    }
}

/// A function whose shared state was checked for concurrency safety when it
/// was wrapped.
///
/// The state is the declared default of the function's shared parameter. It
/// must be a container whose locking matches the function's concurrency
/// model: a blocking container for preemptible functions, a cooperative one
/// for cooperative functions. Calls pass straight through to the function.
#[derive(Debug, Clone)]
pub struct Guarded<F> {
    func: F,
    state: Option<Shared>,
}

impl<F: Function> Guarded<F> {
    /// Guard the `shared` parameter of a function.
    pub fn new(func: F) -> Result<Self> {
        Self::with_options(func, GuardOptions::default())
    }

    /// Guard a function with the given options.
    pub fn with_options(func: F, options: GuardOptions) -> Result<Self> {
        let state = extract(func.meta(), options)?;
        Ok(Self { func, state })
    }

    /// The validated shared state. `None` only in unsafe mode when the
    /// parameter has no default.
    pub fn state(&self) -> Option<&Shared> {
        self.state.as_ref()
    }

    /// The wrapped function.
    pub fn inner(&self) -> &F {
        &self.func
    }
}

impl<F: Function> Function for Guarded<F> {
    fn meta(&self) -> &FnMeta {
        self.func.meta()
    }
}

impl<F, Out> Call<Out> for Guarded<F>
where
    F: Call<Out>,
{
    fn call(&self, args: &Args) -> Out {
        self.func.call(args)
    }
}

/// Resolve and validate the declared shared state of a function.
fn extract(meta: &FnMeta, options: GuardOptions) -> Result<Option<Shared>> {
    let default = meta
        .signature()
        .get(options.param)
        .and_then(|param| param.default());

    let shared = match default {
        Some(ParamDefault::Shared(shared)) => shared.clone(),
        Some(ParamDefault::Value(value)) => Shared::new(value.clone()),
        None if options.unsafe_shared => return Ok(None),
        None => return Err(Error::MissingSharedArgument { param: options.param }),
    };

    let model = meta.model();
    if !options.unsafe_shared && shared.model() != Some(model) {
        return Err(Error::UnsafeSharedArgument {
            param: options.param,
            found: shared.type_name().into(),
            expected: format!("[{}]", model.sanctioned().join(", ")),
        });
    }

    tracing::debug!(
        function = meta.name(),
        param = options.param,
        state = shared.type_name(),
        unchecked = options.unsafe_shared,
        "shared state accepted"
    );

    Ok(Some(shared))
}
