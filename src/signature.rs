use std::fmt::{self, Display, Formatter};

use crate::args::Args;
use crate::error::{Error, Result};
use crate::shared::{Shared, SharedState};
use crate::value::Value;

/// How a function is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcurrencyModel {
    /// Plain functions that may run on any number of threads at once.
    Preemptible,
    /// Functions returning futures, driven by a cooperative scheduler.
    Cooperative,
}

impl ConcurrencyModel {
    /// The container kinds that are safe to share under this model.
    pub fn sanctioned(self) -> &'static [&'static str] {
        match self {
            Self::Preemptible => &["SyncMap", "SyncQueue"],
            Self::Cooperative => &["AsyncMap", "AsyncQueue"],
        }
    }
}

impl Display for ConcurrencyModel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad(match self {
            Self::Preemptible => "preemptible",
            Self::Cooperative => "cooperative",
        })
    }
}

/// The declared default of a parameter.
#[derive(Debug, Clone)]
pub enum ParamDefault {
    /// A plain argument value.
    Value(Value),
    /// A shared-state handle.
    Shared(Shared),
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    default: Option<ParamDefault>,
}

impl Param {
    /// A parameter without a default.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), default: None }
    }

    /// A parameter with a default value.
    pub fn with_default(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(ParamDefault::Value(value.into())),
        }
    }

    /// A parameter defaulting to a shared-state handle.
    pub fn shared(name: impl Into<String>, state: impl SharedState) -> Self {
        Self {
            name: name.into(),
            default: Some(ParamDefault::Shared(Shared::new(state))),
        }
    }

    /// The parameter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter's default, if any.
    pub fn default(&self) -> Option<&ParamDefault> {
        self.default.as_ref()
    }
}

/// The ordered parameter list of a function.
///
/// This is the static description that calls are bound against: it is built
/// once when a function is wrapped and never changes afterwards.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// An empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// All parameters in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Find a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Bind a call's arguments to the declared parameters.
    ///
    /// Positional arguments fill parameters in order, named arguments fill
    /// them by name, and value defaults fill whatever was left out.
    /// Parameters that stay unbound, or whose default is a shared-state
    /// handle, are absent from the result.
    pub fn bind<'a>(&'a self, function: &str, args: &'a Args) -> Result<Bound<'a>> {
        let invalid = |reason: String| Error::InvalidArguments {
            function: function.into(),
            reason,
        };

        if args.positional().len() > self.params.len() {
            return Err(invalid(format!(
                "takes {} positional arguments but {} were given",
                self.params.len(),
                args.positional().len(),
            )));
        }

        let mut slots: Vec<Option<&'a Value>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(args.positional()) {
            *slot = Some(value);
        }

        for (name, value) in args.named_args() {
            let Some(index) = self.params.iter().position(|param| &param.name == name)
            else {
                return Err(invalid(format!("unexpected argument `{name}`")));
            };

            if slots[index].is_some() {
                return Err(invalid(format!("multiple values for argument `{name}`")));
            }

            slots[index] = Some(value);
        }

        let entries = self
            .params
            .iter()
            .zip(slots)
            .filter_map(|(param, slot)| {
                let value = slot.or(match &param.default {
                    Some(ParamDefault::Value(value)) => Some(value),
                    _ => None,
                })?;
                Some((param.name.as_str(), value))
            })
            .collect();

        Ok(Bound { entries })
    }
}

/// Arguments bound to parameter names.
#[derive(Debug, Clone)]
pub struct Bound<'a> {
    entries: Vec<(&'a str, &'a Value)>,
}

impl<'a> Bound<'a> {
    /// The value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(param, _)| *param == name)
            .map(|&(_, value)| value)
    }

    /// All bound values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + '_ {
        self.entries.iter().copied()
    }
}

/// The externally visible identity of a function.
///
/// Wrappers hand out the metadata of the function they wrap, so callers that
/// introspect a memoized or guarded function see the original name,
/// documentation and signature.
#[derive(Debug, Clone)]
pub struct FnMeta {
    name: String,
    doc: Option<String>,
    signature: Signature,
    model: ConcurrencyModel,
}

impl FnMeta {
    /// Metadata for a preemptible function without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            signature: Signature::new(),
            model: ConcurrencyModel::Preemptible,
        }
    }

    /// Attach documentation.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Append a parameter to the signature.
    pub fn with_param(mut self, param: Param) -> Self {
        self.signature.params.push(param);
        self
    }

    /// Replace the signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Set the concurrency model.
    pub fn with_model(mut self, model: ConcurrencyModel) -> Self {
        self.model = model;
        self
    }

    /// Mark the function as cooperative.
    pub fn cooperative(self) -> Self {
        self.with_model(ConcurrencyModel::Cooperative)
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's documentation.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// The function's declared parameters.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// How the function is scheduled.
    pub fn model(&self) -> ConcurrencyModel {
        self.model
    }
}
