//! Handler bindings and the argument pack passed to them.
//!
//! # Responsibility
//! - Erase typed receiver callables into one invocable shape.
//! - Carry emission arguments and report call-time mismatches.
//!
//! # Invariants
//! - A catchall callable is always invoked with `(message, args)`.
//! - A positional callable is always invoked with `args` only.
//! - Invocation never unwinds into the caller; panics become errors.

use crate::logging::panic_payload_text;
use crate::model::sender::SenderType;
use crate::model::types::{ArgType, TypeKey};
use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Result type returned by handler bodies.
pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

type PositionalFn = dyn Fn(&(dyn Any + Send + Sync), &Args) -> HandlerResult + Send + Sync;
type CatchallFn = dyn Fn(&(dyn Any + Send + Sync), &str, &Args) -> HandlerResult + Send + Sync;

/// Ordered, type-erased arguments of one emission.
#[derive(Default)]
pub struct Args {
    values: Vec<Box<dyn Any + Send + Sync>>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one argument, builder style.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows argument `index` as `T`.
    ///
    /// # Errors
    /// - `MissingArgument` when `index` is out of range.
    /// - `ArgumentType` when the value is not exactly a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, InvocationError> {
        let value = self.raw(index).ok_or(InvocationError::MissingArgument {
            index,
            len: self.values.len(),
        })?;
        value
            .downcast_ref::<T>()
            .ok_or(InvocationError::ArgumentType {
                index,
                expected: type_name::<T>(),
            })
    }

    pub fn raw(&self, index: usize) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(index).map(|value| &**value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn Any + Send + Sync)> {
        self.values.iter().map(|value| &**value)
    }
}

impl Debug for Args {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args").field("len", &self.values.len()).finish()
    }
}

/// Declared parameter list of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameters {
    Fixed(Vec<ArgType>),
    /// Untyped argument list; signature checks are skipped.
    Variadic,
}

impl Parameters {
    pub fn is_variadic(&self) -> bool {
        matches!(self, Self::Variadic)
    }
}

/// What a binding listens to on its sender type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingTarget {
    Message(String),
    Catchall,
}

#[derive(Clone)]
pub(crate) enum Callable {
    Positional(Arc<PositionalFn>),
    Catchall(Arc<CatchallFn>),
}

impl Callable {
    pub(crate) fn positional<R, F>(f: F) -> Self
    where
        R: Any,
        F: Fn(&R, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Positional(Arc::new(
            move |receiver: &(dyn Any + Send + Sync), args: &Args| -> HandlerResult {
                f(downcast_receiver::<R>(receiver)?, args)
            },
        ))
    }

    pub(crate) fn catchall<R, F>(f: F) -> Self
    where
        R: Any,
        F: Fn(&R, &str, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Catchall(Arc::new(
            move |receiver: &(dyn Any + Send + Sync), message: &str, args: &Args| -> HandlerResult {
                f(downcast_receiver::<R>(receiver)?, message, args)
            },
        ))
    }

    pub(crate) fn is_catchall(&self) -> bool {
        matches!(self, Self::Catchall(_))
    }
}

fn downcast_receiver<R: Any>(receiver: &(dyn Any + Send + Sync)) -> Result<&R, InvocationError> {
    receiver
        .downcast_ref::<R>()
        .ok_or(InvocationError::ReceiverMismatch {
            expected: type_name::<R>(),
        })
}

/// One receiver-type handler attached to one sender type.
#[derive(Clone)]
pub struct HandlerBinding {
    receiver: TypeKey,
    sender: SenderType,
    target: BindingTarget,
    parameters: Parameters,
    name: String,
    callable: Callable,
    /// Message signature recorded when a registry accepted the binding.
    declared: Option<Vec<ArgType>>,
}

impl HandlerBinding {
    /// Builds a binding for `message` whose callable takes positional args.
    pub fn positional<R, F>(
        sender: SenderType,
        message: impl Into<String>,
        parameters: Parameters,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        R: Any,
        F: Fn(&R, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_parts(
            TypeKey::of::<R>(),
            sender,
            BindingTarget::Message(message.into()),
            parameters,
            name.into(),
            Callable::positional::<R, F>(f),
        )
    }

    /// Builds a catchall binding receiving every message of `sender`.
    pub fn catchall<R, F>(sender: SenderType, name: impl Into<String>, f: F) -> Self
    where
        R: Any,
        F: Fn(&R, &str, &Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_parts(
            TypeKey::of::<R>(),
            sender,
            BindingTarget::Catchall,
            Parameters::Variadic,
            name.into(),
            Callable::catchall::<R, F>(f),
        )
    }

    pub(crate) fn from_parts(
        receiver: TypeKey,
        sender: SenderType,
        target: BindingTarget,
        parameters: Parameters,
        name: String,
        callable: Callable,
    ) -> Self {
        Self {
            receiver,
            sender,
            target,
            parameters,
            name,
            callable,
            declared: None,
        }
    }

    /// Records the signature of the message this binding was accepted for.
    pub(crate) fn with_declared_signature(mut self, signature: &[ArgType]) -> Self {
        self.declared = Some(signature.to_vec());
        self
    }

    pub fn receiver(&self) -> TypeKey {
        self.receiver
    }

    pub fn sender(&self) -> SenderType {
        self.sender
    }

    pub fn target(&self) -> &BindingTarget {
        &self.target
    }

    /// Target message name, `None` for catchall bindings.
    pub fn message(&self) -> Option<&str> {
        match &self.target {
            BindingTarget::Message(name) => Some(name),
            BindingTarget::Catchall => None,
        }
    }

    pub fn is_catchall(&self) -> bool {
        self.target == BindingTarget::Catchall
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Handler name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the handler on one receiver instance.
    ///
    /// For fixed parameter lists the arity and every argument's runtime type
    /// are checked first: against the message's declared signature when a
    /// registry accepted the binding, else against the handler's parameters.
    pub fn invoke(
        &self,
        receiver: &(dyn Any + Send + Sync),
        message: &str,
        args: &Args,
    ) -> Result<(), InvocationError> {
        if let (Callable::Positional(_), Parameters::Fixed(params)) =
            (&self.callable, &self.parameters)
        {
            if params.len() != args.len() {
                return Err(InvocationError::ArityMismatch {
                    expected: params.len(),
                    actual: args.len(),
                });
            }
            let expected = self.declared.as_deref().unwrap_or(params.as_slice());
            for (index, (ty, value)) in expected.iter().zip(args.iter()).enumerate() {
                if !ty.matches_value(value) {
                    return Err(InvocationError::ArgumentType {
                        index,
                        expected: ty.key().name(),
                    });
                }
            }
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| match &self.callable {
            Callable::Positional(f) => f(receiver, args),
            Callable::Catchall(f) => f(receiver, message, args),
        }));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => match err.downcast::<InvocationError>() {
                Ok(invocation) => Err(*invocation),
                Err(other) => Err(InvocationError::Handler(other)),
            },
            Err(payload) => Err(InvocationError::Panicked(panic_payload_text(&*payload))),
        }
    }
}

impl Debug for HandlerBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("receiver", &self.receiver.name())
            .field("sender", &self.sender.key().name())
            .field("target", &self.target)
            .field("parameters", &self.parameters)
            .field("name", &self.name)
            .field("catchall_callable", &self.callable.is_catchall())
            .finish()
    }
}

/// Emission-time failure of one handler invocation.
#[derive(Debug)]
pub enum InvocationError {
    ArityMismatch { expected: usize, actual: usize },
    MissingArgument { index: usize, len: usize },
    ArgumentType { index: usize, expected: &'static str },
    ReceiverMismatch { expected: &'static str },
    Handler(Box<dyn Error + Send + Sync>),
    Panicked(String),
}

impl Display for InvocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityMismatch { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            }
            Self::MissingArgument { index, len } => {
                write!(f, "argument {index} missing; only {len} supplied")
            }
            Self::ArgumentType { index, expected } => {
                write!(f, "argument {index} is not a `{expected}`")
            }
            Self::ReceiverMismatch { expected } => {
                write!(f, "receiver instance is not a `{expected}`")
            }
            Self::Handler(err) => write!(f, "handler failed: {err}"),
            Self::Panicked(payload) => write!(f, "handler panicked: {payload}"),
        }
    }
}

impl Error for InvocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
