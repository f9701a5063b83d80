//! Message contract registry for one sender type.
//!
//! # Responsibility
//! - Hold the sender's catalog: message name -> parameter signature.
//! - Hold specific bindings (message -> receiver type -> binding) and
//!   catchall bindings (receiver type -> binding).
//! - Validate handler signatures once, at bind time.
//!
//! # Invariants
//! - A specific binding exists only for a cataloged message whose signature
//!   is assignable to the handler's parameters (variadic handlers excepted).
//! - Every stored binding targets this registry's sender type.
//! - At most one specific binding per (message, receiver type) and one
//!   catchall per receiver type; later binds overwrite earlier ones.

use crate::model::handler::{HandlerBinding, Parameters};
use crate::model::message::{MessageDecl, MessageDeclError};
use crate::model::sender::SenderType;
use crate::model::types::ArgType;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Catalog and handler table of one sender type.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    sender: SenderType,
    messages: BTreeMap<String, Vec<ArgType>>,
    handlers: BTreeMap<String, BTreeMap<TypeId, Arc<HandlerBinding>>>,
    catchalls: BTreeMap<TypeId, Arc<HandlerBinding>>,
}

impl ContractRegistry {
    /// Creates an empty registry; no messages are cataloged.
    pub fn new(sender: SenderType) -> Self {
        Self {
            sender,
            messages: BTreeMap::new(),
            handlers: BTreeMap::new(),
            catchalls: BTreeMap::new(),
        }
    }

    /// Creates a registry cataloging everything `sender` declares.
    pub fn for_sender(sender: SenderType) -> Self {
        let mut registry = Self::new(sender);
        registry.declare_messages(sender.declared_messages());
        registry
    }

    /// Adds declarations to the catalog.
    ///
    /// Invalid or duplicate declarations are skipped with a warning.
    /// Returns the number of declarations accepted.
    pub fn declare_messages(&mut self, decls: impl IntoIterator<Item = MessageDecl>) -> usize {
        let mut accepted = 0;
        for decl in decls {
            let verdict = decl.validate().and_then(|()| {
                if self.messages.contains_key(decl.name()) {
                    Err(MessageDeclError::DuplicateName(decl.name().to_string()))
                } else {
                    Ok(())
                }
            });
            if let Err(err) = verdict {
                warn!(
                    "event=declare_message module=contract status=skipped sender={} reason={}",
                    self.sender.key(),
                    err
                );
                continue;
            }
            let (name, signature) = decl.into_parts();
            self.messages.insert(name, signature);
            accepted += 1;
        }
        debug!(
            "event=declare_messages module=contract status=ok sender={} accepted={} total={}",
            self.sender.key(),
            accepted,
            self.messages.len()
        );
        accepted
    }

    /// Binds a specific handler after catalog and signature validation.
    ///
    /// # Errors
    /// - `CatchallTarget` when the binding is a catchall.
    /// - `SenderMismatch` when the binding targets another sender type.
    /// - `UnknownMessage` when the message is not cataloged.
    /// - `SignatureMismatch` when the declared argument types are not
    ///   assignable to the handler parameters; checked positionally, stopping
    ///   at the first mismatch.
    pub fn try_bind_handler(&mut self, binding: HandlerBinding) -> Result<(), BindError> {
        let Some(message) = binding.message() else {
            return Err(BindError::CatchallTarget {
                handler: binding.name().to_string(),
            });
        };
        if binding.sender() != self.sender {
            return Err(BindError::SenderMismatch {
                expected: self.sender.key().name(),
                actual: binding.sender().key().name(),
            });
        }
        let Some(declared) = self.messages.get(message) else {
            return Err(BindError::UnknownMessage {
                sender: self.sender.key().name(),
                message: message.to_string(),
            });
        };
        if let Parameters::Fixed(params) = binding.parameters() {
            check_signature(declared, params).map_err(|position| BindError::SignatureMismatch {
                message: message.to_string(),
                handler: binding.name().to_string(),
                position,
            })?;
        }

        let message = message.to_string();
        let binding = binding.with_declared_signature(declared);
        let receiver = binding.receiver().id();
        self.handlers
            .entry(message)
            .or_default()
            .insert(receiver, Arc::new(binding));
        Ok(())
    }

    /// Boolean form of `try_bind_handler`; failures are logged as warnings.
    pub fn bind_handler(&mut self, binding: HandlerBinding) -> bool {
        let receiver = binding.receiver();
        match self.try_bind_handler(binding) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=bind_handler module=contract status=rejected sender={} receiver={} reason={}",
                    self.sender.key(),
                    receiver,
                    err
                );
                false
            }
        }
    }

    /// Sets the catchall of the binding's receiver type, replacing any previous one.
    pub fn bind_catchall(&mut self, binding: HandlerBinding) {
        self.catchalls
            .insert(binding.receiver().id(), Arc::new(binding));
    }

    /// Specific binding for `(message, receiver)`, else the receiver's catchall.
    pub fn resolve(&self, message: &str, receiver: TypeId) -> Option<&Arc<HandlerBinding>> {
        self.handlers
            .get(message)
            .and_then(|bound| bound.get(&receiver))
            .or_else(|| self.catchalls.get(&receiver))
    }

    pub fn handles(&self, message: &str) -> bool {
        self.messages.contains_key(message)
    }

    pub fn sender(&self) -> SenderType {
        self.sender
    }

    pub fn signature(&self, message: &str) -> Option<&[ArgType]> {
        self.messages.get(message).map(Vec::as_slice)
    }

    /// Cataloged message names in sorted order.
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    /// Number of specific plus catchall bindings.
    pub fn binding_count(&self) -> usize {
        self.handlers.values().map(BTreeMap::len).sum::<usize>() + self.catchalls.len()
    }

    /// Serializable view of the catalog and bindings.
    pub fn snapshot(&self) -> ContractSnapshot {
        let messages = self
            .messages
            .iter()
            .map(|(name, signature)| MessageSnapshot {
                name: name.clone(),
                signature: signature.iter().map(ToString::to_string).collect(),
            })
            .collect();

        let mut bindings: Vec<BindingSnapshot> = self
            .handlers
            .values()
            .flat_map(BTreeMap::values)
            .chain(self.catchalls.values())
            .map(|binding| BindingSnapshot {
                receiver: binding.receiver().name().to_string(),
                handler: binding.name().to_string(),
                message: binding.message().map(str::to_string),
                catchall: binding.is_catchall(),
            })
            .collect();
        bindings.sort_by(|left, right| {
            (left.catchall, &left.message, &left.receiver).cmp(&(
                right.catchall,
                &right.message,
                &right.receiver,
            ))
        });

        ContractSnapshot {
            sender: self.sender.key().name().to_string(),
            messages,
            bindings,
        }
    }
}

/// Returns the first mismatching position, or `None` for an arity mismatch.
fn check_signature(declared: &[ArgType], params: &[ArgType]) -> Result<(), Option<usize>> {
    if declared.len() != params.len() {
        return Err(None);
    }
    match declared
        .iter()
        .zip(params)
        .position(|(declared, param)| !param.is_assignable_from(declared))
    {
        Some(position) => Err(Some(position)),
        None => Ok(()),
    }
}

/// Handler binding rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    UnknownMessage {
        sender: &'static str,
        message: String,
    },
    SignatureMismatch {
        message: String,
        handler: String,
        /// First mismatching parameter; `None` when the lengths differ.
        position: Option<usize>,
    },
    SenderMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    CatchallTarget {
        handler: String,
    },
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMessage { sender, message } => {
                write!(f, "message `{message}` is not declared by {sender}")
            }
            Self::SignatureMismatch {
                message,
                handler,
                position: Some(position),
            } => write!(
                f,
                "handler `{handler}` parameter {position} cannot accept the argument declared by `{message}`"
            ),
            Self::SignatureMismatch {
                message,
                handler,
                position: None,
            } => write!(
                f,
                "handler `{handler}` parameter count differs from message `{message}`"
            ),
            Self::SenderMismatch { expected, actual } => {
                write!(f, "binding targets {actual}, registry belongs to {expected}")
            }
            Self::CatchallTarget { handler } => {
                write!(f, "catchall handler `{handler}` cannot be bound to a message")
            }
        }
    }
}

impl Error for BindError {}

/// Inspection view of one contract registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub sender: String,
    pub messages: Vec<MessageSnapshot>,
    pub bindings: Vec<BindingSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub name: String,
    pub signature: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSnapshot {
    pub receiver: String,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    pub catchall: bool,
}
