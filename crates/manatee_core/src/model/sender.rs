//! Sender type descriptors.

use crate::model::message::MessageDecl;
use crate::model::types::TypeKey;
use log::warn;
use std::fmt::{Debug, Formatter};

/// A type that publishes a fixed catalog of messages.
///
/// Rust has no implementation inheritance, so a sender that specialises
/// another one names it through `supertype`; emission walks that chain.
pub trait MessageSender: 'static {
    /// Messages declared by this type itself, not by its supertypes.
    fn messages() -> Vec<MessageDecl>;

    fn supertype() -> Option<SenderType> {
        None
    }
}

/// Static handle on one `MessageSender` implementation.
#[derive(Clone, Copy)]
pub struct SenderType {
    key: TypeKey,
    messages: fn() -> Vec<MessageDecl>,
    supertype: fn() -> Option<SenderType>,
}

impl SenderType {
    pub fn of<S: MessageSender>() -> Self {
        Self {
            key: TypeKey::of::<S>(),
            messages: S::messages,
            supertype: S::supertype,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn declared_messages(&self) -> Vec<MessageDecl> {
        (self.messages)()
    }

    pub fn supertype(&self) -> Option<SenderType> {
        (self.supertype)()
    }

    /// This type followed by its supertypes, most specific first.
    ///
    /// A supertype chain that loops back on itself is cut at the first repeat.
    pub fn lineage(&self) -> Vec<SenderType> {
        let mut chain = vec![*self];
        let mut current = self.supertype();
        while let Some(next) = current {
            if chain.iter().any(|seen| seen.key == next.key) {
                warn!(
                    "event=sender_lineage module=model status=cut sender={} repeated={}",
                    self.key,
                    next.key
                );
                break;
            }
            chain.push(next);
            current = next.supertype();
        }
        chain
    }
}

impl PartialEq for SenderType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SenderType {}

impl Debug for SenderType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SenderType").field(&self.key.name()).finish()
    }
}
