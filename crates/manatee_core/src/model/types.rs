//! Type identity and parameter type descriptors.
//!
//! # Responsibility
//! - Give every sender, receiver and argument type a stable runtime key.
//! - Decide declaration-time assignability between parameter types.
//!
//! # Invariants
//! - `TypeKey` equality is `TypeId` equality; the name is display-only.
//! - `ArgType::any()` is assignable from every other descriptor.

use std::any::{type_name, Any, TypeId};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Runtime identity of one Rust type.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified type name, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, e.g. `Sender` for `app::Sender`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        let offset = base.rfind("::").map(|index| index + 2).unwrap_or(0);
        &self.name[offset..]
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Parameter type descriptor used in message and handler signatures.
///
/// A descriptor carries its own key plus every key it specialises, so a
/// handler declared over a general type can accept a message declared over
/// a more specific one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgType {
    key: TypeKey,
    supertypes: Vec<TypeKey>,
}

impl ArgType {
    pub fn of<T: Any>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            supertypes: Vec::new(),
        }
    }

    /// Untyped parameter; accepts any declared argument type.
    pub fn any() -> Self {
        Self {
            key: TypeKey::of::<dyn Any>(),
            supertypes: Vec::new(),
        }
    }

    /// Declares that this type specialises `parent` (and all of its parents).
    pub fn extends(mut self, parent: ArgType) -> Self {
        for key in std::iter::once(parent.key).chain(parent.supertypes) {
            if key != self.key && !self.supertypes.contains(&key) {
                self.supertypes.push(key);
            }
        }
        self
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn is_any(&self) -> bool {
        self.key == TypeKey::of::<dyn Any>()
    }

    /// Returns whether a value declared as `declared` may be passed where
    /// `self` is expected.
    pub fn is_assignable_from(&self, declared: &ArgType) -> bool {
        self.is_any() || self.key == declared.key || declared.supertypes.contains(&self.key)
    }

    /// Returns whether one runtime value matches this descriptor exactly.
    pub fn matches_value(&self, value: &(dyn Any + Send + Sync)) -> bool {
        self.is_any() || (*value).type_id() == self.key.id()
    }
}

impl Display for ArgType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_any() {
            f.write_str("any")
        } else {
            f.write_str(self.key.short_name())
        }
    }
}
