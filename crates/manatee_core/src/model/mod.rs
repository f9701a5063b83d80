//! Declaration-level data model for the message bus.
//!
//! # Responsibility
//! - Identify participating types and describe parameter signatures.
//! - Define message declarations, handler bindings and the argument pack.
//! - Provide the explicit sender/receiver declaration traits.
//!
//! # Invariants
//! - Declarations and bindings are immutable once built.
//! - Signature compatibility is decided at bind time, never at emission time.

pub mod handler;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod types;
