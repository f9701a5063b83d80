//! In-process publish/subscribe message bus.
//!
//! Sender types declare a catalog of named, typed messages; receiver types
//! bind handlers to (sender type, message) pairs or to a sender's catchall.
//! Signatures are checked once at registration, and emission fans out to
//! every live receiver instance without owning any of them.

pub mod contract;
pub mod dispatch;
pub mod logging;
pub mod model;
pub mod util;

pub use contract::registry::{
    BindError, BindingSnapshot, ContractRegistry, ContractSnapshot, MessageSnapshot,
};
pub use dispatch::system::{DispatchSystem, DEFAULT_SYSTEM_NAME};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::handler::{
    Args, BindingTarget, HandlerBinding, HandlerResult, InvocationError, Parameters,
};
pub use model::message::{MessageDecl, MessageDeclError};
pub use model::receiver::{HandlerDecl, MessageReceiver};
pub use model::sender::{MessageSender, SenderType};
pub use model::types::{ArgType, TypeKey};
pub use util::weak_list::{WeakList, WeakListError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
