//! Process-wide orchestration of registration and emission.
//!
//! # Responsibility
//! - Expose the public bus surface applications talk to.
//! - Keep named bus instances for code that prefers a lookup over injection.
//!
//! # See also
//! - `contract::registry` for per-sender catalogs and bindings.
//! - `util::weak_list` for receiver instance tracking.

pub mod system;
