//! Per-sender message contracts.
//!
//! A contract registry owns one sender type's message catalog and every
//! handler bound to it. It knows nothing about receiver instances.

pub mod registry;
