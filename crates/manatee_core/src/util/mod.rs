//! Shared containers used by the dispatch layer.

pub mod weak_list;
