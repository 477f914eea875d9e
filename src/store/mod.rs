//! Content-addressed, size-bounded filesystem storage

mod store;

pub use store::{Store, is_portable_component, is_portable_hash};
