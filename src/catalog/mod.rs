//! Persistent index of `(time_value, device) -> (hash, size, keep)`

mod catalog;

pub use catalog::{Catalog, InsertOutcome};
