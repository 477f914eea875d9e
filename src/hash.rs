//! The pluggable hash function used to name newly ingested artifacts
//!
//! The core treats content-hash generation as an opaque injectable
//! dependency: it never inspects the string beyond validating it as a
//! portable path (see [`crate::store::is_portable_component`]).

use rand::Rng;
use rand::distributions::Alphanumeric;

/// A callable that produces a new artifact name on every invocation.
pub type HashFn = Box<dyn FnMut() -> String + Send>;

const DEFAULT_HASH_LEN: usize = 32;

/// The default hash function: a 32-character random alphanumeric string
/// drawn from a 62-symbol alphabet, reseeded from the process-global PRNG
/// once per [`crate::Buffer`] construction.
pub fn default_hash_fn() -> HashFn {
    Box::new(|| {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(DEFAULT_HASH_LEN)
            .map(char::from)
            .collect()
    })
}
