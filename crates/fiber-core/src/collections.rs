//! Hash collections used on the reconciliation hot paths.
//!
//! By default maps are `hashbrown` tables keyed with `ahash`. Enabling the
//! `std-hash` feature swaps in the standard library collections. Construct
//! them with `Default::default()` so both backends stay interchangeable.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
    pub type HashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
}
