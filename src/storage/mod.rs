//! Persistence for engine state.
//!
//! The core never names a file: it saves and loads JSON records through a
//! [`StateStore`]. An in-memory backend is always available; the file-backed
//! one lives behind the `persistent` feature.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryStateStore;
pub use traits::{load_as, require_as, save_as, StateKey, StateStore, StorageError};
