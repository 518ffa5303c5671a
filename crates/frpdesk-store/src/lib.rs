//! Persistence adapters for frpdesk.
//!
//! Implements the core [`KvStore`](frpdesk_core::ports::KvStore) port:
//! [`JsonFileStore`] for the real single-file store and [`MemoryStore`]
//! for tests.

#![deny(unused_crate_dependencies)]

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
