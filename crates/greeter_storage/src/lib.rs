//! # Greeter Storage
//!
//! Byte-level storage for the greeter registry commit log.
//!
//! Backends are append-only byte stores. They know nothing about registry
//! views, entries or record framing; `greeter_core` owns all of that and
//! only asks a backend to append, read back, flush and cut a torn tail.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for tests and throwaway registries
//! - [`FileBackend`] - a single log file on disk
//!
//! ## Example
//!
//! ```rust
//! use greeter_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
