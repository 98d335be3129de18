//! # Greeter Testkit
//!
//! Test utilities for the greeter registry.
//!
//! This crate provides:
//! - Registry fixtures wired with admin and resolver pipelines
//! - A fault-injecting storage backend
//! - Property-based generators for names and greetings
//! - A concurrent resolve stress harness
//!
//! ```rust,ignore
//! use greeter_testkit::prelude::*;
//!
//! let registry = TestRegistry::memory();
//! registry.program("Colin Dixon", "Hola Colin Dixon");
//! assert_eq!(registry.resolve("Colin Dixon"), "Hola Colin Dixon");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fault;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fault::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fault::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
