//! # Greeter Service
//!
//! The request/response face of the greeter registry.
//!
//! This crate provides:
//! - `hello_world`, the inbound RPC operation
//! - The administrative operations: programming overrides and inspecting
//!   what was served
//! - Explicit initialization under a root initialization policy
//! - Recovery from a broken resolver chain
//!
//! ```
//! use greeter_service::{HelloService, HelloWorldInput, ServiceConfig};
//!
//! let service = HelloService::in_memory(ServiceConfig::default()).unwrap();
//! service.initialize().unwrap();
//!
//! service.program_greeting("Colin Dixon", "Hola Colin Dixon").unwrap();
//! let output = service.hello_world(HelloWorldInput::new("Colin Dixon")).unwrap();
//! assert_eq!(output.greeting, "Hola Colin Dixon");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod rpc;
mod service;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use rpc::{HelloWorldInput, HelloWorldOutput};
pub use service::HelloService;
