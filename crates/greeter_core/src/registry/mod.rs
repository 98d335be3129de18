//! The two-view registry store.

mod store;
mod view;

pub use store::RegistryStore;
