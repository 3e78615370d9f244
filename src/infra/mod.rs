//! Infrastructure adapters for task storage and the outbound HTTP transport.

pub mod client;
pub mod registry;

pub use client::ReqwestClient;
pub use registry::InMemoryRegistry;
