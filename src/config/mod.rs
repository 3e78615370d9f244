//! Configuration models for the scheduler and the service around it.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, ServiceConfig};
