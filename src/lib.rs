//! # Fetch Scheduler
//!
//! Asynchronous outbound HTTP fetches executed by a bounded worker pool.
//!
//! Callers submit a fetch specification (method, URL, headers) and get back a
//! task handle immediately. The task waits in a bounded queue until one of a
//! fixed number of workers claims it, performs the request through an injected
//! HTTP capability and records the outcome on the task. Callers poll the task
//! for its status and result.
//!
//! ## Key Features
//!
//! - **Fail-fast admission**: a full queue rejects new work immediately instead of blocking
//! - **Dedicated workers**: fixed pool of OS threads, each executing one task at a time
//! - **Explicit lifecycle**: `READY -> IN_PROGRESS -> FINISHED | FAILED`, never rolled back
//! - **Injected transport**: any [`core::HttpClient`] can perform the fetch; tests use spies
//! - **Best-effort cancellation**: deleting a task aborts its in-flight request
//! - **REST surface**: actix-web routes over the scheduler (`runtime::http`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fetch_scheduler::core::{Scheduler, TaskStatus};
//! use fetch_scheduler::infra::{InMemoryRegistry, ReqwestClient};
//!
//! let scheduler = Scheduler::new(
//!     100,
//!     num_cpus::get(),
//!     Arc::new(InMemoryRegistry::new()),
//!     Arc::new(ReqwestClient::new()),
//! )?;
//!
//! let task = scheduler.schedule("https://example.com", "GET", Default::default())?;
//!
//! // Later...
//! let task = scheduler.find_by_id(&task.id())?;
//! if task.status() == TaskStatus::Finished {
//!     println!("{:?}", task.state().outcome());
//! }
//!
//! scheduler.close();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduler core: tasks, registry seam, HTTP capability and worker pool.
pub mod core;
/// Configuration models for the scheduler and service.
pub mod config;
/// Infrastructure adapters for task storage and the HTTP transport.
pub mod infra;
/// API models and the actix-web server.
pub mod runtime;
/// Shared utilities.
pub mod util;
