//! API surface: framework-independent models and the actix-web server.

pub mod api;
pub mod http;

pub use api::{ApiError, CreateTaskRequest, TaskIdResponse, TaskResponse};
pub use http::{configure, serve};
