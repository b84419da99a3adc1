//! HTTP access to the taskdesk backend.

pub mod auth;
pub mod client;
pub mod error;
pub mod tasks;

pub use auth::AuthApi;
pub use client::{ApiClient, ApiRequest};
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use tasks::TasksApi;
