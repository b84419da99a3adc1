//! Client library for the taskdesk backend: session bookkeeping, the
//! refresh-aware HTTP client, the task cache and form validation.

pub mod api;
pub mod auth;
pub mod config;
pub mod logging;
pub mod routes;
pub mod session;
pub mod tasks;
pub mod validation;

pub use taskdesk_types as types;
