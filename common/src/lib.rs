//! Shared building blocks for the multi-database SQL console services.
//!
//! - `config`: environment-driven service configuration
//! - `errors`: batch-level and per-target error taxonomy
//! - `middleware`: request context and session token extraction
//! - `models`: wire models shared between services
//! - `response`: JSON response envelopes
//! - `utils`: safety policy, result sanitizer, driver error mapping

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
