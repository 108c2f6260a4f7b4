//! Error types for the Fabula story pipeline.
//!
//! This crate provides the foundation error types used throughout the Fabula
//! workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error
//! handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use fabula_error::{FabulaResult, HttpError};
//!
//! fn fetch_data() -> FabulaResult<String> {
//!     Err(HttpError::new("Connection refused"))?
//! }
//!
//! match fetch_data() {
//!     Ok(data) => println!("Got: {}", data),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
mod error;
mod http;
mod json;
mod pipeline;
mod provider;
mod repository;
mod storage;

pub use broker::{BrokerError, BrokerErrorKind};
pub use config::ConfigError;
pub use error::{FabulaError, FabulaErrorKind, FabulaResult};
pub use http::HttpError;
pub use json::JsonError;
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use provider::{retryable_status, ProviderError, ProviderErrorKind, RetryableError};
pub use repository::{RepositoryError, RepositoryErrorKind};
pub use storage::{StorageError, StorageErrorKind};
