//! AWS API Gateway proxy integration for SGI applications.
//!
//! This crate bridges the gateway's Lambda proxy event format and the
//! synchronous gateway interface (SGI): applications written against the
//! `(environment, response starter) -> body` calling convention run
//! unmodified behind an API Gateway proxy resource.
//!
//! ## Architecture
//!
//! - **Environment translation**: [`environ::translate`] maps one proxy
//!   event plus its invocation context into the canonical request
//!   environment.
//! - **Two-phase responses**: [`ResponseStarter`] enforces the
//!   start-before-body protocol, including the error-token path for
//!   replacing headers before any body bytes are committed.
//! - **Orchestration**: [`SgiHandler`] drives the application, drains
//!   its body, and assembles the gateway response value.
//! - **Runtime wiring**: [`server::run`] mounts a handler on the Lambda
//!   runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sgi_aws_lambda::prelude::*;
//!
//! fn hello(_environ: Environ, starter: ResponseStarter) -> Result<std::vec::IntoIter<String>> {
//!     let headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
//!     starter.start("200 OK", headers, None)?;
//!     Ok(vec!["Hello world".to_string()].into_iter())
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), lambda_runtime::Error> {
//!     sgi_aws_lambda::run(hello).await
//! }
//! ```

pub mod app;
pub mod environ;
pub mod error;
pub mod handler;
pub mod prelude;
pub mod response;
pub mod server;
pub mod types;

// Re-exports for convenience
/// Application calling convention
pub use app::{ResponseBody, SgiApp};
/// Canonical request environment
pub use environ::Environ;
/// Adapter error types and result alias
pub use error::{ErrorToken, ProtocolViolation, Result, SgiError};
/// Per-invocation orchestrator
pub use handler::SgiHandler;
/// Two-phase protocol handles
pub use response::{BodyWriter, ResponseStarter};
/// Lambda runtime entry point
pub use server::run;
/// Gateway wire types
pub use types::{GatewayResponse, ProxyEvent};
