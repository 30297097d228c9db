//! Convenient re-exports of the commonly used adapter types.
//!
//! ```rust
//! use sgi_aws_lambda::prelude::*;
//! ```

pub use crate::app::{ResponseBody, SgiApp};
pub use crate::environ::{Environ, ErrorSink, translate};
pub use crate::error::{BoxError, ErrorToken, ProtocolViolation, Result, SgiError};
pub use crate::handler::SgiHandler;
pub use crate::response::{BodyWriter, ResponseStarter};
pub use crate::server::run;
pub use crate::types::{GatewayResponse, ProxyEvent};

// Runtime types commonly used alongside the adapter
pub use lambda_runtime::Context;
