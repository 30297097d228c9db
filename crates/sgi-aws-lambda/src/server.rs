//! Lambda runtime entry point.

use std::sync::Arc;

use lambda_runtime::{LambdaEvent, service_fn};
use tracing::info;

use crate::app::SgiApp;
use crate::handler::SgiHandler;
use crate::types::ProxyEvent;

/// Run an SGI application on the Lambda runtime.
///
/// Deserializes each proxy event, drives the application through
/// [`SgiHandler`], and hands the gateway response back to the platform.
/// Adapter and application errors surface to the runtime unchanged, so
/// they land in the platform's error and telemetry path.
///
/// ```rust,no_run
/// use sgi_aws_lambda::prelude::*;
///
/// fn app(_environ: Environ, starter: ResponseStarter) -> Result<std::vec::IntoIter<String>> {
///     starter.start("200 OK", vec![], None)?;
///     Ok(vec!["ok".to_string()].into_iter())
/// }
///
/// #[tokio::main]
/// async fn main() -> std::result::Result<(), lambda_runtime::Error> {
///     sgi_aws_lambda::run(app).await
/// }
/// ```
pub async fn run<A>(app: A) -> std::result::Result<(), lambda_runtime::Error>
where
    A: SgiApp + Send + Sync + 'static,
{
    let handler = Arc::new(SgiHandler::new(app));
    info!("starting SGI gateway adapter");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<ProxyEvent>| {
        let handler = Arc::clone(&handler);
        async move {
            let (payload, context) = event.into_parts();
            handler
                .handle(payload, context)
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
}
