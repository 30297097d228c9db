//! The per-invocation orchestrator.
//!
//! [`SgiHandler`] drives one application call per proxy event: translate
//! the event, invoke the application, drain its body under the protocol
//! rules, and assemble the gateway response.

use lambda_runtime::Context;
use tracing::{debug, info};

use crate::app::{ResponseBody, SgiApp};
use crate::environ;
use crate::error::{ProtocolViolation, Result};
use crate::response::ResponseStarter;
use crate::types::{GatewayResponse, ProxyEvent};

/// Adapts API Gateway proxy events to SGI application calls.
///
/// One handler wraps one application for the process lifetime; all
/// per-invocation state (environment, response collector, body
/// accumulator) is constructed fresh inside [`SgiHandler::handle`], so
/// nothing leaks between invocations.
pub struct SgiHandler<A> {
    app: A,
}

impl<A: SgiApp> SgiHandler<A> {
    /// Wrap an application.
    pub fn new(app: A) -> Self {
        Self { app }
    }

    /// Drive one invocation.
    ///
    /// Application failures and protocol violations propagate unchanged,
    /// so the platform's error and telemetry path records the original
    /// cause.
    pub fn handle(&self, event: ProxyEvent, context: Context) -> Result<GatewayResponse> {
        info!(
            method = %event.http_method,
            path = %event.path,
            "handling proxy event"
        );

        let environ = environ::translate(&event, &context);
        let starter = ResponseStarter::new();

        let mut body = self.app.call(environ, starter.clone())?;
        let consumed = consume(&starter, &mut body);
        // The disposal hook runs exactly once, on success and failure
        // alike.
        body.close();
        consumed?;

        let response = starter.finish()?;
        debug!(
            status = response.status_code,
            bytes = response.body.len(),
            "assembled gateway response"
        );
        Ok(response)
    }
}

/// Drain the body sequence into the collector. Headers must be set
/// before the first chunk is committed; the application may satisfy
/// that from inside the sequence itself.
fn consume<B: ResponseBody>(starter: &ResponseStarter, body: &mut B) -> Result<()> {
    while let Some(chunk) = body.next_chunk() {
        let chunk = chunk?;
        if !starter.headers_set() {
            return Err(ProtocolViolation::BodyBeforeHeaders.into());
        }
        starter.append_body_chunk(chunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::environ::Environ;
    use crate::error::{ErrorToken, SgiError};

    fn proxy_event() -> ProxyEvent {
        ProxyEvent {
            http_method: "POST".to_string(),
            path: "/".to_string(),
            query_string_parameters: Some(HashMap::from([("x".to_string(), "y".to_string())])),
            headers: Some(HashMap::from([
                ("Host".to_string(), "localhost".to_string()),
                ("Content-Type".to_string(), "text/plain".to_string()),
            ])),
            body: Some("Hi".to_string()),
        }
    }

    fn bare_event() -> ProxyEvent {
        ProxyEvent {
            http_method: "POST".to_string(),
            path: "/".to_string(),
            query_string_parameters: None,
            headers: Some(HashMap::from([(
                "Host".to_string(),
                "localhost".to_string(),
            )])),
            body: None,
        }
    }

    fn plain_headers() -> Vec<(String, String)> {
        vec![("Content-Type".to_string(), "text/plain".to_string())]
    }

    /// Body sequence that counts disposal calls.
    struct TrackedBody {
        chunks: std::vec::IntoIter<String>,
        closed: Arc<AtomicUsize>,
    }

    impl ResponseBody for TrackedBody {
        fn next_chunk(&mut self) -> Option<Result<String>> {
            self.chunks.next().map(Ok)
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn kitchen_sink() {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let closed = Arc::new(AtomicUsize::new(0));
        let closed_by_body = Arc::clone(&closed);

        let handler = SgiHandler::new(move |mut environ: Environ, starter: ResponseStarter| {
            assert_eq!(environ.request_method, "POST");
            assert_eq!(environ.path_info, "/");
            assert_eq!(environ.query_string, "x=y");
            assert_eq!(environ.server_name, "localhost");
            assert_eq!(environ.server_port, "443");

            let mut body = String::new();
            environ.input.read_to_string(&mut body).unwrap();
            assert_eq!(body, "Hi");

            starter.start("200 Ok", plain_headers(), None)?;
            Ok(TrackedBody {
                chunks: vec!["Hello world".to_string()].into_iter(),
                closed: Arc::clone(&closed_by_body),
            })
        });

        let response = handler.handle(proxy_event(), Context::default()).unwrap();
        assert_eq!(
            response,
            GatewayResponse {
                status_code: 200,
                headers: HashMap::from([(
                    "Content-Type".to_string(),
                    "text/plain".to_string()
                )]),
                body: "Hello world".to_string(),
            }
        );
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn body_before_headers_is_a_protocol_violation() {
        let handler = SgiHandler::new(|_: Environ, _: ResponseStarter| {
            Ok(vec!["Hello world".to_string()].into_iter())
        });

        let err = handler.handle(bare_event(), Context::default()).unwrap_err();
        assert!(matches!(
            err,
            SgiError::Protocol(ProtocolViolation::BodyBeforeHeaders)
        ));
    }

    #[test]
    fn never_starting_a_response_is_a_protocol_violation() {
        let handler = SgiHandler::new(|_: Environ, _: ResponseStarter| {
            Ok(Vec::<String>::new().into_iter())
        });

        let err = handler.handle(bare_event(), Context::default()).unwrap_err();
        assert!(matches!(
            err,
            SgiError::Protocol(ProtocolViolation::HeadersNeverSent)
        ));
    }

    #[test]
    fn close_runs_once_when_consumption_fails() {
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_by_body = Arc::clone(&closed);

        // Chunks without a response start: consumption aborts, but the
        // disposal hook must still run.
        let handler = SgiHandler::new(move |_: Environ, _: ResponseStarter| {
            Ok(TrackedBody {
                chunks: vec!["Hello world".to_string()].into_iter(),
                closed: Arc::clone(&closed_by_body),
            })
        });

        let err = handler.handle(bare_event(), Context::default()).unwrap_err();
        assert!(matches!(
            err,
            SgiError::Protocol(ProtocolViolation::BodyBeforeHeaders)
        ));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn application_errors_propagate_unchanged() {
        let handler = SgiHandler::new(|_: Environ, _: ResponseStarter| {
            Err::<std::vec::IntoIter<String>, _>(SgiError::app("oops"))
        });

        let err = handler.handle(bare_event(), Context::default()).unwrap_err();
        assert!(matches!(err, SgiError::Application(_)));
        assert_eq!(err.to_string(), "oops");
    }

    #[test]
    fn error_token_before_body_replaces_the_response() {
        let handler = SgiHandler::new(|_: Environ, starter: ResponseStarter| {
            starter.start("200 Ok", plain_headers(), None)?;
            // The application traps its own failure and rewrites the
            // response before any body chunk is committed.
            let html = vec![("Content-Type".to_string(), "text/html".to_string())];
            starter.start("500 Oh no", html, Some(ErrorToken::new("trapped")))?;
            Ok(vec!["<h1>Error</h1>".to_string()].into_iter())
        });

        let response = handler.handle(bare_event(), Context::default()).unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.headers["Content-Type"], "text/html");
        assert_eq!(response.body, "<h1>Error</h1>");
    }

    /// Yields one good chunk, then traps a failure and tries to rewrite
    /// the headers mid-body.
    struct FailsMidstream {
        starter: ResponseStarter,
        step: usize,
        closed: Arc<AtomicUsize>,
    }

    impl ResponseBody for FailsMidstream {
        fn next_chunk(&mut self) -> Option<Result<String>> {
            self.step += 1;
            match self.step {
                1 => Some(Ok("Everything's fine".to_string())),
                2 => {
                    let token = ErrorToken::new("exceptional");
                    match self
                        .starter
                        .start("500 Oh no", plain_headers(), Some(token))
                    {
                        Ok(_) => Some(Ok("<h1>Error</h1>".to_string())),
                        Err(err) => Some(Err(err)),
                    }
                }
                _ => None,
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn error_token_after_body_reraises_the_original_error() {
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_by_body = Arc::clone(&closed);

        let handler = SgiHandler::new(move |_: Environ, starter: ResponseStarter| {
            starter.start("200 Ok", plain_headers(), None)?;
            Ok(FailsMidstream {
                starter: starter.clone(),
                step: 0,
                closed: Arc::clone(&closed_by_body),
            })
        });

        let err = handler.handle(bare_event(), Context::default()).unwrap_err();
        assert!(matches!(err, SgiError::Application(_)));
        assert_eq!(err.to_string(), "exceptional");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn writer_chunks_precede_iterated_chunks() {
        let handler = SgiHandler::new(|_: Environ, starter: ResponseStarter| {
            let writer = starter.start("200 Ok", plain_headers(), None)?;
            writer.write("Hello ");
            Ok(vec!["world".to_string()].into_iter())
        });

        let response = handler.handle(bare_event(), Context::default()).unwrap();
        assert_eq!(response.body, "Hello world");
    }

    #[test]
    fn fresh_state_per_invocation() {
        let handler = SgiHandler::new(|_: Environ, starter: ResponseStarter| {
            starter.start("200 Ok", plain_headers(), None)?;
            Ok(vec!["once".to_string()].into_iter())
        });

        let first = handler.handle(bare_event(), Context::default()).unwrap();
        let second = handler.handle(bare_event(), Context::default()).unwrap();
        assert_eq!(first.body, "once");
        // No accumulation across invocations.
        assert_eq!(second.body, "once");
    }
}
