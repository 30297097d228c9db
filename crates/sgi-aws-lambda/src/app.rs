//! The application-facing calling convention.

use crate::environ::Environ;
use crate::error::Result;
use crate::response::ResponseStarter;

/// A synchronous gateway interface application.
///
/// Invoked once per event with the canonical request environment and a
/// response-starting handle; returns its body as a chunk sequence. The
/// application must call [`ResponseStarter::start`] before the first
/// chunk of that sequence is consumed.
pub trait SgiApp {
    /// Body sequence type produced by the application.
    type Body: ResponseBody;

    /// Handle one request.
    fn call(&self, environ: Environ, starter: ResponseStarter) -> Result<Self::Body>;
}

/// Plain functions and closures are applications, mirroring the
/// runtime's `service_fn` idiom.
impl<F, B> SgiApp for F
where
    F: Fn(Environ, ResponseStarter) -> Result<B>,
    B: ResponseBody,
{
    type Body = B;

    fn call(&self, environ: Environ, starter: ResponseStarter) -> Result<B> {
        self(environ, starter)
    }
}

/// An ordered sequence of response body chunks.
///
/// `close` is the disposal hook: the orchestrator invokes it exactly
/// once on every exit path from consumption, so resources held by the
/// sequence are released whether consumption finishes normally or
/// fails partway.
pub trait ResponseBody {
    /// Produce the next chunk, or `None` once the sequence is
    /// exhausted. An error aborts consumption and propagates to the
    /// platform.
    fn next_chunk(&mut self) -> Option<Result<String>>;

    /// Release any resources held by the sequence. The default does
    /// nothing.
    fn close(&mut self) {}
}

/// Any string iterator is a body with nothing to dispose.
impl<I> ResponseBody for I
where
    I: Iterator<Item = String>,
{
    fn next_chunk(&mut self) -> Option<Result<String>> {
        self.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_iterators_are_bodies() {
        let mut body = vec!["a".to_string(), "b".to_string()].into_iter();
        assert_eq!(body.next_chunk().unwrap().unwrap(), "a");
        assert_eq!(body.next_chunk().unwrap().unwrap(), "b");
        assert!(body.next_chunk().is_none());
        body.close();
    }
}
