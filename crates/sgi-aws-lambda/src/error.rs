//! Error handling for the SGI gateway adapter.

use std::fmt;

use thiserror::Error;

/// Boxed error type used for captured application failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, SgiError>;

/// Errors that can occur while driving an application through one
/// invocation.
#[derive(Error, Debug)]
pub enum SgiError {
    /// The wrapped application misused the two-phase response protocol.
    /// Never retried or suppressed; this is a programming defect in the
    /// application.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The wrapped application itself failed. The captured error is
    /// carried through unchanged so platform logging records the true
    /// cause.
    #[error(transparent)]
    Application(#[from] ErrorToken),
}

impl SgiError {
    /// Wrap an application failure without constructing an explicit
    /// [`ErrorToken`] first.
    pub fn app(err: impl Into<BoxError>) -> Self {
        SgiError::Application(ErrorToken::new(err))
    }
}

/// A misuse of the start-before-body response protocol.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The response was started a second time without an error token.
    #[error("headers already sent; a second response start must carry an error token")]
    SecondStartWithoutErrorToken,

    /// The status line was not of the form `"<code> <reason>"`.
    #[error("application sent malformed status line {0:?}")]
    MalformedStatusLine(String),

    /// A body chunk was produced before the response was started.
    #[error("headers must be sent before body")]
    BodyBeforeHeaders,

    /// The application finished without ever starting a response.
    #[error("application didn't send headers")]
    HeadersNeverSent,
}

/// An opaque captured application error.
///
/// Applications attach a token to a second response start after trapping
/// their own failure. The collector accepts the replacement headers while
/// no body bytes are committed; once the body has started, the token is
/// re-signalled to the caller instead.
#[derive(Debug)]
pub struct ErrorToken(BoxError);

impl ErrorToken {
    /// Capture an application error for later re-signalling.
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }

    /// Consume the token, returning the captured error.
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl fmt::Display for ErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ErrorToken {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}
