//! Translation of proxy events into the canonical SGI request environment.
//!
//! [`translate`] is a pure function over the event and its invocation
//! context. Malformed events produce a best-effort environment; anything
//! the application then trips over surfaces as the application's own
//! failure, not the adapter's.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};

use bytes::Bytes;
use http::Extensions;
use lambda_runtime::Context;
use tracing::error;

use crate::types::ProxyEvent;

/// Protocol version marker handed to every application.
pub const SGI_VERSION: (u8, u8) = (1, 0);

/// Canonical request environment passed to the wrapped application.
///
/// One `Environ` is constructed per invocation and handed to the
/// application by value; the application may mutate it freely. Every
/// field the calling convention requires is populated before the
/// application runs.
#[derive(Debug)]
pub struct Environ {
    /// HTTP request method verb. Never empty.
    pub request_method: String,
    /// Mount-point prefix of the application. Always empty: the adapter
    /// mounts applications at the root.
    pub script_name: String,
    /// Remainder of the request path below the mount point.
    pub path_info: String,
    /// URL-encoded query string; empty when the event carried no
    /// parameters.
    pub query_string: String,
    /// `Content-Type` of the request, when the client sent one.
    pub content_type: Option<String>,
    /// Byte length of the request body. Always synthesized from the
    /// body itself; the gateway does not forward the client's header
    /// reliably.
    pub content_length: u64,
    /// Host the request was addressed to.
    pub server_name: String,
    /// Effective port, kept as a string per the calling convention.
    pub server_port: String,
    /// Protocol version string. Fixed at `"HTTP/1.1"`.
    pub server_protocol: String,
    /// Secure-transport on-flag; set when the effective scheme is https.
    pub https: bool,
    /// Protocol version marker, always [`SGI_VERSION`].
    pub sgi_version: (u8, u8),
    /// Effective URL scheme, `"https"` unless the gateway forwarded
    /// something else.
    pub url_scheme: String,
    /// Request body input stream, positioned at the start.
    pub input: Cursor<Bytes>,
    /// Error-output sink for the application; lines land in the
    /// structured log.
    pub errors: ErrorSink,
    /// The application is never invoked concurrently on another thread
    /// of this process.
    pub multithread: bool,
    /// An equivalent application may run concurrently in another
    /// process.
    pub multiprocess: bool,
    /// The invocation is not guaranteed to be the only one in the
    /// process lifetime.
    pub run_once: bool,
    /// Request headers under normalized keys (`HTTP_HOST`,
    /// `HTTP_X_FORWARDED_PROTO`, ...), including the synthesized
    /// `HTTP_CONTENT_LENGTH`.
    pub headers: HashMap<String, String>,
    /// Escape hatch carrying the original [`ProxyEvent`] and [`Context`]
    /// for application introspection.
    pub extensions: Extensions,
}

impl Environ {
    /// Look up a request header by its HTTP name, e.g.
    /// `"X-Forwarded-Proto"`. Lookups are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&normalize(name)).map(String::as_str)
    }
}

/// Build the request environment for one invocation.
///
/// Total function: absent optional mappings default to empty, and the
/// content length is derived from the body. The one exception is an
/// event without a `Host` header, which indicates a malformed upstream
/// event and panics rather than being defended against.
pub fn translate(event: &ProxyEvent, context: &Context) -> Environ {
    // The raw event and context stay reachable for applications that
    // want more than the canonical fields.
    let mut extensions = Extensions::new();
    extensions.insert(event.clone());
    extensions.insert(context.clone());

    // Header case is normalized here; every later lookup relies on it.
    let mut headers = derive_headers(event);

    // The gateway does not forward Content-Length reliably; synthesize
    // it from the body, overwriting whatever the client claimed.
    let content_length = event.body.as_deref().unwrap_or("").len() as u64;
    headers.insert(
        "HTTP_CONTENT_LENGTH".to_string(),
        content_length.to_string(),
    );

    let query_string = encode_query(event.query_string_parameters.as_ref());
    let content_type = headers.get("HTTP_CONTENT_TYPE").cloned();

    let server_name = headers
        .get("HTTP_HOST")
        .expect("proxy event did not carry a Host header")
        .clone();

    let url_scheme = headers
        .get("HTTP_X_FORWARDED_PROTO")
        .cloned()
        .unwrap_or_else(|| "https".to_string());

    let server_port = headers
        .get("HTTP_X_FORWARDED_PORT")
        .filter(|port| !port.is_empty())
        .cloned()
        .unwrap_or_else(|| match url_scheme.as_str() {
            "http" => "80".to_string(),
            _ => "443".to_string(),
        });

    let body = event
        .body
        .as_deref()
        .map(|body| Bytes::copy_from_slice(body.as_bytes()))
        .unwrap_or_default();

    Environ {
        request_method: event.http_method.clone(),
        script_name: String::new(),
        path_info: event.path.clone(),
        query_string,
        content_type,
        content_length,
        server_name,
        server_port,
        server_protocol: "HTTP/1.1".to_string(),
        https: url_scheme == "https",
        sgi_version: SGI_VERSION,
        url_scheme,
        input: Cursor::new(body),
        errors: ErrorSink::default(),
        multithread: false,
        multiprocess: true,
        run_once: false,
        headers,
        extensions,
    }
}

/// Normalized header key: upper-cased, dashes to underscores, `HTTP_`
/// prefix.
fn normalize(name: &str) -> String {
    format!("HTTP_{}", name.to_ascii_uppercase().replace('-', "_"))
}

/// Request headers under normalized keys; an absent header mapping
/// derives an empty set.
fn derive_headers(event: &ProxyEvent) -> HashMap<String, String> {
    event
        .headers
        .as_ref()
        .map(|headers| {
            headers
                .iter()
                .map(|(name, value)| (normalize(name), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// URL-encode the query parameters; absent and empty both encode to `""`.
/// Pairs are emitted in key order so the encoding is deterministic.
fn encode_query(params: Option<&HashMap<String, String>>) -> String {
    let Some(params) = params else {
        return String::new();
    };

    let mut pairs: Vec<_> = params.iter().collect();
    pairs.sort();

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Error-output sink handed to applications.
///
/// Buffers written bytes and forwards each complete line to the
/// structured log, so application error output lands in the platform's
/// log stream alongside the adapter's own.
#[derive(Debug, Default)]
pub struct ErrorSink {
    pending: String,
}

impl Write for ErrorSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            error!(target: "sgi_aws_lambda::app", "{}", line.trim_end());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            error!(target: "sgi_aws_lambda::app", "{}", self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}
