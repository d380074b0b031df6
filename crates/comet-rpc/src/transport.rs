//! Blocking HTTP transport.
//!
//! COMET calls are plain `GET`s. The [`Transport`] trait is the seam between
//! the client and the network: the client hands over a fully built request
//! and gets back status, content type and body. Non-2xx statuses are
//! responses, not errors; the client decides what they mean.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use tracing::trace;

use crate::error::TransportError;

/// One outgoing `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

/// What came back, with the body read in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

pub trait Transport: Send + Sync {
    /// Perform the request.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if no response could be obtained.
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).get(request)
    }
}

/// [`Transport`] over a `ureq` agent.
///
/// Idle connections are not kept: every call opens its own connection, which
/// is what the controller's web server copes with best.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    #[must_use]
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new().max_idle_connections(0).build();
        Self { agent }
    }

    /// Use a preconfigured agent (proxy, custom resolver).
    #[must_use]
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut call = self.agent.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let response = match call.call() {
            Ok(resp) | Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => return Err(classify(&err)),
        };

        let status = response.status();
        let content_type = response.header("Content-Type").map(str::to_string);
        trace!(status, content_type = ?content_type, "Received HTTP response");

        let body = response.into_string().map_err(|err| {
            if is_timeout(&err) {
                TransportError::Timeout
            } else {
                TransportError::Io(err)
            }
        })?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn classify(err: &ureq::Transport) -> TransportError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        if current.downcast_ref::<io::Error>().is_some_and(is_timeout) {
            return TransportError::Timeout;
        }
        source = current.source();
    }

    let message = err.to_string();
    if message.contains("timed out") {
        return TransportError::Timeout;
    }
    TransportError::Connection(message)
}
