//! Outbound HTTP transport.
//!
//! The forwarder talks to backends only through [`Transport`], so retry and
//! timeout behaviour can be exercised without sockets.

use std::error::Error as StdError;
use std::io;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::ForwardedResponse;

/// Failure below the HTTP response level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Refused, reset or closed before a complete response.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Anything else (malformed response, oversize body, bad request line).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn is_connection(&self) -> bool {
        matches!(self, TransportError::Connection(_))
    }
}

/// Sends one request and buffers the whole response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<ForwardedResponse, TransportError>;
}

/// Pooled hyper-util client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    max_response_bytes: usize,
}

impl HyperTransport {
    pub fn new(max_response_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            max_response_bytes,
        }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<ForwardedResponse, TransportError> {
        let response = self.client.request(request).await.map_err(|err| {
            if err.is_connect() || is_connection_failure(&err) {
                TransportError::Connection(err.to_string())
            } else {
                TransportError::Protocol(err.to_string())
            }
        })?;

        let (parts, body) = response.into_parts();
        let body = match Limited::new(body, self.max_response_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(TransportError::Protocol(format!(
                    "response body exceeds {} bytes",
                    self.max_response_bytes
                )));
            }
            Err(err) if is_connection_failure(&*err) => {
                return Err(TransportError::Connection(err.to_string()));
            }
            Err(err) => return Err(TransportError::Protocol(err.to_string())),
        };

        Ok(ForwardedResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

/// Walk the source chain looking for a dropped or refused connection.
fn is_connection_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() || hyper_err.is_closed() {
                return true;
            }
        }
        current = cause.source();
    }
    false
}
