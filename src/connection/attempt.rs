//! One opened HTTP response and the helpers that read from it.

use futures_util::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Method, Response};
use tracing::trace;
use url::Url;

use super::error::ConnectionError;
use crate::classify::{BodySniff, SNIFF_LIMIT, sniff_prefix};

/// A response obtained by [`ConnectionManager::attempt`](super::ConnectionManager::attempt).
///
/// Status and headers are copied out up front so they stay readable after
/// the body was consumed or the attempt was closed.
#[derive(Debug)]
pub struct Attempt {
    url: Url,
    method: Method,
    status: u16,
    headers: HeaderMap,
    response: Option<Response>,
}

impl Attempt {
    pub(crate) fn new(url: Url, method: Method, response: Response) -> Self {
        Self {
            url,
            method,
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            response: Some(response),
        }
    }

    /// URL actually requested, after scheme and artefact rewrites.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Method used for the final request.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns whether the status is 3xx.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Header value as text, if present and printable.
    #[must_use]
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Location` header.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION).filter(|v| !v.trim().is_empty())
    }

    /// `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE).filter(|v| !v.trim().is_empty())
    }

    /// `Content-Disposition` header.
    #[must_use]
    pub fn content_disposition(&self) -> Option<&str> {
        self.header(CONTENT_DISPOSITION)
            .filter(|v| !v.trim().is_empty())
    }

    /// Declared body size.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Takes the live response out, leaving the attempt closed.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Releases the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.response.take().is_some() {
            trace!(url = %self.url, "connection closed");
        }
    }

    /// Returns whether the connection was already released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.response.is_none()
    }

    /// Reads the body up to `limit` bytes, then closes. Bytes past the limit
    /// are not read.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Timeout`] or [`ConnectionError::Protocol`]
    /// if the stream fails.
    pub async fn read_body(&mut self, limit: usize) -> Result<Vec<u8>, ConnectionError> {
        let Some(response) = self.response.take() else {
            return Ok(Vec::new());
        };
        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.stream_error(&e))?;
            let room = limit.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= limit {
                trace!(url = %self.url, limit, "body truncated at limit");
                break;
            }
        }
        Ok(body)
    }

    /// Reads just enough of the body to sniff its type, then closes.
    ///
    /// # Errors
    ///
    /// Same as [`read_body`](Self::read_body).
    pub async fn sniff(&mut self) -> Result<BodySniff, ConnectionError> {
        let Some(response) = self.response.take() else {
            return Ok(BodySniff::Undefined);
        };
        let mut stream = response.bytes_stream();
        let mut prefix = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.stream_error(&e))?;
            let room = SNIFF_LIMIT.saturating_sub(prefix.len());
            prefix.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if let Some(sniff) = sniff_prefix(&prefix, false) {
                return Ok(sniff);
            }
        }
        Ok(sniff_prefix(&prefix, true).unwrap_or(BodySniff::Undefined))
    }

    fn stream_error(&self, error: &reqwest::Error) -> ConnectionError {
        if error.is_timeout() {
            ConnectionError::timeout(self.url.as_str())
        } else {
            ConnectionError::protocol(self.url.as_str(), super::transport::describe(error))
        }
    }
}
