//! Classification of transport failures.
//!
//! reqwest flags timeouts and connect failures, but not DNS or TLS failures.
//! Those are told apart by the messages of the connector's source chain. The
//! outermost reqwest message carries the request URL and is never read, so a
//! URL mentioning `ssl` or `timeout` cannot change the verdict.

use std::error::Error as StdError;
use std::io;

/// What went wrong below HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The host name did not resolve.
    UnknownHost,
    /// TLS handshake or certificate failure.
    Tls,
    /// Connect or read timed out.
    Timeout,
    /// Anything else.
    Other,
}

/// Classifies a reqwest error by its kind and source chain.
#[must_use]
pub fn classify_transport_error(error: &reqwest::Error) -> TransportFailure {
    if error.is_timeout() || has_timed_out_io(error) {
        return TransportFailure::Timeout;
    }
    if !error.is_connect() {
        return TransportFailure::Other;
    }
    classify_chain(&source_messages(error))
}

/// Lower-cased messages of the causes below `error`, outermost first.
fn source_messages(error: &reqwest::Error) -> Vec<String> {
    let mut messages = Vec::new();
    let mut source = error.source();
    while let Some(inner) = source {
        messages.push(inner.to_string().to_lowercase());
        source = inner.source();
    }
    messages
}

fn has_timed_out_io(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(inner) = source {
        if inner
            .downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Classifies the lower-cased cause messages of a connect failure,
/// outermost first. The request URL must not be among them.
#[must_use]
pub fn classify_chain(messages: &[String]) -> TransportFailure {
    let any = |needles: &[&str]| {
        messages
            .iter()
            .any(|m| needles.iter().any(|needle| m.contains(needle)))
    };

    if any(&[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
    ]) {
        TransportFailure::UnknownHost
    } else if any(&["certificate", "tls", "ssl", "handshake"]) {
        TransportFailure::Tls
    } else if any(&["timed out"]) {
        TransportFailure::Timeout
    } else {
        TransportFailure::Other
    }
}

/// Full error chain joined for log and comment output.
#[must_use]
pub fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
