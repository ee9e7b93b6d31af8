//! HTTP connection layer: client construction, transport-error
//! classification, and the [`ConnectionManager`].

mod attempt;
mod client;
mod error;
mod manager;
mod transport;

pub use attempt::Attempt;
pub use client::build_client;
pub use error::ConnectionError;
pub use manager::ConnectionManager;
pub use transport::{TransportFailure, classify_chain, classify_transport_error, describe};
