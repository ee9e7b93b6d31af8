//! Shared helpers for the integration tests: a fast engine configuration and
//! canned mock responses.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use docfinder_core::config::{EngineConfig, FailureThresholds, PolitenessBand, TimeoutSettings};
use docfinder_core::{AlreadyFoundIndex, ConnectionManager, DomainHealthStore, ResolutionEngine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::ResponseTemplate;

/// Domain key of every wiremock server (IP literals are kept whole).
pub const MOCK_DOMAIN: &str = "127.0.0.1";

/// Configuration without politeness delays and with short timeouts.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        politeness: PolitenessBand::disabled(),
        timeouts: TimeoutSettings {
            head: Duration::from_secs(2),
            get: Duration::from_secs(2),
        },
        get_only_domains: Vec::new(),
        ..EngineConfig::default()
    }
}

/// [`test_config`] with custom thresholds.
pub fn config_with_thresholds(thresholds: FailureThresholds) -> EngineConfig {
    EngineConfig {
        thresholds,
        ..test_config()
    }
}

/// Health store and manager built from `config`.
pub fn manager(config: &EngineConfig) -> Arc<ConnectionManager> {
    let health = Arc::new(DomainHealthStore::with_politeness(
        config.thresholds,
        config.politeness,
    ));
    Arc::new(ConnectionManager::new(config, health).expect("client should build"))
}

/// Engine without retrieval built from `config`.
pub fn engine(config: &EngineConfig) -> ResolutionEngine {
    ResolutionEngine::new(config, manager(config), Arc::new(AlreadyFoundIndex::new()))
}

/// Body served by [`pdf_response`].
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// A 200 carrying a small PDF.
pub fn pdf_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(PDF_BYTES.to_vec(), "application/pdf")
}

/// A 200 HTML page.
pub fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

/// A redirect to `location`.
pub fn redirect_to(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("location", location)
}

/// A 200 whose body never arrives (the test HEAD timeout is 2 s).
pub fn stalled_response(delay: Duration) -> ResponseTemplate {
    pdf_response().set_delay(delay)
}

/// A port on 127.0.0.1 with nothing listening.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    listener.local_addr().expect("bound address").port()
}

/// Serves an HTML response whose headers arrive at once but whose body
/// stalls after a few bytes. Returns the base URL.
pub async fn stalled_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("bound address");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0_u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 4096\r\n\r\n<html>",
                    )
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    format!("http://{addr}")
}
