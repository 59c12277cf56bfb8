//! Transports
//!
//! A transport sends one signed [`Envelope`] to the server named in it and
//! classifies what came back. It never retries; that is the dispatcher's job.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{MollomConfig, Protocol};
use crate::error::{MollomError, Result};
use crate::signer::Envelope;
use crate::wire::WireNode;

pub mod mock;
pub mod rest;
mod xml;
pub mod xmlrpc;

pub use mock::ScriptedTransport;
pub use rest::RestTransport;
pub use xmlrpc::XmlRpcTransport;

/// Generic service error; the request itself is at fault
pub const FAULT_ERROR: i64 = 1000;
/// The server list held by the client is stale
pub const FAULT_REFRESH: i64 = 1100;
/// The server is too busy; another one may answer
pub const FAULT_BUSY: i64 = 1200;
/// Reported for network-level failures on the RPC transport
pub const NETWORK_ERROR: i32 = 9000;

/// What a single attempt against one server produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The server answered; the payload still needs decoding
    Success(WireNode),
    /// This server failed but another may succeed
    RetryableServerError(i32),
    /// The server list must be fetched again
    RefreshServerList,
    /// The request is wrong; no server will accept it
    FatalClientError(String),
    /// The call did not complete at the network level
    TransportFailure(String),
}

impl Outcome {
    /// Classify a service fault code
    pub fn from_fault(code: i64, message: &str) -> Self {
        match code {
            FAULT_ERROR => Outcome::FatalClientError(message.to_string()),
            FAULT_REFRESH => Outcome::RefreshServerList,
            FAULT_BUSY => Outcome::RetryableServerError(FAULT_BUSY as i32),
            other => Outcome::TransportFailure(format!("fault {}: {}", other, message)),
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_server_error() {
            Outcome::RetryableServerError(i32::from(status.as_u16()))
        } else {
            let detail = body.trim();
            if detail.is_empty() {
                Outcome::FatalClientError(format!("HTTP {}", status))
            } else {
                Outcome::FatalClientError(format!("HTTP {}: {}", status, truncate(detail, 200)))
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Wire protocol implementation
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `envelope` to `envelope.server` and classify the result
    async fn execute(&self, envelope: &Envelope) -> Outcome;

    /// Protocol spoken by this transport
    fn protocol(&self) -> Protocol;
}

/// Build the HTTP client shared by the transports
pub fn http_client(config: &MollomConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.read_timeout())
        .user_agent(concat!("mollom-rs/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| MollomError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Build the transport selected by `config.protocol`
pub fn build(config: &MollomConfig) -> Result<Arc<dyn Transport>> {
    let client = http_client(config)?;
    Ok(match config.protocol {
        Protocol::XmlRpc => Arc::new(XmlRpcTransport::new(client)),
        Protocol::Rest => Arc::new(RestTransport::new(client)),
    })
}

/// Envelope target, or a fatal outcome when the dispatcher forgot to set one
pub(crate) fn target(envelope: &Envelope) -> std::result::Result<&str, Outcome> {
    envelope
        .server
        .as_deref()
        .map(|server| server.trim_end_matches('/'))
        .ok_or_else(|| Outcome::FatalClientError("envelope has no target server".to_string()))
}
