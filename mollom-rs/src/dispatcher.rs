//! Request dispatch with server failover
//!
//! A call is signed once and then tried against the servers of the pool in
//! order. What happens after each attempt depends on the classified
//! [`Outcome`]:
//!
//! - success: decode the payload and return it
//! - retryable error or network failure: move on to the next server
//! - stale server list: refresh the pool and start over, a bounded number
//!   of times
//! - fatal error: stop and report it
//!
//! When every server has failed the pool is marked exhausted and the call
//! fails with [`MollomError::Communication`].

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::MollomConfig;
use crate::error::{MollomError, Result};
use crate::mapper::{decode, FromWire};
use crate::pool::ServerPool;
use crate::signer::{Envelope, RequestParams, RequestSigner};
use crate::transport::{Outcome, Transport};
use crate::wire::WireNode;

const GET_SERVER_LIST: &str = "getServerList";

/// Runs signed calls against the server pool
pub struct Dispatcher {
    signer: RequestSigner,
    pool: Arc<ServerPool>,
    transport: Arc<dyn Transport>,
    load_balancing: bool,
    max_refreshes: u32,
    fixed_server_attempts: u32,
}

impl Dispatcher {
    pub fn new(config: &MollomConfig, pool: Arc<ServerPool>, transport: Arc<dyn Transport>) -> Self {
        Self {
            signer: RequestSigner::new(
                config.public_key.clone(),
                config.private_key.clone(),
                config.api_version.clone(),
                config.testing,
            ),
            pool,
            transport,
            load_balancing: config.load_balancing,
            max_refreshes: config.max_refreshes,
            fixed_server_attempts: config.fixed_server_attempts.max(1),
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn public_key(&self) -> &str {
        self.signer.public_key()
    }

    /// Call `method` and decode the answer into `T`
    pub async fn invoke<T: FromWire>(
        &self,
        method: &str,
        params: RequestParams,
        testing: bool,
    ) -> Result<T> {
        let envelope = self.signer.sign(method, params, testing);

        let node = if self.load_balancing {
            self.invoke_balanced(&envelope).await?
        } else {
            self.invoke_fixed(&envelope).await?
        };

        decode::<T>(&node).map_err(|e| {
            warn!("Could not decode {} response: {}", envelope.method, e);
            e
        })
    }

    /// Without load balancing every attempt goes to the first bootstrap server
    async fn invoke_fixed(&self, envelope: &Envelope) -> Result<WireNode> {
        let bootstrap = self.pool.bootstrap();
        let server = bootstrap
            .first()
            .ok_or_else(|| MollomError::Config("No bootstrap servers configured".to_string()))?;
        let envelope = envelope.for_server(server);

        let mut last_failure = String::new();
        for attempt in 1..=self.fixed_server_attempts {
            match self.transport.execute(&envelope).await {
                Outcome::Success(node) => return Ok(node),
                Outcome::FatalClientError(message) => return Err(MollomError::rejected(message)),
                Outcome::RefreshServerList => {
                    return Err(MollomError::Communication(format!(
                        "{} asked for a server list refresh but load balancing is disabled",
                        server
                    )))
                }
                Outcome::RetryableServerError(code) => {
                    warn!(
                        "{} on {} failed with code {} (attempt {}/{})",
                        envelope.method, server, code, attempt, self.fixed_server_attempts
                    );
                    last_failure = format!("server error {}", code);
                }
                Outcome::TransportFailure(message) => {
                    warn!(
                        "{} on {} failed: {} (attempt {}/{})",
                        envelope.method, server, message, attempt, self.fixed_server_attempts
                    );
                    last_failure = message;
                }
            }
        }

        Err(MollomError::Communication(format!(
            "{} failed after {} attempts: {}",
            server, self.fixed_server_attempts, last_failure
        )))
    }

    async fn invoke_balanced(&self, envelope: &Envelope) -> Result<WireNode> {
        let public_key = self.signer.public_key();

        let mut servers = self.pool.current(public_key).await;
        if servers.is_empty() {
            info!("Server list for {} is exhausted, refreshing", public_key);
            servers = self.refresh_servers().await;
        }

        let mut refreshes = 0;
        let mut index = 0;
        while index < servers.len() {
            let server = servers[index].clone();
            debug!("{} -> {} ({}/{})", envelope.method, server, index + 1, servers.len());

            match self.transport.execute(&envelope.for_server(&server)).await {
                Outcome::Success(node) => return Ok(node),
                Outcome::FatalClientError(message) => {
                    debug!("{} rejected by {}: {}", envelope.method, server, message);
                    return Err(MollomError::rejected(message));
                }
                Outcome::RefreshServerList if refreshes < self.max_refreshes => {
                    refreshes += 1;
                    info!(
                        "{} asked for a server list refresh ({}/{})",
                        server, refreshes, self.max_refreshes
                    );
                    servers = self.refresh_servers().await;
                    index = 0;
                    continue;
                }
                Outcome::RefreshServerList => {
                    warn!("{} asked for another refresh, limit reached; trying next server", server);
                }
                Outcome::RetryableServerError(code) => {
                    warn!("{} on {} failed with code {}, trying next server", envelope.method, server, code);
                }
                Outcome::TransportFailure(message) => {
                    warn!("{} on {} failed: {}, trying next server", envelope.method, server, message);
                }
            }

            index += 1;
        }

        self.pool.exhaust(public_key).await;
        error!("All Mollom servers are down");
        Err(MollomError::Communication(format!(
            "all {} servers failed for {}",
            servers.len(),
            envelope.method
        )))
    }

    async fn refresh_servers(&self) -> Arc<Vec<String>> {
        self.pool
            .refresh(self.signer.public_key(), |bootstrap| {
                self.fetch_server_list(bootstrap)
            })
            .await
    }

    /// Ask the bootstrap servers, one after another, for the server list
    async fn fetch_server_list(&self, bootstrap: Arc<Vec<String>>) -> Result<Vec<String>> {
        let envelope = self.signer.sign(GET_SERVER_LIST, RequestParams::new(), false);

        for server in bootstrap.iter() {
            match self.transport.execute(&envelope.for_server(server)).await {
                Outcome::Success(node) => return decode::<Vec<String>>(&node),
                Outcome::FatalClientError(message) => return Err(MollomError::rejected(message)),
                other => debug!("Server list request to {} failed: {:?}", server, other),
            }
        }

        Err(MollomError::Communication(
            "no bootstrap server returned a server list".to_string(),
        ))
    }
}
