//! Scripted transport
//!
//! Answers from a per-server script instead of the network, and records every
//! call. Useful for exercising failover without a live service.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

use super::{Outcome, Transport};
use crate::config::Protocol;
use crate::signer::Envelope;

/// A call seen by a [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server: String,
    pub method: String,
    pub params: BTreeMap<String, String>,
}

/// Outcomes for one server. The last one repeats once the rest are used up.
#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
}

impl Script {
    fn next(&mut self) -> Option<Outcome> {
        if self.outcomes.len() > 1 {
            self.outcomes.pop_front()
        } else {
            self.outcomes.front().cloned()
        }
    }
}

/// In-memory transport driven by scripted outcomes
#[derive(Debug)]
pub struct ScriptedTransport {
    protocol: Protocol,
    scripts: Mutex<HashMap<(String, Option<String>), Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            protocol: Protocol::XmlRpc,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Answer every call to `server` with `outcomes`, in order
    pub fn script(self, server: &str, outcomes: Vec<Outcome>) -> Self {
        self.insert(server, None, outcomes);
        self
    }

    /// Answer calls of `method` (without namespace) to `server` with
    /// `outcomes`. Takes priority over [`script`](Self::script).
    pub fn script_method(self, server: &str, method: &str, outcomes: Vec<Outcome>) -> Self {
        self.insert(server, Some(method.to_string()), outcomes);
        self
    }

    fn insert(&self, server: &str, method: Option<String>, outcomes: Vec<Outcome>) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.insert(
            (server.to_string(), method),
            Script {
                outcomes: outcomes.into(),
            },
        );
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of calls made to `server`
    pub fn calls_to(&self, server: &str) -> usize {
        self.calls().iter().filter(|c| c.server == server).count()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, envelope: &Envelope) -> Outcome {
        let server = match super::target(envelope) {
            Ok(server) => server.to_string(),
            Err(outcome) => return outcome,
        };
        let method = envelope.short_method().to_string();

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                server: server.clone(),
                method: method.clone(),
                params: envelope.params.clone(),
            });

        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = scripts
            .get_mut(&(server.clone(), Some(method.clone())))
            .and_then(Script::next)
            .or_else(|| scripts.get_mut(&(server.clone(), None)).and_then(Script::next))
            .unwrap_or_else(|| Outcome::TransportFailure(format!("no script for {}", server)));

        debug!("ScriptedTransport: {} {} -> {:?}", server, method, outcome);
        outcome
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }
}
