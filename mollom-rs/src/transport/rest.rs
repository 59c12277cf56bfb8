//! REST transport
//!
//! Each logical method maps to an HTTP verb and a path template under
//! `{server}/{api_version}/`. Template placeholders such as `{public_key}` are
//! filled from the request parameters; the rest go in the query string (GET,
//! DELETE) or a form body (POST).
//!
//! Responses are XML by default, JSON when the content type says so. Either
//! way they are normalized to a [`WireNode`]:
//!
//! ```xml
//! <response>
//!   <code>200</code>
//!   <list><server>http://a</server><server>http://b</server></list>
//! </response>
//! ```
//!
//! yields the list `["http://a", "http://b"]`.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::xml::{parse_document, XmlElement};
use super::{Outcome, Transport};
use crate::config::Protocol;
use crate::signer::Envelope;
use crate::wire::WireNode;

/// HTTP verb used by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Delete,
}

/// Mapping from a logical method to an HTTP endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Method name without the `mollom.` namespace
    pub method: &'static str,
    pub verb: HttpVerb,
    /// Path template relative to the API version, e.g. `blacklist/{public_key}`
    pub path: &'static str,
}

const fn route(method: &'static str, verb: HttpVerb, path: &'static str) -> Route {
    Route { method, verb, path }
}

const STANDARD_ROUTES: &[Route] = &[
    route("getServerList", HttpVerb::Get, "site/serverlist"),
    route("verifyKey", HttpVerb::Get, "key/{public_key}"),
    route("checkContent", HttpVerb::Post, "content"),
    route("getImageCaptcha", HttpVerb::Post, "captcha/image"),
    route("getAudioCaptcha", HttpVerb::Post, "captcha/audio"),
    route("checkCaptcha", HttpVerb::Post, "captcha/verify/{session_id}"),
    route("sendFeedback", HttpVerb::Post, "feedback"),
    route("getReputation", HttpVerb::Get, "user/reputation"),
    route("getStatistics", HttpVerb::Get, "statistics"),
    route("listBlacklistText", HttpVerb::Get, "blacklist/{public_key}"),
    route("addBlacklistText", HttpVerb::Post, "blacklist/{public_key}"),
    route("removeBlacklistText", HttpVerb::Delete, "blacklist/{public_key}/{id}"),
    route("listWhitelistText", HttpVerb::Get, "whitelist/{public_key}"),
    route("addWhitelistText", HttpVerb::Post, "whitelist/{public_key}"),
    route("removeWhitelistText", HttpVerb::Delete, "whitelist/{public_key}/{id}"),
    route("listSites", HttpVerb::Get, "site"),
    route("getSite", HttpVerb::Get, "site/{client_key}"),
    route("createSite", HttpVerb::Post, "site"),
    route("updateSite", HttpVerb::Post, "site/{client_key}"),
    route("deleteSite", HttpVerb::Delete, "site/{client_key}"),
];

/// A route with its placeholders filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub verb: HttpVerb,
    /// Path segments, not yet percent-encoded
    pub segments: Vec<String>,
    /// Parameters left after filling placeholders
    pub params: BTreeMap<String, String>,
}

/// Table of routes keyed by method
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Routes of the public REST API
    pub fn standard() -> Self {
        Self::new(STANDARD_ROUTES.to_vec())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route for `method` and fill its placeholders from `params`
    pub fn resolve(
        &self,
        method: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<ResolvedRoute, String> {
        let route = self
            .routes
            .iter()
            .find(|r| r.method == method)
            .ok_or_else(|| format!("no REST route for method {}", method))?;

        let mut remaining = params.clone();
        let mut segments = Vec::new();
        for segment in route.path.split('/').filter(|s| !s.is_empty()) {
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    let value = remaining
                        .remove(name)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| {
                            format!("missing parameter '{}' for {} {}", name, method, route.path)
                        })?;
                    segments.push(value);
                }
                None => segments.push(segment.to_string()),
            }
        }

        Ok(ResolvedRoute {
            verb: route.verb,
            segments,
            params: remaining,
        })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// REST transport over a shared HTTP client
pub struct RestTransport {
    client: reqwest::Client,
    routes: RouteTable,
}

impl RestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_routes(client, RouteTable::standard())
    }

    pub fn with_routes(client: reqwest::Client, routes: RouteTable) -> Self {
        Self { client, routes }
    }

    fn url(&self, server: &str, api_version: &str, segments: &[String]) -> Result<reqwest::Url, String> {
        let mut url =
            reqwest::Url::parse(server).map_err(|e| format!("invalid server URL '{}': {}", server, e))?;
        url.path_segments_mut()
            .map_err(|_| format!("server URL '{}' cannot carry a path", server))?
            .pop_if_empty()
            .push(api_version)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn execute(&self, envelope: &Envelope) -> Outcome {
        let server = match super::target(envelope) {
            Ok(server) => server,
            Err(outcome) => return outcome,
        };

        let route = match self.routes.resolve(envelope.short_method(), &envelope.params) {
            Ok(route) => route,
            Err(e) => return Outcome::FatalClientError(e),
        };
        let url = match self.url(server, &envelope.api_version, &route.segments) {
            Ok(url) => url,
            Err(e) => return Outcome::FatalClientError(e),
        };

        debug!("REST {:?} {} ({})", route.verb, url, envelope.method);

        let request = match route.verb {
            HttpVerb::Get => self.client.get(url.clone()).query(&route.params),
            HttpVerb::Post => self.client.post(url.clone()).form(&route.params),
            HttpVerb::Delete => self.client.delete(url.clone()).query(&route.params),
        };

        let response = match request.header("Accept", "application/xml").send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("REST call to {} failed: {}", url, e);
                return Outcome::TransportFailure(e.to_string());
            }
        };

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read REST response from {}: {}", url, e);
                return Outcome::TransportFailure(e.to_string());
            }
        };

        if !status.is_success() {
            return Outcome::from_status(status, &body);
        }

        match decode_body(&body, is_json) {
            Ok(root) => classify(root),
            Err(e) => Outcome::FatalClientError(format!("malformed response: {}", e)),
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::Rest
    }
}

/// Parse a response body into a node tree
pub fn decode_body(body: &str, is_json: bool) -> Result<WireNode, String> {
    if is_json {
        serde_json::from_str::<serde_json::Value>(body)
            .map(WireNode::from)
            .map_err(|e| format!("invalid JSON: {}", e))
    } else {
        parse_document(body).map(|root| element_to_node(&root))
    }
}

/// Check the response `code` and extract the payload
pub fn classify(root: WireNode) -> Outcome {
    let WireNode::Map(mut members) = root else {
        return Outcome::Success(root);
    };

    let message = members
        .remove("message")
        .and_then(|m| m.scalar_text())
        .unwrap_or_default();

    if let Some(code) = members.remove("code") {
        let parsed = match &code {
            WireNode::Int(code) => Some(*code),
            WireNode::String(code) => code.trim().parse().ok(),
            _ => None,
        };
        match parsed {
            Some(200) => {}
            Some(code) => return Outcome::from_fault(code, &message),
            None => {
                return Outcome::FatalClientError(format!(
                    "malformed response: invalid code '{}'",
                    code
                ))
            }
        }
    }

    if members.len() == 1 {
        if let Some((_, payload)) = members.pop_first() {
            return Outcome::Success(payload);
        }
    }
    Outcome::Success(WireNode::Map(members))
}

/// Convert an element to a node.
///
/// Leaves become strings. Children sharing one name become a list when there
/// are several of them, or when the parent is `list` or their plural.
/// Anything else is a map, with repeated names collapsed into lists.
fn element_to_node(element: &XmlElement) -> WireNode {
    let Some(first) = element.children.first() else {
        return WireNode::String(element.text.trim().to_string());
    };

    let uniform = element.children.iter().all(|c| c.name == first.name);
    let plural = format!("{}s", first.name);
    if uniform
        && (element.children.len() > 1 || element.name == "list" || element.name == plural)
    {
        return WireNode::List(element.children.iter().map(element_to_node).collect());
    }

    let mut grouped: BTreeMap<String, Vec<WireNode>> = BTreeMap::new();
    for child in &element.children {
        grouped
            .entry(child.name.clone())
            .or_default()
            .push(element_to_node(child));
    }

    WireNode::Map(
        grouped
            .into_iter()
            .map(|(name, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    WireNode::List(values)
                };
                (name, value)
            })
            .collect(),
    )
}
