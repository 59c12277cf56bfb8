//! Mollom client
//!
//! # Example
//! ```no_run
//! use mollom_rs::{ContentRequest, MollomClient, MollomConfig};
//!
//! # async fn example() -> mollom_rs::Result<()> {
//! let client = MollomClient::new(MollomConfig::new("public-key", "private-key"))?;
//!
//! let result = client.check_content(&ContentRequest::with_body("Buy cheap pills")).await?;
//! if result.is_spam() {
//!     println!("rejected, session {}", result.session_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{FailurePolicy, MollomConfig, Protocol};
use crate::dispatcher::Dispatcher;
use crate::error::{MollomError, Result};
use crate::mapper::{decode, FromWire, WireEnum};
use crate::model::{
    BlacklistEntry, CaptchaResponse, CheckContentResponse, ContentRequest, Feedback,
    ReputationResponse, SiteInfo, SiteType, SpamClassification, StatisticsType, UrlBlacklistEntry,
    WhitelistEntry,
};
use crate::pool::ServerPool;
use crate::signer::RequestParams;
use crate::transport::{self, Transport};
use crate::wire::WireNode;

struct Inner {
    dispatcher: Dispatcher,
    failure_policy: FailurePolicy,
    config: MollomConfig,
}

/// Client for the Mollom service.
///
/// Cloning is cheap; clones share the server pool and HTTP connections.
#[derive(Clone)]
pub struct MollomClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MollomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MollomClient")
            .field("public_key", &self.inner.config.public_key)
            .field("protocol", &self.inner.config.protocol)
            .field("failure_policy", &self.inner.failure_policy)
            .finish_non_exhaustive()
    }
}

impl MollomClient {
    /// Create a client with its own server pool and transport
    pub fn new(config: MollomConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> MollomClientBuilder {
        MollomClientBuilder::default()
    }

    pub fn config(&self) -> &MollomConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        self.inner.dispatcher.pool()
    }

    async fn call<T: FromWire>(&self, method: &str, params: RequestParams, testing: bool) -> Result<T> {
        self.inner.dispatcher.invoke(method, params, testing).await
    }

    /// Check that the key pair is known to the service
    pub async fn verify_key(&self) -> Result<bool> {
        self.verify_key_with(false).await
    }

    pub async fn verify_key_testing(&self) -> Result<bool> {
        self.verify_key_with(true).await
    }

    async fn verify_key_with(&self, testing: bool) -> Result<bool> {
        let node: WireNode = self.call("verifyKey", RequestParams::new(), testing).await?;
        flag(&node, &["valid", "status"])
    }

    /// Servers the service wants this key to use
    pub async fn server_list(&self, ssl: bool) -> Result<Vec<String>> {
        let mut params = RequestParams::new();
        params.insert_bool("ssl", ssl);
        self.call("getServerList", params, false).await
    }

    /// Classify a piece of content.
    ///
    /// When no server can be reached, the configured [`FailurePolicy`] decides
    /// between returning the error and a synthetic verdict.
    pub async fn check_content(&self, request: &ContentRequest) -> Result<CheckContentResponse> {
        self.check_content_with(request, false).await
    }

    pub async fn check_content_testing(&self, request: &ContentRequest) -> Result<CheckContentResponse> {
        self.check_content_with(request, true).await
    }

    async fn check_content_with(
        &self,
        request: &ContentRequest,
        testing: bool,
    ) -> Result<CheckContentResponse> {
        let result = self.call("checkContent", content_params(request), testing).await;
        apply_failure_policy(self.inner.failure_policy, result)
    }

    /// Fetch an image CAPTCHA for the author
    pub async fn image_captcha(
        &self,
        session_id: Option<&str>,
        author_ip: Option<&str>,
        ssl: bool,
    ) -> Result<CaptchaResponse> {
        self.captcha("getImageCaptcha", session_id, author_ip, ssl, false).await
    }

    pub async fn image_captcha_testing(
        &self,
        session_id: Option<&str>,
        author_ip: Option<&str>,
        ssl: bool,
    ) -> Result<CaptchaResponse> {
        self.captcha("getImageCaptcha", session_id, author_ip, ssl, true).await
    }

    /// Fetch an audio CAPTCHA for the author
    pub async fn audio_captcha(
        &self,
        session_id: Option<&str>,
        author_ip: Option<&str>,
        ssl: bool,
    ) -> Result<CaptchaResponse> {
        self.captcha("getAudioCaptcha", session_id, author_ip, ssl, false).await
    }

    pub async fn audio_captcha_testing(
        &self,
        session_id: Option<&str>,
        author_ip: Option<&str>,
        ssl: bool,
    ) -> Result<CaptchaResponse> {
        self.captcha("getAudioCaptcha", session_id, author_ip, ssl, true).await
    }

    async fn captcha(
        &self,
        method: &str,
        session_id: Option<&str>,
        author_ip: Option<&str>,
        ssl: bool,
        testing: bool,
    ) -> Result<CaptchaResponse> {
        let mut params = RequestParams::new();
        params
            .insert_opt("session_id", session_id)
            .insert_opt("author_ip", author_ip)
            .insert_bool("ssl", ssl);
        self.call(method, params, testing).await
    }

    /// Check the author's answer to a CAPTCHA
    pub async fn check_captcha(
        &self,
        session_id: &str,
        solution: &str,
        author_ip: Option<&str>,
    ) -> Result<bool> {
        self.check_captcha_with(session_id, solution, author_ip, false).await
    }

    pub async fn check_captcha_testing(
        &self,
        session_id: &str,
        solution: &str,
        author_ip: Option<&str>,
    ) -> Result<bool> {
        self.check_captcha_with(session_id, solution, author_ip, true).await
    }

    async fn check_captcha_with(
        &self,
        session_id: &str,
        solution: &str,
        author_ip: Option<&str>,
        testing: bool,
    ) -> Result<bool> {
        if session_id.is_empty() {
            return Err(MollomError::InvalidUsage(
                "check_captcha needs the session id of the CAPTCHA".to_string(),
            ));
        }

        let mut params = RequestParams::new();
        params
            .insert("session_id", session_id)
            .insert("solution", solution)
            .insert_opt("author_ip", author_ip);
        let node: WireNode = self.call("checkCaptcha", params, testing).await?;
        flag(&node, &["solved", "correct"])
    }

    /// Report a moderator verdict on previously checked content
    pub async fn send_feedback(&self, session_id: &str, feedback: Feedback) -> Result<()> {
        self.send_feedback_with(session_id, feedback, false).await
    }

    pub async fn send_feedback_testing(&self, session_id: &str, feedback: Feedback) -> Result<()> {
        self.send_feedback_with(session_id, feedback, true).await
    }

    async fn send_feedback_with(&self, session_id: &str, feedback: Feedback, testing: bool) -> Result<()> {
        let mut params = RequestParams::new();
        params
            .insert("session_id", session_id)
            .insert_enum("feedback", Some(feedback));
        let _: WireNode = self.call("sendFeedback", params, testing).await?;
        Ok(())
    }

    /// Read one of the usage counters for this site
    pub async fn statistics(&self, kind: StatisticsType) -> Result<i64> {
        let mut params = RequestParams::new();
        params.insert_enum("type", Some(kind));
        let node: WireNode = self.call("getStatistics", params, false).await?;
        match node.get("value") {
            Some(value) => decode(value),
            None => decode(&node),
        }
    }

    /// Reputation of an author, identified by any of ip, id or OpenID
    pub async fn author_reputation(&self, author: &AuthorRef<'_>) -> Result<ReputationResponse> {
        self.call("getReputation", author.params(), false).await
    }

    pub async fn author_reputation_testing(&self, author: &AuthorRef<'_>) -> Result<ReputationResponse> {
        self.call("getReputation", author.params(), true).await
    }

    /// Forget what the service knows about an author.
    ///
    /// Outside dedicated servers only the author id is taken into account.
    pub async fn reset_author_reputation(&self, author: &AuthorRef<'_>) -> Result<()> {
        self.reset_author_reputation_with(author, false).await
    }

    pub async fn reset_author_reputation_testing(&self, author: &AuthorRef<'_>) -> Result<()> {
        self.reset_author_reputation_with(author, true).await
    }

    async fn reset_author_reputation_with(&self, author: &AuthorRef<'_>, testing: bool) -> Result<()> {
        if author.is_empty() {
            return Err(MollomError::InvalidUsage(
                "reputation reset needs an author ip, id or OpenID".to_string(),
            ));
        }
        let _: WireNode = self.call("resetReputation", author.params(), testing).await?;
        Ok(())
    }

    /// Text blacklist of this site
    pub fn blacklist(&self) -> Blacklist<'_> {
        Blacklist { client: self }
    }

    /// URL blacklist of this site
    pub fn url_blacklist(&self) -> UrlBlacklist<'_> {
        UrlBlacklist { client: self }
    }

    /// Text whitelist of this site
    pub fn whitelist(&self) -> Whitelist<'_> {
        Whitelist { client: self }
    }

    /// Sites managed by a reseller key
    pub fn sites(&self) -> Sites<'_> {
        Sites { client: self }
    }
}

fn apply_failure_policy(
    policy: FailurePolicy,
    result: Result<CheckContentResponse>,
) -> Result<CheckContentResponse> {
    match result {
        Err(e) if e.is_communication() => match policy {
            FailurePolicy::Throw => Err(e),
            FailurePolicy::FailOpen => {
                warn!("Mollom unreachable, accepting content: {}", e);
                Ok(CheckContentResponse::synthetic(SpamClassification::Ham))
            }
            FailurePolicy::FailClosed => {
                warn!("Mollom unreachable, rejecting content: {}", e);
                Ok(CheckContentResponse::synthetic(SpamClassification::Spam))
            }
        },
        other => other,
    }
}

fn content_params(request: &ContentRequest) -> RequestParams {
    let mut params = RequestParams::new();
    params
        .insert_opt("session_id", request.session_id.as_deref())
        .insert_opt("honeypot", request.honeypot.as_deref())
        .insert_list("checks", request.checks.iter().map(|c| c.as_str().to_lowercase()))
        .insert_opt("reputation", request.reputation.as_deref())
        .insert_list("classifier", &request.classifiers)
        .insert_enum("strictness", request.strictness)
        .insert_opt("post_title", request.post_title.as_deref())
        .insert_opt("post_body", request.post_body.as_deref())
        .insert_opt("author_name", request.author_name.as_deref())
        .insert_opt("author_url", request.author_url.as_deref())
        .insert_opt("author_mail", request.author_mail.as_deref())
        .insert_opt("author_openid", request.author_openid.as_deref())
        .insert_opt("author_ip", request.author_ip.as_deref())
        .insert_opt("author_id", request.author_id.as_deref());
    params
}

/// Boolean answer that may come bare or as a member of a map.
///
/// A map without any of `keys` counts as `true`: the call itself succeeded.
fn flag(node: &WireNode, keys: &[&str]) -> Result<bool> {
    match node {
        WireNode::Map(members) => match keys.iter().find_map(|k| members.get(*k)) {
            Some(value) => decode(value),
            None => Ok(true),
        },
        other => decode(other),
    }
}

/// Operations on the text blacklist
pub struct Blacklist<'a> {
    client: &'a MollomClient,
}

impl Blacklist<'_> {
    pub async fn add(&self, entry: &BlacklistEntry) -> Result<bool> {
        if entry.text.trim().is_empty() {
            return Err(MollomError::InvalidUsage("blacklist text must not be empty".to_string()));
        }

        let mut params = RequestParams::new();
        params
            .insert("text", entry.text.as_str())
            .insert_enum("context", entry.context)
            .insert_enum("match", entry.match_precision)
            .insert_enum("reason", entry.reason)
            .insert_opt("note", non_empty(&entry.note));
        let node: WireNode = self.client.call("addBlacklistText", params, false).await?;
        flag(&node, &[])
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut params = RequestParams::new();
        params.insert("id", id);
        let node: WireNode = self.client.call("removeBlacklistText", params, false).await?;
        flag(&node, &[])
    }

    pub async fn list(&self) -> Result<Vec<BlacklistEntry>> {
        self.client.call("listBlacklistText", RequestParams::new(), false).await
    }
}

/// Operations on the URL blacklist
pub struct UrlBlacklist<'a> {
    client: &'a MollomClient,
}

impl UrlBlacklist<'_> {
    pub async fn add(&self, url: &str) -> Result<()> {
        self.call("addBlacklistURL", url).await
    }

    pub async fn remove(&self, url: &str) -> Result<()> {
        self.call("removeBlacklistURL", url).await
    }

    pub async fn list(&self) -> Result<Vec<UrlBlacklistEntry>> {
        self.client.call("listBlacklistURL", RequestParams::new(), false).await
    }

    async fn call(&self, method: &str, url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(MollomError::InvalidUsage("blacklisted url must not be empty".to_string()));
        }
        let mut params = RequestParams::new();
        params.insert("url", url);
        let _: WireNode = self.client.call(method, params, false).await?;
        Ok(())
    }
}

/// Operations on the text whitelist
pub struct Whitelist<'a> {
    client: &'a MollomClient,
}

impl Whitelist<'_> {
    pub async fn add(&self, entry: &WhitelistEntry) -> Result<bool> {
        if entry.text.trim().is_empty() {
            return Err(MollomError::InvalidUsage("whitelist text must not be empty".to_string()));
        }

        let mut params = RequestParams::new();
        params
            .insert("text", entry.text.as_str())
            .insert_enum("context", entry.context)
            .insert_opt("note", non_empty(&entry.note));
        let node: WireNode = self.client.call("addWhitelistText", params, false).await?;
        flag(&node, &[])
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut params = RequestParams::new();
        params.insert("id", id);
        let node: WireNode = self.client.call("removeWhitelistText", params, false).await?;
        flag(&node, &[])
    }

    pub async fn list(&self) -> Result<Vec<WhitelistEntry>> {
        self.client.call("listWhitelistText", RequestParams::new(), false).await
    }
}

/// Site management for reseller keys
pub struct Sites<'a> {
    client: &'a MollomClient,
}

impl Sites<'_> {
    /// Public keys of every site under this account
    pub async fn list(&self) -> Result<Vec<String>> {
        self.client.call("listSites", RequestParams::new(), false).await
    }

    pub async fn get(&self, client_key: &str) -> Result<SiteInfo> {
        let mut params = RequestParams::new();
        params.insert("client_key", client_key);
        self.client.call("getSite", params, false).await
    }

    /// Register a new site; the answer carries its generated keys
    pub async fn create(&self, site: &SiteInfo) -> Result<SiteInfo> {
        let params = site_params(site)?;
        self.client.call("createSite", params, false).await
    }

    pub async fn update(&self, client_key: &str, site: &SiteInfo) -> Result<bool> {
        let mut params = site_params(site)?;
        params.insert("client_key", client_key);
        let node: WireNode = self.client.call("updateSite", params, false).await?;
        flag(&node, &[])
    }

    pub async fn delete(&self, client_key: &str) -> Result<bool> {
        let mut params = RequestParams::new();
        params.insert("client_key", client_key);
        let node: WireNode = self.client.call("deleteSite", params, false).await?;
        flag(&node, &[])
    }
}

fn site_params(site: &SiteInfo) -> Result<RequestParams> {
    let kind = SiteType::from_wire_str(&site.site_type).ok_or_else(|| {
        MollomError::InvalidUsage(format!(
            "site type '{}' must be one of personal, company, non-profit, customer",
            site.site_type
        ))
    })?;

    let mut params = RequestParams::new();
    params
        .insert_opt("url", non_empty(&site.url))
        .insert_opt("mail", non_empty(&site.mail))
        .insert("status", site.status.to_string())
        .insert_bool("testing", site.testing)
        .insert_opt("language", non_empty(&site.language))
        .insert_enum("type", Some(kind));
    Ok(params)
}

/// Identifies an author for reputation calls
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorRef<'a> {
    pub ip: Option<&'a str>,
    pub id: Option<&'a str>,
    pub openid: Option<&'a str>,
}

impl AuthorRef<'_> {
    fn is_empty(&self) -> bool {
        [self.ip, self.id, self.openid]
            .iter()
            .all(|v| v.map_or(true, |v| v.is_empty()))
    }

    fn params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        params
            .insert_opt("author_ip", self.ip)
            .insert_opt("author_id", self.id)
            .insert_opt("author_openid", self.openid);
        params
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Builder for [`MollomClient`]
pub struct MollomClientBuilder {
    config: MollomConfig,
    pool: Option<Arc<ServerPool>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for MollomClientBuilder {
    fn default() -> Self {
        Self {
            config: MollomConfig::new("", ""),
            pool: None,
            transport: None,
        }
    }
}

impl MollomClientBuilder {
    /// Start from a complete configuration
    pub fn config(mut self, config: MollomConfig) -> Self {
        self.config = config;
        self
    }

    pub fn public_key(mut self, public_key: impl Into<String>) -> Self {
        self.config.public_key = public_key.into();
        self
    }

    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.config.private_key = private_key.into();
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.config.protocol = protocol;
        self
    }

    pub fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    pub fn load_balancing(mut self, load_balancing: bool) -> Self {
        self.config.load_balancing = load_balancing;
        self
    }

    pub fn bootstrap_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.bootstrap_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Share a server pool between clients
    pub fn pool(mut self, pool: Arc<ServerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use a custom transport instead of the one `protocol` selects
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<MollomClient> {
        let config = self.config;
        config.validate()?;

        let pool = self
            .pool
            .unwrap_or_else(|| Arc::new(ServerPool::new(config.bootstrap_servers.clone())));
        let transport = match self.transport {
            Some(transport) => transport,
            None => transport::build(&config)?,
        };

        info!(
            "Mollom client ready ({:?}, {} bootstrap servers, load balancing {})",
            transport.protocol(),
            pool.bootstrap().len(),
            if config.load_balancing { "on" } else { "off" }
        );

        Ok(MollomClient {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(&config, pool, transport),
                failure_policy: config.failure_policy,
                config,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Check, Strictness};
    use crate::transport::{Outcome, ScriptedTransport};

    const A: &str = "http://a";

    fn client(transport: Arc<ScriptedTransport>, policy: FailurePolicy) -> MollomClient {
        MollomClient::builder()
            .public_key("pub")
            .private_key("priv")
            .bootstrap_servers([A])
            .failure_policy(policy)
            .transport(transport)
            .build()
            .unwrap()
    }

    fn down() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new().script(A, vec![Outcome::RetryableServerError(1200)]))
    }

    #[test]
    fn test_builder_rejects_missing_keys() {
        let result = MollomClient::builder().public_key("pub").build();
        assert!(matches!(result, Err(MollomError::Config(_))));
    }

    #[tokio::test]
    async fn test_throw_policy_propagates() {
        let client = client(down(), FailurePolicy::Throw);
        let result = client.check_content(&ContentRequest::with_body("hi")).await;
        assert!(matches!(result, Err(MollomError::Communication(_))));
    }

    #[tokio::test]
    async fn test_fail_open_and_closed() {
        let open = client(down(), FailurePolicy::FailOpen);
        assert!(open.check_content(&ContentRequest::default()).await.unwrap().is_ham());

        let closed = client(down(), FailurePolicy::FailClosed);
        assert!(closed.check_content(&ContentRequest::default()).await.unwrap().is_spam());
    }

    #[tokio::test]
    async fn test_failure_policy_never_masks_rejection() {
        let transport = Arc::new(
            ScriptedTransport::new().script(A, vec![Outcome::FatalClientError("bad hash".to_string())]),
        );
        let client = client(transport, FailurePolicy::FailOpen);
        let result = client.check_content(&ContentRequest::default()).await;
        assert!(matches!(result, Err(MollomError::Rejected { .. })));
    }

    #[test]
    fn test_content_params() {
        let request = ContentRequest {
            checks: vec![Check::Spam, Check::Profanity],
            strictness: Some(Strictness::Strict),
            author_name: Some("Alice".to_string()),
            ..ContentRequest::with_body("hello")
        };
        let params = content_params(&request);
        assert_eq!(params.get("checks"), Some("spam,profanity"));
        assert_eq!(params.get("strictness"), Some("strict"));
        assert_eq!(params.get("author_name"), Some("Alice"));
        assert_eq!(params.get("post_body"), Some("hello"));
        assert_eq!(params.get("post_title"), None);
        assert_eq!(params.get("classifier"), None);
    }

    #[test]
    fn test_flag() {
        assert!(flag(&WireNode::Bool(true), &[]).unwrap());
        assert!(!flag(&WireNode::Int(0), &[]).unwrap());
        assert!(!flag(&WireNode::map([("solved", WireNode::from("0"))]), &["solved"]).unwrap());
        assert!(flag(&WireNode::map([("id", WireNode::from("x"))]), &["solved"]).unwrap());
        assert!(flag(&WireNode::List(vec![]), &[]).is_err());
    }

    #[test]
    fn test_site_type_is_validated() {
        let site = SiteInfo {
            url: "http://example.com".to_string(),
            site_type: "hobby".to_string(),
            ..Default::default()
        };
        assert!(matches!(site_params(&site), Err(MollomError::InvalidUsage(_))));

        let site = SiteInfo {
            site_type: "Non-Profit".to_string(),
            ..site
        };
        let params = site_params(&site).unwrap();
        assert_eq!(params.get("type"), Some("non-profit"));
        assert_eq!(params.get("testing"), Some("0"));
    }

    #[tokio::test]
    async fn test_check_captcha_requires_session() {
        let client = client(down(), FailurePolicy::Throw);
        let result = client.check_captcha("", "abc", None).await;
        assert!(matches!(result, Err(MollomError::InvalidUsage(_))));
    }

    #[tokio::test]
    async fn test_testing_variant_sets_flag() {
        let transport = Arc::new(
            ScriptedTransport::new().script(A, vec![Outcome::Success(WireNode::Bool(true))]),
        );
        let client = client(transport.clone(), FailurePolicy::Throw);
        assert!(client.verify_key().await.unwrap());
        assert!(client.verify_key_testing().await.unwrap());

        let calls = transport.calls();
        assert_eq!(calls[0].method, "verifyKey");
        assert!(!calls[0].params.contains_key("testing"));
        assert_eq!(calls[1].params.get("testing").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_statistics_value_member() {
        let transport = Arc::new(ScriptedTransport::new().script(
            A,
            vec![Outcome::Success(WireNode::map([
                ("type", WireNode::from("total_days")),
                ("value", WireNode::from("12")),
            ]))],
        ));
        let client = client(transport, FailurePolicy::Throw);
        assert_eq!(client.statistics(StatisticsType::TotalDays).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_author_reputation_params() {
        let transport = Arc::new(ScriptedTransport::new().script(
            A,
            vec![Outcome::Success(WireNode::map([
                ("reputation", WireNode::from("good")),
                ("score", WireNode::Double(0.9)),
            ]))],
        ));
        let client = client(transport.clone(), FailurePolicy::Throw);

        let author = AuthorRef {
            id: Some("42"),
            openid: Some("https://alice.example"),
            ..Default::default()
        };
        let reputation = client.author_reputation(&author).await.unwrap();
        assert_eq!(reputation.reputation, Some(crate::model::Reputation::Good));
        assert_eq!(reputation.score, 0.9);

        let call = &transport.calls()[0];
        assert_eq!(call.method, "getReputation");
        assert_eq!(call.params.get("author_id").map(String::as_str), Some("42"));
        assert_eq!(
            call.params.get("author_openid").map(String::as_str),
            Some("https://alice.example")
        );
        assert!(!call.params.contains_key("author_ip"));
    }

    #[tokio::test]
    async fn test_reset_reputation_requires_author() {
        let transport = Arc::new(
            ScriptedTransport::new().script(A, vec![Outcome::Success(WireNode::Bool(true))]),
        );
        let client = client(transport.clone(), FailurePolicy::Throw);

        let result = client.reset_author_reputation(&AuthorRef::default()).await;
        assert!(matches!(result, Err(MollomError::InvalidUsage(_))));
        assert!(transport.calls().is_empty());

        let author = AuthorRef {
            ip: Some("10.0.0.1"),
            ..Default::default()
        };
        client.reset_author_reputation_testing(&author).await.unwrap();
        let call = &transport.calls()[0];
        assert_eq!(call.method, "resetReputation");
        assert_eq!(call.params.get("testing").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_url_blacklist_calls() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script(A, vec![Outcome::Success(WireNode::Bool(true))])
                .script_method(
                    A,
                    "listBlacklistURL",
                    vec![Outcome::Success(WireNode::List(vec![WireNode::map([
                        ("url", WireNode::from("http://spam.example")),
                        ("created", WireNode::from("20261018T12:00:00")),
                    ])]))],
                ),
        );
        let client = client(transport.clone(), FailurePolicy::Throw);
        let urls = client.url_blacklist();

        urls.add("http://spam.example").await.unwrap();
        assert!(matches!(urls.remove(" ").await, Err(MollomError::InvalidUsage(_))));
        let entries = urls.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "http://spam.example");

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "addBlacklistURL");
        assert_eq!(
            calls[0].params.get("url").map(String::as_str),
            Some("http://spam.example")
        );
    }

    #[tokio::test]
    async fn test_audio_captcha_testing_sets_flag() {
        let transport = Arc::new(ScriptedTransport::new().script(
            A,
            vec![Outcome::Success(WireNode::map([
                ("session_id", WireNode::from("s1")),
                ("url", WireNode::from("http://a/captcha.mp3")),
            ]))],
        ));
        let client = client(transport.clone(), FailurePolicy::Throw);

        let captcha = client.audio_captcha_testing(None, None, false).await.unwrap();
        assert_eq!(captcha.session_id, "s1");

        let call = &transport.calls()[0];
        assert_eq!(call.method, "getAudioCaptcha");
        assert_eq!(call.params.get("testing").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_classifiers_keep_their_case() {
        let request = ContentRequest {
            classifiers: vec!["SiteSpecific".to_string(), "forum".to_string()],
            ..ContentRequest::with_body("hello")
        };
        let params = content_params(&request);
        assert_eq!(params.get("classifier"), Some("SiteSpecific,forum"));
        assert_eq!(params.get("checks"), Some("spam"));
    }
}
