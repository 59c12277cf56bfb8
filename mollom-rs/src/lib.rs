//! mollom-rs: client for the Mollom content classification service
//!
//! Submits content, CAPTCHA answers, feedback and moderation list entries to
//! Mollom and maps the answers onto typed values.
//!
//! # Features
//!
//! - XML-RPC and REST transports behind one client
//! - HMAC-SHA1 request signing
//! - Server failover with automatic server list refresh
//! - Fail-open / fail-closed policy when the service is unreachable
//! - Configuration from TOML files and `MOLLOM_*` environment variables
//!
//! # Example Configuration
//!
//! ```toml
//! public_key = "7c5b2f..."
//! private_key = "a3e9d1..."
//! protocol = "rest"
//! bootstrap_servers = ["http://rest.mollom.com"]
//! failure_policy = "fail-open"
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod pool;
pub mod signer;
pub mod transport;
pub mod wire;

pub use client::{AuthorRef, MollomClient, MollomClientBuilder};
pub use config::{FailurePolicy, MollomConfig, Protocol};
pub use error::{MollomError, Result};
pub use model::{
    BlacklistContext, BlacklistEntry, BlacklistReason, CaptchaResponse, Check,
    CheckContentResponse, ContentRequest, Feedback, Language, MatchPrecision, Reputation,
    ReputationResponse, SiteInfo, SiteType, SpamClassification, StatisticsType, Strictness,
    UrlBlacklistEntry, WhitelistEntry,
};
pub use pool::ServerPool;
pub use wire::WireNode;
