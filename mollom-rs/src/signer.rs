//! Request signing
//!
//! Every call carries the site's public key, a timestamp, a nonce and an
//! HMAC-SHA1 hash over `time:nonce:private_key`, keyed by the private key.
//!
//! # Example
//! ```
//! use mollom_rs::signer::{RequestParams, RequestSigner};
//!
//! let signer = RequestSigner::new("public", "private", "1.0", false);
//! let envelope = signer.sign("checkContent", RequestParams::new().with("post_body", "hi"), false);
//! assert_eq!(envelope.method, "mollom.checkContent");
//! assert!(envelope.params.contains_key("hash"));
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::hmac;
use std::collections::BTreeMap;
use tracing::debug;

use crate::mapper::WireEnum;

const METHOD_NAMESPACE: &str = "mollom.";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Named request parameters, all sent as strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    values: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Insert only when a value is present
    pub fn insert_opt(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Booleans travel as `1` / `0`
    pub fn insert_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.insert(key, if value { "1" } else { "0" })
    }

    pub fn insert_enum<E: WireEnum>(&mut self, key: &str, value: Option<E>) -> &mut Self {
        self.insert_opt(key, value.map(|v| v.as_wire_str()))
    }

    /// Lists travel comma-joined; an empty list is left out
    pub fn insert_list<I, S>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        if !joined.is_empty() {
            self.insert(key, joined);
        }
        self
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A signed request, ready for a transport
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Namespaced method name, e.g. `mollom.checkContent`
    pub method: String,
    pub params: BTreeMap<String, String>,
    pub api_version: String,
    /// Server the envelope is addressed to; set by the dispatcher per attempt
    pub server: Option<String>,
}

impl Envelope {
    /// Method name without the `mollom.` namespace
    pub fn short_method(&self) -> &str {
        self.method
            .strip_prefix(METHOD_NAMESPACE)
            .unwrap_or(&self.method)
    }

    /// Copy of this envelope addressed to `server`
    pub fn for_server(&self, server: &str) -> Self {
        Self {
            server: Some(server.to_string()),
            ..self.clone()
        }
    }
}

/// Builds signed envelopes for one credential pair
#[derive(Clone)]
pub struct RequestSigner {
    public_key: String,
    private_key: String,
    api_version: String,
    testing: bool,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("public_key", &self.public_key)
            .field("api_version", &self.api_version)
            .field("testing", &self.testing)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        api_version: impl Into<String>,
        testing: bool,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            api_version: api_version.into(),
            testing,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Sign a call to `method` with fresh time and nonce values
    pub fn sign(&self, method: &str, params: RequestParams, testing: bool) -> Envelope {
        let time = chrono::Utc::now().format(TIME_FORMAT).to_string();
        let nonce = format!("{:x}", rand::random::<u64>());
        self.sign_with(method, params, testing, &time, &nonce)
    }

    fn sign_with(
        &self,
        method: &str,
        params: RequestParams,
        testing: bool,
        time: &str,
        nonce: &str,
    ) -> Envelope {
        let hash = compute_hash(time, nonce, &self.private_key);

        let mut values = params.values;
        values.insert("public_key".to_string(), self.public_key.clone());
        values.insert("time".to_string(), time.to_string());
        values.insert("nonce".to_string(), nonce.to_string());
        values.insert("hash".to_string(), hash);
        if self.testing || testing {
            values.insert("testing".to_string(), "1".to_string());
        }

        let method = if method.starts_with(METHOD_NAMESPACE) {
            method.to_string()
        } else {
            format!("{}{}", METHOD_NAMESPACE, method)
        };

        debug!("Signed {} (nonce {})", method, nonce);

        Envelope {
            method,
            params: values,
            api_version: self.api_version.clone(),
            server: None,
        }
    }
}

/// Base64 HMAC-SHA1 over `time:nonce:private_key`, keyed by the private key
pub fn compute_hash(time: &str, nonce: &str, private_key: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, private_key.as_bytes());
    let message = format!("{}:{}:{}", time, nonce, private_key);
    let tag = hmac::sign(&key, message.as_bytes());
    BASE64.encode(tag.as_ref())
}
