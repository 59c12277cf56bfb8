//! XML-RPC transport
//!
//! Calls are POSTed to `{server}/{api_version}` as a `methodCall` whose only
//! parameter is a struct of string members.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quick_xml::escape::escape;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::xml::{parse_document, XmlElement};
use super::{Outcome, Transport, NETWORK_ERROR};
use crate::config::Protocol;
use crate::signer::Envelope;
use crate::wire::WireNode;

/// A decoded `methodResponse`
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Value(WireNode),
    Fault { code: i64, message: String },
}

/// XML-RPC transport over a shared HTTP client
pub struct XmlRpcTransport {
    client: reqwest::Client,
}

impl XmlRpcTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for XmlRpcTransport {
    async fn execute(&self, envelope: &Envelope) -> Outcome {
        let server = match super::target(envelope) {
            Ok(server) => server,
            Err(outcome) => return outcome,
        };
        let url = format!("{}/{}", server, envelope.api_version);
        debug!("XML-RPC {} -> {}", envelope.method, url);

        let result = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/xml")
            .body(encode_call(envelope))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("XML-RPC call to {} failed: {}", url, e);
                return Outcome::RetryableServerError(NETWORK_ERROR);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read XML-RPC response from {}: {}", url, e);
                return Outcome::RetryableServerError(NETWORK_ERROR);
            }
        };

        match classify_reply(status, &body) {
            Outcome::Success(node) => Outcome::Success(node),
            other => {
                debug!("XML-RPC {} on {}: {:?}", envelope.method, server, other);
                other
            }
        }
    }

    fn protocol(&self) -> Protocol {
        Protocol::XmlRpc
    }
}

/// Classify an HTTP reply to a `methodCall`.
///
/// Only faults carry a verdict from the service. A 4xx status or a body that
/// is not a `methodResponse` means the node is not speaking XML-RPC, so the
/// next server is tried.
pub fn classify_reply(status: reqwest::StatusCode, body: &str) -> Outcome {
    if status.is_server_error() {
        return Outcome::RetryableServerError(i32::from(status.as_u16()));
    }
    if !status.is_success() {
        warn!("XML-RPC node answered HTTP {}", status);
        return Outcome::RetryableServerError(NETWORK_ERROR);
    }

    match decode_response(body) {
        Ok(RpcReply::Value(node)) => Outcome::Success(node),
        Ok(RpcReply::Fault { code, message }) => Outcome::from_fault(code, &message),
        Err(e) => {
            warn!("Unreadable XML-RPC response: {}", e);
            Outcome::RetryableServerError(NETWORK_ERROR)
        }
    }
}

/// Serialize an envelope as a `methodCall` document
pub fn encode_call(envelope: &Envelope) -> String {
    let mut xml = String::with_capacity(256 + envelope.params.len() * 64);
    xml.push_str("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    xml.push_str(&escape(envelope.method.as_str()));
    xml.push_str("</methodName><params><param><value><struct>");
    for (name, value) in &envelope.params {
        xml.push_str("<member><name>");
        xml.push_str(&escape(name.as_str()));
        xml.push_str("</name><value><string>");
        xml.push_str(&escape(value.as_str()));
        xml.push_str("</string></value></member>");
    }
    xml.push_str("</struct></value></param></params></methodCall>");
    xml
}

/// Parse a `methodResponse` document
pub fn decode_response(body: &str) -> Result<RpcReply, String> {
    let root = parse_document(body)?;
    if root.name != "methodResponse" {
        return Err(format!("unexpected root element <{}>", root.name));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| "fault without value".to_string())?;
        let node = decode_value(value)?;
        let code = match node.get("faultCode") {
            Some(WireNode::Int(code)) => *code,
            Some(WireNode::String(code)) => code
                .trim()
                .parse()
                .map_err(|_| format!("non-numeric fault code '{}'", code))?,
            _ => return Err("fault without faultCode".to_string()),
        };
        let message = node
            .get("faultString")
            .and_then(WireNode::scalar_text)
            .unwrap_or_default();
        return Ok(RpcReply::Fault { code, message });
    }

    let value = root
        .child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"))
        .ok_or_else(|| "response without params".to_string())?;
    decode_value(value).map(RpcReply::Value)
}

fn decode_value(value: &XmlElement) -> Result<WireNode, String> {
    // untyped values are strings
    let Some(typed) = value.children.first() else {
        return Ok(WireNode::String(value.text.clone()));
    };

    let text = typed.text.trim();
    match typed.name.as_str() {
        "string" => Ok(WireNode::String(typed.text.clone())),
        "int" | "i4" | "i8" => text
            .parse()
            .map(WireNode::Int)
            .map_err(|_| format!("invalid integer '{}'", text)),
        "boolean" => match text {
            "1" => Ok(WireNode::Bool(true)),
            "0" => Ok(WireNode::Bool(false)),
            other => Err(format!("invalid boolean '{}'", other)),
        },
        "double" => text
            .parse()
            .map(WireNode::Double)
            .map_err(|_| format!("invalid double '{}'", text)),
        "dateTime.iso8601" => Ok(WireNode::String(text.to_string())),
        "base64" => {
            let compact: String = text.split_whitespace().collect();
            BASE64
                .decode(compact)
                .map(|bytes| WireNode::String(String::from_utf8_lossy(&bytes).into_owned()))
                .map_err(|e| format!("invalid base64: {}", e))
        }
        "nil" => Ok(WireNode::Nil),
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.trim().to_string())
                    .ok_or_else(|| "struct member without name".to_string())?;
                let value = match member.child("value") {
                    Some(value) => decode_value(value)?,
                    None => WireNode::Nil,
                };
                members.insert(name, value);
            }
            Ok(WireNode::Map(members))
        }
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .children_named("value")
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(WireNode::List(items))
        }
        other => Err(format!("unsupported value type <{}>", other)),
    }
}
