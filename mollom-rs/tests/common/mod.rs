//! In-process fake Mollom service
//!
//! Serves both protocols from one axum router:
//! - XML-RPC on `POST /1.0`
//! - REST under `/1.0/...`
//!
//! Requests are checked against the shared test key pair. Content whose body
//! mentions "spam" is classified as spam, "ham" as ham, anything else unsure.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Router};
use mollom_rs::signer::compute_hash;
use mollom_rs::{MollomClient, Protocol};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PUBLIC_KEY: &str = "test-public-key";
pub const PRIVATE_KEY: &str = "test-private-key";
pub const CAPTCHA_SOLUTION: &str = "correct";

type Params = HashMap<String, String>;

/// How the fake answers calls other than `getServerList`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Fault 1200
    Busy,
    /// Fault 1100
    Refresh,
    /// HTTP 503
    Unavailable,
}

pub struct FakeState {
    url: String,
    mode: Mutex<Mode>,
    server_list: Mutex<Vec<String>>,
    blacklist: Mutex<Vec<(String, String)>>,
    next_id: AtomicUsize,
    hits: AtomicUsize,
    requests: Mutex<Vec<(String, Params)>>,
}

/// A running fake service
pub struct FakeMollom {
    pub url: String,
    state: Arc<FakeState>,
}

impl FakeMollom {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(FakeState {
            url: url.clone(),
            mode: Mutex::new(Mode::Normal),
            server_list: Mutex::new(vec![url.clone()]),
            blacklist: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            hits: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.state.mode.lock().unwrap() = mode;
    }

    /// Servers returned by `getServerList`
    pub fn set_server_list(&self, servers: Vec<String>) {
        *self.state.server_list.lock().unwrap() = servers;
    }

    /// Requests received, excluding `getServerList`
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Method and parameters of every request received
    pub fn requests(&self) -> Vec<(String, Params)> {
        self.state.requests.lock().unwrap().clone()
    }
}

/// URL of a port nothing listens on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

/// URL of a node that answers every request with `status` and `body`
pub async fn stub_url(status: StatusCode, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let app = Router::new().fallback(move || async move { (status, body) });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    url
}

/// Client for the given servers, in testing mode
pub fn client(protocol: Protocol, servers: &[&str]) -> MollomClient {
    client_builder(protocol, servers).build().unwrap()
}

pub fn client_builder(protocol: Protocol, servers: &[&str]) -> mollom_rs::MollomClientBuilder {
    let mut config = mollom_rs::MollomConfig::new(PUBLIC_KEY, PRIVATE_KEY);
    config.protocol = protocol;
    config.testing = true;
    config.connect_timeout_ms = 1_000;
    config.read_timeout_ms = 2_000;
    config.bootstrap_servers = servers.iter().map(|s| s.to_string()).collect();
    MollomClient::builder().config(config)
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/1.0", post(xmlrpc))
        .route("/1.0/site/serverlist", get(rest_server_list))
        .route("/1.0/key/:public_key", get(rest_verify_key))
        .route("/1.0/content", post(rest_content))
        .route("/1.0/captcha/image", post(rest_captcha))
        .route("/1.0/captcha/verify/:session_id", post(rest_check_captcha))
        .route("/1.0/feedback", post(rest_ok))
        .route("/1.0/user/reputation", get(rest_reputation))
        .route(
            "/1.0/blacklist/:public_key",
            get(rest_list_blacklist).post(rest_add_blacklist),
        )
        .route("/1.0/blacklist/:public_key/:id", delete(rest_remove_blacklist))
        .with_state(state)
}

/// Failures shared by both protocols
enum Failure {
    Fault(i64, &'static str),
    Unavailable,
}

fn check(state: &FakeState, method: &str, params: &Params) -> Result<(), Failure> {
    state
        .requests
        .lock()
        .unwrap()
        .push((method.to_string(), params.clone()));

    let signed = match (params.get("time"), params.get("nonce"), params.get("hash")) {
        (Some(time), Some(nonce), Some(hash)) => {
            *hash == compute_hash(time, nonce, PRIVATE_KEY)
                && params.get("public_key").map(String::as_str) == Some(PUBLIC_KEY)
        }
        _ => false,
    };
    if !signed {
        return Err(Failure::Fault(1000, "invalid request signature"));
    }

    if method == "getServerList" {
        return Ok(());
    }
    state.hits.fetch_add(1, Ordering::SeqCst);

    match *state.mode.lock().unwrap() {
        Mode::Normal => Ok(()),
        Mode::Busy => Err(Failure::Fault(1200, "server busy")),
        Mode::Refresh => Err(Failure::Fault(1100, "refresh server list")),
        Mode::Unavailable => Err(Failure::Unavailable),
    }
}

fn classify_body(body: &str) -> (i64, &'static str) {
    if body.contains("spam") {
        (2, "spam")
    } else if body.contains("ham") {
        (1, "ham")
    } else {
        (3, "unsure")
    }
}

fn add_blacklist(state: &FakeState, text: &str) -> String {
    let id = state.next_id.fetch_add(1, Ordering::SeqCst).to_string();
    state
        .blacklist
        .lock()
        .unwrap()
        .push((id.clone(), text.to_string()));
    id
}

fn remove_blacklist(state: &FakeState, id: &str) -> bool {
    let mut list = state.blacklist.lock().unwrap();
    let before = list.len();
    list.retain(|(entry_id, _)| entry_id != id);
    list.len() != before
}

// XML-RPC

async fn xmlrpc(State(state): State<Arc<FakeState>>, body: String) -> Response {
    let method = between(&body, "<methodName>", "</methodName>")
        .unwrap_or_default()
        .trim_start_matches("mollom.")
        .to_string();
    let params = rpc_params(&body);

    if let Err(failure) = check(&state, &method, &params) {
        return match failure {
            Failure::Fault(code, message) => xml(rpc_fault(code, message)),
            Failure::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        };
    }

    let value = match method.as_str() {
        "getServerList" => rpc_array(
            state
                .server_list
                .lock()
                .unwrap()
                .iter()
                .map(|s| format!("<string>{}</string>", s)),
        ),
        "verifyKey" | "sendFeedback" => "<boolean>1</boolean>".to_string(),
        "checkContent" => {
            let (spam, _) = classify_body(params.get("post_body").map(String::as_str).unwrap_or(""));
            rpc_struct(&[
                ("session_id", "<string>rpc-session</string>".to_string()),
                ("spam", format!("<int>{}</int>", spam)),
                ("quality", "<double>0.5</double>".to_string()),
            ])
        }
        "getImageCaptcha" | "getAudioCaptcha" => rpc_struct(&[
            ("session_id", "<string>captcha-session</string>".to_string()),
            ("url", format!("<string>{}/captcha.png</string>", state.url)),
        ]),
        "checkCaptcha" => {
            let solved = params.get("solution").map(String::as_str) == Some(CAPTCHA_SOLUTION);
            format!("<boolean>{}</boolean>", if solved { 1 } else { 0 })
        }
        "addBlacklistText" => {
            add_blacklist(&state, params.get("text").map(String::as_str).unwrap_or(""));
            "<boolean>1</boolean>".to_string()
        }
        "removeBlacklistText" => {
            let removed = remove_blacklist(&state, params.get("id").map(String::as_str).unwrap_or(""));
            format!("<boolean>{}</boolean>", if removed { 1 } else { 0 })
        }
        "getReputation" => rpc_struct(&[
            ("reputation", "<string>average</string>".to_string()),
            ("score", "<double>0.5</double>".to_string()),
            ("confidence", "<double>0.25</double>".to_string()),
        ]),
        "listBlacklistText" => rpc_array(state.blacklist.lock().unwrap().iter().map(|(id, text)| {
            rpc_struct(&[
                ("id", format!("<string>{}</string>", id)),
                ("text", format!("<string>{}</string>", text)),
                ("reason", "<string>spam</string>".to_string()),
                ("match", "<string>contains</string>".to_string()),
            ])
        })),
        _ => return xml(rpc_fault(1000, "unknown method")),
    };

    xml(format!(
        "<?xml version=\"1.0\"?><methodResponse><params><param><value>{}</value></param></params></methodResponse>",
        value
    ))
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

fn rpc_params(body: &str) -> Params {
    let mut params = Params::new();
    let mut rest = body;
    while let Some(pos) = rest.find("<member>") {
        rest = &rest[pos + "<member>".len()..];
        let name = between(rest, "<name>", "</name>").unwrap_or_default();
        let value = between(rest, "<string>", "</string>").unwrap_or_default();
        params.insert(unescape(name), unescape(value));
    }
    params
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn rpc_struct(members: &[(&str, String)]) -> String {
    let members: String = members
        .iter()
        .map(|(name, value)| format!("<member><name>{}</name><value>{}</value></member>", name, value))
        .collect();
    format!("<struct>{}</struct>", members)
}

fn rpc_array(values: impl Iterator<Item = String>) -> String {
    let values: String = values.map(|v| format!("<value>{}</value>", v)).collect();
    format!("<array><data>{}</data></array>", values)
}

fn rpc_fault(code: i64, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><fault><value>{}</value></fault></methodResponse>",
        rpc_struct(&[
            ("faultCode", format!("<int>{}</int>", code)),
            ("faultString", format!("<string>{}</string>", message)),
        ])
    )
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

// REST

fn rest_failure(failure: Failure) -> Response {
    match failure {
        // a bad signature is an authentication error over REST
        Failure::Fault(1000, message) => (StatusCode::UNAUTHORIZED, message).into_response(),
        Failure::Fault(code, message) => xml(format!(
            "<response><code>{}</code><message>{}</message></response>",
            code, message
        )),
        Failure::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

fn rest_ok_body(payload: &str) -> Response {
    xml(format!("<response><code>200</code>{}</response>", payload))
}

async fn rest_server_list(State(state): State<Arc<FakeState>>, Query(params): Query<Params>) -> Response {
    if let Err(failure) = check(&state, "getServerList", &params) {
        return rest_failure(failure);
    }
    let servers: String = state
        .server_list
        .lock()
        .unwrap()
        .iter()
        .map(|s| format!("<server>{}</server>", s))
        .collect();
    rest_ok_body(&format!("<list>{}</list>", servers))
}

async fn rest_verify_key(
    State(state): State<Arc<FakeState>>,
    Path(public_key): Path<String>,
    Query(mut params): Query<Params>,
) -> Response {
    params.insert("public_key".to_string(), public_key.clone());
    if let Err(failure) = check(&state, "verifyKey", &params) {
        return rest_failure(failure);
    }
    rest_ok_body(&format!(
        "<site><publicKey>{}</publicKey><status>1</status></site>",
        public_key
    ))
}

async fn rest_content(State(state): State<Arc<FakeState>>, Form(params): Form<Params>) -> Response {
    if let Err(failure) = check(&state, "checkContent", &params) {
        return rest_failure(failure);
    }
    let (_, classification) = classify_body(params.get("post_body").map(String::as_str).unwrap_or(""));
    rest_ok_body(&format!(
        "<content><id>rest-session</id><spamClassification>{}</spamClassification>\
         <spamScore>0.9</spamScore><languages><language><languageCode>en</languageCode>\
         <languageScore>1.0</languageScore></language></languages></content>",
        classification
    ))
}

async fn rest_captcha(State(state): State<Arc<FakeState>>, Form(params): Form<Params>) -> Response {
    if let Err(failure) = check(&state, "getImageCaptcha", &params) {
        return rest_failure(failure);
    }
    let body = serde_json::json!({
        "code": 200,
        "captcha": { "id": "captcha-session", "url": format!("{}/captcha.png", state.url) }
    });
    ([(header::CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

async fn rest_check_captcha(
    State(state): State<Arc<FakeState>>,
    Path(session_id): Path<String>,
    Form(mut params): Form<Params>,
) -> Response {
    params.insert("session_id".to_string(), session_id);
    if let Err(failure) = check(&state, "checkCaptcha", &params) {
        return rest_failure(failure);
    }
    let solved = params.get("solution").map(String::as_str) == Some(CAPTCHA_SOLUTION);
    rest_ok_body(&format!(
        "<captcha><solved>{}</solved></captcha>",
        if solved { 1 } else { 0 }
    ))
}

async fn rest_ok(State(state): State<Arc<FakeState>>, Form(params): Form<Params>) -> Response {
    if let Err(failure) = check(&state, "sendFeedback", &params) {
        return rest_failure(failure);
    }
    rest_ok_body("")
}

async fn rest_reputation(State(state): State<Arc<FakeState>>, Query(params): Query<Params>) -> Response {
    if let Err(failure) = check(&state, "getReputation", &params) {
        return rest_failure(failure);
    }
    rest_ok_body(
        "<user><reputation>average</reputation><score>0.5</score><confidence>0.25</confidence></user>",
    )
}

async fn rest_list_blacklist(
    State(state): State<Arc<FakeState>>,
    Path(public_key): Path<String>,
    Query(mut params): Query<Params>,
) -> Response {
    params.insert("public_key".to_string(), public_key);
    if let Err(failure) = check(&state, "listBlacklistText", &params) {
        return rest_failure(failure);
    }
    let entries: String = state
        .blacklist
        .lock()
        .unwrap()
        .iter()
        .map(|(id, text)| {
            format!(
                "<entry><id>{}</id><value>{}</value><reason>low-quality</reason><context>allFields</context></entry>",
                id, text
            )
        })
        .collect();
    rest_ok_body(&format!("<list>{}</list>", entries))
}

async fn rest_add_blacklist(
    State(state): State<Arc<FakeState>>,
    Path(public_key): Path<String>,
    Form(mut params): Form<Params>,
) -> Response {
    params.insert("public_key".to_string(), public_key);
    if let Err(failure) = check(&state, "addBlacklistText", &params) {
        return rest_failure(failure);
    }
    let text = params.get("text").cloned().unwrap_or_default();
    let id = add_blacklist(&state, &text);
    rest_ok_body(&format!("<entry><id>{}</id><value>{}</value></entry>", id, text))
}

async fn rest_remove_blacklist(
    State(state): State<Arc<FakeState>>,
    Path((public_key, id)): Path<(String, String)>,
    Query(mut params): Query<Params>,
) -> Response {
    params.insert("public_key".to_string(), public_key);
    if let Err(failure) = check(&state, "removeBlacklistText", &params) {
        return rest_failure(failure);
    }
    if remove_blacklist(&state, &id) {
        rest_ok_body("")
    } else {
        (StatusCode::NOT_FOUND, "no such entry").into_response()
    }
}
