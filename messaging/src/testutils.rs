//! In-process stand-in for the messaging platform.
//!
//! Binds an ephemeral port, records every request it receives (method, path,
//! decoded form/query parameters) and answers with canned platform JSON.
//! Tests use the recordings to assert that a handler issued exactly the
//! expected platform calls, or none at all.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ReceivedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One outbound message the mock accepted, in platform field order.
#[derive(Clone, Debug, PartialEq)]
pub struct SentMessage {
    pub from: String,
    pub to: String,
    pub body: String,
}

struct MockConversation {
    sid: String,
    participants: Vec<serde_json::Value>,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<ReceivedRequest>>,
    failures: Mutex<VecDeque<(u16, String)>>,
    indexed_failures: Mutex<HashMap<usize, (u16, String)>>,
    sessions: Mutex<Vec<String>>,
    conversations: Mutex<Vec<MockConversation>>,
    counter: AtomicUsize,
}

impl MockState {
    fn next_sid(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}{n:028}")
    }
}

pub struct MockPlatform {
    port: u16,
    state: Arc<MockState>,
}

impl MockPlatform {
    /// Binds an ephemeral port and starts serving until dropped.
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock platform");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(MockState::default());

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let io = TokioIo::new(stream);
                let conn_state = accept_state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(req, conn_state.clone()));
                    if let Err(err) =
                        hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                            .serve_connection(io, service)
                            .await
                    {
                        tracing::debug!(error = %err, "mock platform connection error");
                    }
                });
            }
        });

        MockPlatform { port, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Queue a failure for the next request, with the given status and
    /// platform error message.
    pub fn fail_next(&self, status: u16, message: &str) {
        self.state
            .failures
            .lock()
            .unwrap()
            .push_back((status, message.to_string()));
    }

    /// Fail the request with the given zero-based arrival index. Useful when
    /// the failing call is preceded by calls that must succeed.
    pub fn fail_nth(&self, index: usize, status: u16, message: &str) {
        self.state
            .indexed_failures
            .lock()
            .unwrap()
            .insert(index, (status, message.to_string()));
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    /// The outbound message sends accepted so far, in arrival order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.requests()
            .iter()
            .filter(|request| request.method == "POST" && request.path.ends_with("/Messages.json"))
            .map(|request| SentMessage {
                from: request.param("From").unwrap_or_default().to_string(),
                to: request.param("To").unwrap_or_default().to_string(),
                body: request.param("Body").unwrap_or_default().to_string(),
            })
            .collect()
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<MockState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut params: Vec<(String, String)> = req
        .uri()
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    let body_bytes = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_else(|_| Bytes::new());
    params.extend(
        url::form_urlencoded::parse(&body_bytes).map(|(k, v)| (k.into_owned(), v.into_owned())),
    );

    let request_index = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(ReceivedRequest {
            method: method.to_string(),
            path: path.clone(),
            params: params.clone(),
        });
        requests.len() - 1
    };

    let injected = state
        .indexed_failures
        .lock()
        .unwrap()
        .remove(&request_index)
        .or_else(|| state.failures.lock().unwrap().pop_front());
    if let Some((status, message)) = injected {
        return Ok(json_response(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            json!({ "message": message }),
        ));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    let response = match (method, segments.as_slice()) {
        (Method::POST, ["2010-04-01", "Accounts", _, "Messages.json"]) => json_response(
            StatusCode::CREATED,
            json!({ "sid": state.next_sid("SM") }),
        ),

        (Method::POST, ["v1", "Services", _, "Sessions"]) => {
            let sid = state.next_sid("KC");
            state.sessions.lock().unwrap().push(sid.clone());
            json_response(StatusCode::CREATED, json!({ "sid": sid }))
        }

        (Method::POST, ["v1", "Services", _, "Sessions", session, "Participants"]) => {
            if !state.sessions.lock().unwrap().iter().any(|s| s == session) {
                not_found()
            } else {
                let n = state.counter.fetch_add(1, Ordering::Relaxed);
                json_response(
                    StatusCode::CREATED,
                    json!({
                        "sid": format!("KP{n:028}"),
                        "identifier": param("Identifier").unwrap_or_default(),
                        "proxy_identifier": format!("+1999{n:07}"),
                        "friendly_name": param("FriendlyName"),
                    }),
                )
            }
        }

        (Method::DELETE, ["v1", "Services", _, "Sessions", session]) => {
            let mut sessions = state.sessions.lock().unwrap();
            match sessions.iter().position(|s| s == session) {
                Some(index) => {
                    sessions.remove(index);
                    empty_response(StatusCode::NO_CONTENT)
                }
                None => not_found(),
            }
        }

        (Method::POST, ["v1", "Services", _, "Conversations"]) => {
            let sid = state.next_sid("CH");
            state.conversations.lock().unwrap().push(MockConversation {
                sid: sid.clone(),
                participants: Vec::new(),
            });
            json_response(StatusCode::CREATED, json!({ "sid": sid }))
        }

        (Method::GET, ["v1", "Services", _, "Conversations"]) => {
            let conversations = state.conversations.lock().unwrap();
            let listed: Vec<serde_json::Value> = conversations
                .iter()
                .map(|c| json!({ "sid": c.sid }))
                .collect();
            json_response(StatusCode::OK, json!({ "conversations": listed }))
        }

        (Method::DELETE, ["v1", "Services", _, "Conversations", conversation]) => {
            let mut conversations = state.conversations.lock().unwrap();
            match conversations.iter().position(|c| c.sid == *conversation) {
                Some(index) => {
                    conversations.remove(index);
                    empty_response(StatusCode::NO_CONTENT)
                }
                None => not_found(),
            }
        }

        (Method::POST, ["v1", "Services", _, "Conversations", conversation, "Participants"]) => {
            let mut conversations = state.conversations.lock().unwrap();
            match conversations.iter_mut().find(|c| c.sid == *conversation) {
                Some(entry) => {
                    let n = state.counter.fetch_add(1, Ordering::Relaxed);
                    let participant = json!({
                        "sid": format!("MB{n:028}"),
                        "identity": param("Identity"),
                        "messaging_binding": {
                            "address": param("MessagingBinding.Address").unwrap_or_default(),
                            "proxy_address": param("MessagingBinding.ProxyAddress"),
                        },
                    });
                    entry.participants.push(participant.clone());
                    json_response(StatusCode::CREATED, participant)
                }
                None => not_found(),
            }
        }

        (Method::GET, ["v1", "Services", _, "Conversations", conversation, "Participants"]) => {
            let conversations = state.conversations.lock().unwrap();
            match conversations.iter().find(|c| c.sid == *conversation) {
                Some(entry) => json_response(
                    StatusCode::OK,
                    json!({ "participants": entry.participants }),
                ),
                None => not_found(),
            }
        }

        (Method::POST, ["v1", "Services", _, "Conversations", conversation, "Messages"]) => {
            let exists = state
                .conversations
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.sid == *conversation);
            if exists {
                json_response(StatusCode::CREATED, json!({ "sid": state.next_sid("IM") }))
            } else {
                not_found()
            }
        }

        _ => not_found(),
    };

    Ok(response)
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(value.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert("content-type", "application/json".parse().unwrap());
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn not_found() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        json!({ "message": "The requested resource was not found" }),
    )
}
