/*!
Scripted HTTP transport

Replies are looked up per path: one-shot replies queued with `enqueue` first,
then the standing reply set with `reply`, then the global fallback (200).
Every request is recorded for assertions.
*/

use educafric_connectivity::transport::Method;
use educafric_connectivity::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16),
    Json(u16, Value),
    /// Transport-level failure (no response)
    Fail(String),
    /// Responds after the given delay
    Delayed(Duration, u16),
    /// Never responds
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<MockReply>>>,
    standing: Mutex<HashMap<String, MockReply>>,
    fallback: Mutex<MockReply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            standing: Mutex::new(HashMap::new()),
            fallback: Mutex::new(MockReply::Status(200)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply used for every request to `path` until changed
    pub fn reply(&self, path: &str, reply: MockReply) -> &Self {
        self.standing.lock().insert(path.to_string(), reply);
        self
    }

    /// Reply used once, before the standing reply
    pub fn enqueue(&self, path: &str, reply: MockReply) -> &Self {
        self.queued
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply for paths with nothing scripted
    pub fn set_fallback(&self, reply: MockReply) {
        *self.fallback.lock() = reply;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
    }

    fn next_reply(&self, path: &str) -> MockReply {
        if let Some(reply) = self.queued.lock().get_mut(path).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(reply) = self.standing.lock().get(path) {
            return reply.clone();
        }
        self.fallback.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        let reply = self.next_reply(&request.path);
        log::debug!("[MOCK] {:?} {} -> {:?}", request.method, request.path, reply);
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            path: request.path,
            headers: request.headers,
            body: request.body,
        });

        async move {
            // one scheduling point so concurrent callers can pile up
            tokio::task::yield_now().await;
            match reply {
                MockReply::Status(status) => Ok(HttpResponse {
                    status,
                    body: String::new(),
                }),
                MockReply::Json(status, body) => Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
                MockReply::Fail(message) => Err(TransportError::Network(message)),
                MockReply::Delayed(delay, status) => {
                    tokio::time::sleep(delay).await;
                    Ok(HttpResponse {
                        status,
                        body: String::new(),
                    })
                }
                MockReply::Hang => futures::future::pending().await,
            }
        }
        .boxed()
    }
}
