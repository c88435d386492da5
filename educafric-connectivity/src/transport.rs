//! HTTP transport seam
//!
//! - [`HttpTransport`] : minimal request/response abstraction the probes and
//!   the recovery sync are written against
//! - [`ReqwestTransport`] : production implementation over `reqwest`
//! - [`MonitoredClient`] : wrapper that application code uses for its own
//!   requests; every outcome is reported to registered [`NetworkObserver`]s,
//!   which is how the heartbeat learns about network errors and recoveries

use crate::error::TransportError;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, TransportError> {
        let body = serde_json::to_value(body).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            body: Some(body),
            ..Self::new(Method::Post, path)
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

pub type SharedTransport = Arc<dyn HttpTransport>;

/// `reqwest` client bound to the API base URL
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let url = self.url(&request.path);
            let mut builder = match request.method {
                Method::Head => self.client.head(&url),
                Method::Get => self.client.get(&url),
                Method::Post => self.client.post(&url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            Ok(HttpResponse { status, body })
        }
        .boxed()
    }
}

/// Receives the outcome of every request sent through a [`MonitoredClient`]
pub trait NetworkObserver: Send + Sync {
    /// A response came back (any status)
    fn on_response(&self, response: &HttpResponse);

    /// The request never produced a response
    fn on_network_error(&self, error: &TransportError);
}

/// Explicit wrapped client for application requests
pub struct MonitoredClient {
    inner: SharedTransport,
    observers: RwLock<Vec<Weak<dyn NetworkObserver>>>,
}

impl MonitoredClient {
    pub fn new(inner: SharedTransport) -> Self {
        Self {
            inner,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Observers are held weakly; a dropped observer is pruned on the next request
    pub fn add_observer(&self, observer: Weak<dyn NetworkObserver>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().iter().filter(|o| o.strong_count() > 0).count()
    }

    fn live_observers(&self) -> Vec<Arc<dyn NetworkObserver>> {
        let mut observers = self.observers.write();
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl HttpTransport for MonitoredClient {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        async move {
            let path = request.path.clone();
            let outcome = self.inner.execute(request).await;
            let observers = self.live_observers();
            match &outcome {
                Ok(response) => {
                    for observer in &observers {
                        observer.on_response(response);
                    }
                }
                Err(error) => {
                    debug!("request to {} failed: {}", path, error);
                    for observer in &observers {
                        observer.on_network_error(error);
                    }
                }
            }
            outcome
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedTransport(Result<HttpResponse, TransportError>);

    impl HttpTransport for FixedTransport {
        fn execute(&self, _request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            let outcome = self.0.clone();
            async move { outcome }.boxed()
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl NetworkObserver for Recorder {
        fn on_response(&self, response: &HttpResponse) {
            self.events.lock().push(format!("response {}", response.status));
        }

        fn on_network_error(&self, error: &TransportError) {
            self.events.lock().push(format!("error {error}"));
        }
    }

    #[test]
    fn test_request_builders() {
        let req = HttpRequest::head("/api/health").header("X-Health-Check", "true");
        assert_eq!(req.method, Method::Head);
        assert_eq!(req.header_value("x-health-check"), Some("true"));

        let post = HttpRequest::post_json("/api/sync/offline-actions", &serde_json::json!({"actions": []})).unwrap();
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.body.unwrap()["actions"], serde_json::json!([]));
    }

    #[test]
    fn test_reqwest_url_join() {
        let transport = ReqwestTransport::new("http://localhost:5000/");
        assert_eq!(transport.url("/api/health"), "http://localhost:5000/api/health");
    }

    #[tokio::test]
    async fn test_monitored_client_reports_outcomes() {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn NetworkObserver> = Arc::downgrade(&(recorder.clone() as Arc<dyn NetworkObserver>));

        let ok = MonitoredClient::new(Arc::new(FixedTransport(Ok(HttpResponse {
            status: 204,
            body: String::new(),
        }))));
        ok.add_observer(weak.clone());
        ok.execute(HttpRequest::get("/api/classes")).await.unwrap();

        let failing = MonitoredClient::new(Arc::new(FixedTransport(Err(TransportError::Network(
            "connection refused".into(),
        )))));
        failing.add_observer(weak);
        assert!(failing.execute(HttpRequest::get("/api/classes")).await.is_err());

        assert_eq!(
            *recorder.events.lock(),
            vec!["response 204".to_string(), "error connection refused".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dropped_observers_are_pruned() {
        let client = MonitoredClient::new(Arc::new(FixedTransport(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }))));
        {
            let recorder: Arc<dyn NetworkObserver> = Arc::new(Recorder::default());
            client.add_observer(Arc::downgrade(&recorder));
            assert_eq!(client.observer_count(), 1);
        }
        client.execute(HttpRequest::get("/")).await.unwrap();
        assert_eq!(client.observer_count(), 0);
    }
}
