//! Scripted in-process transport for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ccs_protocol::{WireRequest, WireResponse};
use ccs_types::HttpMethod;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::transport::HttpTransport;

#[derive(Clone, Debug)]
enum Reply {
    Response(WireResponse),
    Fault { transient: bool },
}

#[derive(Debug)]
struct Route {
    method: HttpMethod,
    url: String,
    replies: VecDeque<Reply>,
}

/// A transport that answers from scripted replies and records every request.
///
/// Replies queued for the same method and URL are served in order; the last
/// one keeps being served once the queue is down to it. Unrouted requests
/// get a 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<WireRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: HttpMethod, url: &str, response: WireResponse) -> &Self {
        self.push(method, url, Reply::Response(response));
        self
    }

    pub fn respond_json(&self, method: HttpMethod, url: &str, body: Value) -> &Self {
        self.respond(method, url, WireResponse::json(&body))
    }

    pub fn respond_status(&self, method: HttpMethod, url: &str, status: u16) -> &Self {
        self.respond(method, url, WireResponse::new(status))
    }

    /// Fail the next request to `url` below HTTP.
    pub fn fault(&self, method: HttpMethod, url: &str, transient: bool) -> &Self {
        self.push(method, url, Reply::Fault { transient });
        self
    }

    fn push(&self, method: HttpMethod, url: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.iter_mut().find(|r| r.method == method && r.url == url) {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                url: url.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn requests_to(&self, method: HttpMethod, url: &str) -> Vec<WireRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    pub fn count(&self, method: HttpMethod, url: &str) -> usize {
        self.requests_to(method, url).len()
    }

    /// Requests whose method is not GET.
    pub fn writes(&self) -> Vec<WireRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != HttpMethod::Get)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn next_reply(&self, method: HttpMethod, url: &str) -> Option<Reply> {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let route = routes.iter_mut().find(|r| r.method == method && r.url == url)?;
        if route.replies.len() > 1 {
            route.replies.pop_front()
        } else {
            route.replies.front().cloned()
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        match self.next_reply(request.method, &request.url) {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Fault { transient }) => Err(ClientError::Transport {
                message: format!("scripted fault for {}", request.url),
                transient,
            }),
            None => Ok(WireResponse::new(404).with_body(b"no route".to_vec())),
        }
    }
}
