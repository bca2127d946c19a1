//! Recording stub transport and fixtures shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::modules::config::ConsoleConfig;
use crate::modules::http::{HttpClient, HttpRequest, HttpResponse, Method, Transport, TransportError};
use crate::modules::i18n::TranslationBridge;
use crate::modules::location::MemoryLocation;
use crate::modules::notify::NotificationCenter;

type Reply = Result<HttpResponse, TransportError>;

#[derive(Default)]
pub struct StubTransport {
    queued: RefCell<HashMap<String, VecDeque<(Option<Duration>, Reply)>>>,
    fallback: RefCell<HashMap<String, Reply>>,
    requests: RefCell<Vec<HttpRequest>>,
}

fn key(method: Method, route: &str) -> String {
    format!("{method} {route}")
}

impl StubTransport {
    pub fn push(&self, method: Method, route: &str, reply: Reply) {
        self.queued
            .borrow_mut()
            .entry(key(method, route))
            .or_default()
            .push_back((None, reply));
    }

    pub fn push_json(&self, method: Method, route: &str, status: u16, body: Value) {
        self.push(method, route, Ok(HttpResponse::new(status, body.to_string())));
    }

    /// Reply only after `delay` has elapsed on the (paused) clock.
    pub fn push_delayed(&self, method: Method, route: &str, delay: Duration, body: Value) {
        self.queued
            .borrow_mut()
            .entry(key(method, route))
            .or_default()
            .push_back((Some(delay), Ok(HttpResponse::new(200, body.to_string()))));
    }

    /// Reply used whenever nothing is queued for the route.
    pub fn always_json(&self, method: Method, route: &str, status: u16, body: Value) {
        self.fallback.borrow_mut().insert(
            key(method, route),
            Ok(HttpResponse::new(status, body.to_string())),
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, method: Method, route: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.route() == route)
            .count()
    }

    pub fn last(&self, method: Method, route: &str) -> Option<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|r| r.method == method && r.route() == route)
            .cloned()
    }
}

#[async_trait(?Send)]
impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route_key = key(request.method, request.route());
        self.requests.borrow_mut().push(request);

        let queued = self
            .queued
            .borrow_mut()
            .get_mut(&route_key)
            .and_then(|queue| queue.pop_front());
        match queued {
            Some((delay, reply)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                reply
            }
            None => self
                .fallback
                .borrow()
                .get(&route_key)
                .cloned()
                .unwrap_or_else(|| Err(TransportError::new(format!("no stub for {route_key}")))),
        }
    }
}

pub fn test_config() -> ConsoleConfig {
    ConsoleConfig::default()
}

pub fn test_client(transport: Rc<StubTransport>) -> (HttpClient, Rc<MemoryLocation>) {
    let location = Rc::new(MemoryLocation::new("/admin/", ""));
    let client = HttpClient::new(transport, location.clone(), &test_config());
    (client, location)
}

pub fn test_notices() -> NotificationCenter {
    NotificationCenter::new(&test_config().timings)
}

pub fn test_i18n() -> Rc<TranslationBridge> {
    Rc::new(TranslationBridge::english())
}
