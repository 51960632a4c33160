//! Scripted remote API
//!
//! Replies are queued per `METHOD path`; anything unscripted gets the
//! default status. Every request is recorded.

use async_trait::async_trait;
use route_sync::client::offline::HttpMethod;
use route_sync::client::remote::{RemoteApi, RemoteError, RemoteRequest, RemoteResponse};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Reply = Result<RemoteResponse, RemoteError>;

#[derive(Debug)]
pub struct MockRemote {
    scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
    default_status: AtomicU16,
    sent: Mutex<Vec<RemoteRequest>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn line(method: HttpMethod, path: &str) -> String {
    format!("{} {}", method, path)
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::default(),
            default_status: AtomicU16::new(200),
            sent: Mutex::default(),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Queue one reply for `method path`
    pub fn reply(&self, method: HttpMethod, path: &str, status: u16, body: Option<Value>) {
        self.push(method, path, Ok(RemoteResponse::new(status, body)));
    }

    /// Queue the same status `times` times
    pub fn reply_times(&self, method: HttpMethod, path: &str, status: u16, times: usize) {
        for _ in 0..times {
            self.reply(method, path, status, None);
        }
    }

    /// Queue a transport failure
    pub fn fail(&self, method: HttpMethod, path: &str, error: RemoteError) {
        self.push(method, path, Err(error));
    }

    fn push(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.scripted
            .lock()
            .unwrap()
            .entry(line(method, path))
            .or_default()
            .push_back(reply);
    }

    pub fn set_default_status(&self, status: u16) {
        self.default_status.store(status, Ordering::SeqCst);
    }

    /// Delay every reply by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// `METHOD path` of every request, in send order
    pub fn sent_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| line(request.method, &request.path))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.sent.lock().unwrap().push(request.clone());

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&line(request.method, &request.path))
            .and_then(VecDeque::pop_front);
        let reply = scripted.unwrap_or_else(|| {
            Ok(RemoteResponse::new(
                self.default_status.load(Ordering::SeqCst),
                None,
            ))
        });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
