//! In-memory transport for unit tests

use crate::fetcher::{Document, Transport, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Responder = dyn Fn(&str, u32) -> Result<(u16, String), TransportError> + Send + Sync;

/// Answers every URL through a closure and counts requests
///
/// The closure receives the URL and the 1-based attempt number for that URL.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    calls: Mutex<HashMap<String, u32>>,
    total: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&str, u32) -> Result<String, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_status(move |url, attempt| responder(url, attempt).map(|body| (200, body)))
    }

    /// Like `new`, but the closure also picks the HTTP status of each page
    pub fn with_status(
        responder: impl Fn(&str, u32) -> Result<(u16, String), TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    pub fn total_requests(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<Document, TransportError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        (self.responder)(url, attempt).map(|(status, body)| Document {
            status,
            ..Document::new(url, body)
        })
    }
}
