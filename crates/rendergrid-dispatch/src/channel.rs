//! Message channels a batch can be delivered over.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use http_body_util::Full;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A one-way message sink.
///
/// `send` returns once the message has been handed over; it never waits for
/// a consumer to act on it.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, payload: Bytes) -> DispatchResult<()>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

// ── In-process queue ──────────────────────────────────────────────

/// A bounded in-process queue backed by a tokio mpsc channel.
#[derive(Debug, Clone)]
pub struct QueueChannel {
    tx: mpsc::Sender<Bytes>,
}

impl QueueChannel {
    /// Create a queue holding up to `capacity` undelivered messages, plus
    /// the receiving end.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageChannel for QueueChannel {
    async fn send(&self, payload: Bytes) -> DispatchResult<()> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                DispatchError::Rejected("queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                DispatchError::Unreachable("queue receiver dropped".to_string())
            }
        })
    }

    fn describe(&self) -> String {
        "in-process queue".to_string()
    }
}

// ── HTTP relay ────────────────────────────────────────────────────

/// POSTs each message as JSON to a relay endpoint over HTTP/1.1.
///
/// Any 2xx status counts as delivered.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    uri: Uri,
    /// `host:port` to connect to.
    address: String,
    timeout: Duration,
}

impl HttpChannel {
    /// Build a channel for an `http://host[:port]/path` endpoint.
    pub fn new(endpoint: &str) -> DispatchResult<Self> {
        let uri: Uri = endpoint
            .parse()
            .map_err(|e| DispatchError::Endpoint(format!("{endpoint}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(DispatchError::Endpoint(format!(
                "{endpoint}: only http:// endpoints are supported"
            )));
        }
        let host = uri
            .host()
            .ok_or_else(|| DispatchError::Endpoint(format!("{endpoint}: missing host")))?;
        let address = format!("{host}:{}", uri.port_u16().unwrap_or(80));

        Ok(Self {
            uri,
            address,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Bound the connect-and-send time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, payload: Bytes) -> DispatchResult<StatusCode> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| DispatchError::Unreachable(format!("{}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| DispatchError::Unreachable(format!("handshake failed: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method(Method::POST)
            .uri(self.uri.path_and_query().map_or("/", |p| p.as_str()))
            .header(http::header::HOST, self.address.as_str())
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "rendergrid-dispatch/0.1")
            .body(Full::new(payload))
            .map_err(|e| DispatchError::Endpoint(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| DispatchError::Unreachable(format!("request failed: {e}")))?;
        Ok(resp.status())
    }
}

#[async_trait]
impl MessageChannel for HttpChannel {
    async fn send(&self, payload: Bytes) -> DispatchResult<()> {
        let status = tokio::time::timeout(self.timeout, self.post(payload))
            .await
            .map_err(|_| {
                DispatchError::Unreachable(format!("{} timed out after {:?}", self.uri, self.timeout))
            })??;

        if status.is_success() {
            debug!(uri = %self.uri, %status, "relay accepted message");
            Ok(())
        } else {
            Err(DispatchError::Rejected(format!("{} answered {status}", self.uri)))
        }
    }

    fn describe(&self) -> String {
        format!("http relay {}", self.uri)
    }
}
