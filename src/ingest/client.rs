// Ingest Client - certstream WebSocket reader with reconnect backoff
//
// State machine: CONNECTING -> OPEN -> RECONNECT_WAIT -> CONNECTING, with
// STOPPED reachable from any state via the shutdown signal. The upstream
// offers no delivery guarantee, so nothing is acked or replayed; duplicates
// are the deduplicator's problem.

use crate::ingest::message::parse_domains;
use crate::pipeline::queue::IngestQueue;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Reconnect delays in seconds, clamped at the last entry
const BACKOFF: [u64; 5] = [1, 2, 5, 10, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Open,
    ReconnectWait,
    Stopped,
}

pub struct IngestClient {
    url: String,
    queue: IngestQueue,
    state: ClientState,
}

impl IngestClient {
    pub fn new(url: String, queue: IngestQueue) -> Self {
        Self {
            url,
            queue,
            state: ClientState::Connecting,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Connect-read-reconnect loop; returns when shutdown fires
    ///
    /// Dropping the client also drops the queue sender, which lets the
    /// worker pool drain naturally.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt = 0usize;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.state = ClientState::Connecting;
            debug!("Connecting to certstream at {}", self.url);

            let connect = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connect {
                Ok((stream, _response)) => {
                    info!("Certstream connection established");
                    self.state = ClientState::Open;
                    attempt = 0;

                    if !self.read_frames(stream, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Certstream connection failed: {}", e);
                }
            }

            // Either the socket dropped or the handshake failed
            self.state = ClientState::ReconnectWait;
            let delay = BACKOFF[attempt.min(BACKOFF.len() - 1)];
            attempt += 1;
            debug!("Reconnecting in {}s (attempt {})", delay, attempt);

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.state = ClientState::Stopped;
        info!("Ingest client stopped");
    }

    /// Read frames until the socket drops (true) or shutdown fires (false)
    async fn read_frames(
        &mut self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text).await;
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(e) = write.send(Message::Pong(payload)).await {
                                warn!("Failed to answer ping: {}", e);
                                return true;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Certstream closed the connection");
                            return true;
                        }
                        Some(Ok(_)) => {
                            // Binary and pong frames carry nothing for us
                        }
                        Some(Err(e)) => {
                            warn!("Certstream socket error: {}", e);
                            return true;
                        }
                        None => {
                            info!("Certstream stream ended");
                            return true;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return false;
                    }
                }
            }
        }
    }

    /// Parse one text frame and queue its domains
    ///
    /// A parse error never closes the connection.
    async fn handle_text(&self, text: &str) {
        match parse_domains(text) {
            Ok(domains) => {
                for domain in domains {
                    self.queue.push(domain).await;
                }
            }
            Err(e) => {
                debug!("Skipping unparseable frame: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::queue::OverflowPolicy;
    use crate::stats::StatsTracker;

    #[test]
    fn test_backoff_clamps_at_last_entry() {
        for attempt in 0..10usize {
            let delay = BACKOFF[attempt.min(BACKOFF.len() - 1)];
            if attempt < BACKOFF.len() {
                assert_eq!(delay, BACKOFF[attempt]);
            } else {
                assert_eq!(delay, 30);
            }
        }
    }

    #[tokio::test]
    async fn test_handle_text_queues_domains() {
        let (queue, mut rx) =
            IngestQueue::new(10, OverflowPolicy::DropNewest, StatsTracker::new());
        let client = IngestClient::new("wss://example.invalid/".to_string(), queue);

        client
            .handle_text(r#"{"data": ["a.example.com", "b.example.com"]}"#)
            .await;

        assert_eq!(rx.recv().await.unwrap(), "a.example.com");
        assert_eq!(rx.recv().await.unwrap(), "b.example.com");
    }

    #[tokio::test]
    async fn test_handle_text_ignores_garbage() {
        let (queue, rx) = IngestQueue::new(10, OverflowPolicy::DropNewest, StatsTracker::new());
        let client = IngestClient::new("wss://example.invalid/".to_string(), queue);

        client.handle_text("not json at all").await;
        assert_eq!(rx.depth(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_stops() {
        let (queue, _rx) = IngestQueue::new(10, OverflowPolicy::DropNewest, StatsTracker::new());
        let client = IngestClient::new("wss://example.invalid:1/".to_string(), queue);

        let (tx, rx) = watch::channel(true);
        drop(tx);
        client.run(rx).await;
    }
}
