// Push channel client
//
// Maintains the WebSocket connection to the backend's event stream and
// fans decoded events out to per-event-name subscribers. Reconnects with
// a fixed delay until disconnected; the server announces each (re)connect
// with its own `connected` event, so none is synthesized here.

use anyhow::{Context, Result};
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::events::{BackendEvent, EVENT_NAMES};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

type Subscribers = DashMap<String, mpsc::UnboundedSender<BackendEvent>>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for the backend event stream with per-event-name
/// subscribe/unsubscribe.
pub struct PushChannel {
    url: String,
    subscribers: Arc<Subscribers>,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl PushChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscribers: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
            reader: None,
        }
    }

    /// Route events named `event` to `tx`. A later subscribe for the same
    /// name replaces the previous sender.
    pub fn subscribe(&self, event: &str, tx: mpsc::UnboundedSender<BackendEvent>) {
        self.subscribers.insert(event.to_string(), tx);
    }

    /// Route every known event name to `tx`.
    pub fn subscribe_all(&self, tx: &mpsc::UnboundedSender<BackendEvent>) {
        for name in EVENT_NAMES {
            self.subscribe(name, tx.clone());
        }
    }

    pub fn unsubscribe(&self, event: &str) {
        self.subscribers.remove(event);
    }

    pub fn unsubscribe_all(&self) {
        self.subscribers.clear();
    }

    /// Establish the connection and start the reader task. Fails fast if
    /// the initial connect fails; later drops are retried in background.
    pub async fn connect(&mut self) -> Result<()> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to push channel at {}", self.url))?;
        info!(url = %self.url, "Push channel connected");

        let url = self.url.clone();
        let subscribers = self.subscribers.clone();
        let cancel = self.cancel.clone();

        self.reader = Some(tokio::spawn(async move {
            read_until_closed(stream, &subscribers, &cancel).await;

            while !cancel.is_cancelled() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
                match connect_async(url.as_str()).await {
                    Ok((stream, _)) => {
                        info!(url = %url, "Push channel reconnected");
                        read_until_closed(stream, &subscribers, &cancel).await;
                    }
                    Err(e) => warn!(error = %e, "Push channel reconnect failed"),
                }
            }
        }));

        Ok(())
    }

    /// Tear down the connection and reader task. Idempotent.
    pub async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        info!("Push channel disconnected");
    }
}

async fn read_until_closed(mut stream: WsStream, subscribers: &Subscribers, cancel: &CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = stream.close(None).await;
                return;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => dispatch(subscribers, &text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Push channel closed by backend");
                        return;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel read error");
                        return;
                    }
                }
            }
        }
    }
}

fn dispatch(subscribers: &Subscribers, frame: &str) {
    let Some(event) = BackendEvent::parse(frame) else {
        return;
    };
    let name = event.name();

    let send_failed = match subscribers.get(name) {
        Some(tx) => tx.send(event).is_err(),
        None => {
            debug!(event = %name, "No subscriber for push event");
            false
        }
    };
    if send_failed {
        subscribers.remove(name);
        debug!(event = %name, "Removed closed subscriber");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_replaces_and_unsubscribes() {
        let channel = PushChannel::new("ws://127.0.0.1:1/api/events");
        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.subscribe_all(&tx);

        dispatch(
            &channel.subscribers,
            r#"{"event":"log","data":{"message":"hello"}}"#,
        );
        assert!(matches!(rx.try_recv(), Ok(BackendEvent::Log(_))));

        channel.unsubscribe("log");
        dispatch(
            &channel.subscribers,
            r#"{"event":"log","data":{"message":"dropped"}}"#,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_removes_closed_subscriber() {
        let channel = PushChannel::new("ws://127.0.0.1:1/api/events");
        let (tx, rx) = mpsc::unbounded_channel();
        channel.subscribe("progress", tx);
        drop(rx);

        dispatch(
            &channel.subscribers,
            r#"{"event":"progress","data":{"current_step":1}}"#,
        );
        assert!(channel.subscribers.get("progress").is_none());
    }
}
