// Integration test for the WebSocket push channel

use futures::SinkExt;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use trainwatch::backend::{BackendEvent, PushChannel};

#[tokio::test]
async fn test_push_channel_delivers_subscribed_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        ws.send(Message::Text(
            r#"{"event":"training_state","data":{"status":"training","is_training":true}}"#
                .to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"event":"log","data":{"message":"first epoch"}}"#.to_string(),
        ))
        .await
        .unwrap();
        // An unknown event must be skipped, not break the stream
        ws.send(Message::Text(
            r#"{"event":"telemetry","data":{}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"event":"backup","data":{"path":"/backups/run-1"}}"#.to_string(),
        ))
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = ws.close(None).await;
    });

    let mut push = PushChannel::new(format!("ws://{}/api/events", addr));
    let (tx, mut rx) = mpsc::unbounded_channel();
    push.subscribe_all(&tx);
    push.connect().await.unwrap();

    let first = recv(&mut rx).await;
    assert!(matches!(first, BackendEvent::TrainingState(_)));

    let second = recv(&mut rx).await;
    match second {
        BackendEvent::Log(payload) => assert_eq!(payload.message, "first epoch"),
        other => panic!("unexpected event: {:?}", other),
    }

    // The telemetry frame was dropped; backup arrives next
    let third = recv(&mut rx).await;
    match third {
        BackendEvent::Backup(payload) => {
            assert_eq!(payload.path.as_deref(), Some("/backups/run-1"))
        }
        other => panic!("unexpected event: {:?}", other),
    }

    push.disconnect().await;
    server.await.unwrap();
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<BackendEvent>) -> BackendEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event before timeout")
        .expect("channel open")
}
