mod common;

use std::time::Duration;

use common::*;
use futures::{SinkExt, StreamExt};
use mvi_devtools::client::{ConnectionStatus, DebugSession};
use mvi_devtools::config::SessionConfig;
use mvi_devtools::protocol::{decode_command, encode_event, CommandKind, DebugCommand, DebugEvent, EventKind};
use mvi_devtools::store::StoreLimits;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_session_events_reach_store_in_order() {
    let server = start_server(StoreLimits::default()).await;
    let session = DebugSession::connect(session_config(server.addr, "shop"));

    session.send(DebugEvent::action("CartViewModel", "AddItem(id=1)"));
    session.send(DebugEvent::state_change(
        "CartViewModel",
        "CartState(items=1)",
        Some("CartState(items=0)".to_string()),
    ));
    session.send(DebugEvent::effect("CartViewModel", "ShowToast"));

    let store = server.handle.store().clone();
    assert!(wait_until(WAIT, || store.len() == 3).await);

    let kinds: Vec<EventKind> = store.snapshot_logs().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Action, EventKind::StateChange, EventKind::Effect]
    );
    assert_eq!(
        store.snapshot_latest_states().get("CartViewModel").map(String::as_str),
        Some("CartState(items=1)")
    );
    assert_eq!(store.snapshot_history()[0].index, 1);
    assert!(store.snapshot_suggestions()["CartViewModel"].contains_key("AddItem"));
    assert_eq!(server.handle.connected_apps(), vec!["shop".to_string()]);

    session.disconnect();
    session.closed().await;
    server.handle.stop().await;
}

#[tokio::test]
async fn test_command_broadcast_reaches_session_callback() {
    let server = start_server(StoreLimits::default()).await;
    let session = DebugSession::connect(session_config(server.addr, "shop"));
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.on_command(move |command| {
        let _ = tx.send(command);
    });

    session.send(DebugEvent::state_change("CartViewModel", "CartState(items=1)", None));
    let handle = server.handle.clone();
    assert!(wait_until(WAIT, || handle.client_count() == 1 && handle.store().len() == 1).await);

    let sent = server
        .handle
        .send_command(&DebugCommand::set_state("CartViewModel", 1));
    assert_eq!(sent, 1);

    let command = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("command delivered")
        .expect("channel open");
    assert_eq!(command.kind, CommandKind::SetState);
    assert_eq!(command.target, "CartViewModel");
    assert_eq!(command.history_index(), Some(1));
    assert_eq!(command.state.as_deref(), Some("CartState(items=1)"));

    session.disconnect();
    session.closed().await;
    server.handle.stop().await;
}

#[tokio::test]
async fn test_set_state_for_unknown_index_is_not_sent() {
    let server = start_server(StoreLimits::default()).await;
    let url = format!("ws://{}/ws/raw", server.addr);
    let (_ws, _) = connect_async(url.as_str()).await.expect("connect");

    let handle = server.handle.clone();
    assert!(wait_until(WAIT, || handle.client_count() == 1).await);
    assert_eq!(
        server
            .handle
            .send_command(&DebugCommand::set_state("CartViewModel", 1)),
        0
    );

    server.handle.stop().await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let server = start_server(StoreLimits::default()).await;
    let url = format!("ws://{}/ws/raw", server.addr);
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    ws.send(Message::Text("not json".into())).await.expect("send");
    ws.send(Message::Text(r#"{"type":"ACTION"}"#.into()))
        .await
        .expect("send");
    let valid = encode_event(&DebugEvent::effect("Feed", "Refresh")).expect("encode");
    ws.send(Message::Text(valid.into())).await.expect("send");

    let store = server.handle.store().clone();
    assert!(wait_until(WAIT, || store.len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.snapshot_logs()[0].payload, "Refresh");

    server.handle.stop().await;
}

#[tokio::test]
async fn test_raw_client_receives_command_frames() {
    let server = start_server(StoreLimits::default()).await;
    let url = format!("ws://{}/ws/raw", server.addr);
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    let handle = server.handle.clone();
    assert!(wait_until(WAIT, || handle.client_count() == 1).await);
    server
        .handle
        .send_command(&DebugCommand::inject_action("CartViewModel", "Clear"));

    let frame = tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {other:?}"),
            }
        }
    })
    .await
    .expect("frame arrives");

    let command = decode_command(&frame).expect("valid command");
    assert_eq!(command.kind, CommandKind::InjectAction);
    assert_eq!(command.payload, "Clear");

    server.handle.stop().await;
}

#[tokio::test]
async fn test_stop_clears_store_and_drops_clients() {
    let server = start_server(StoreLimits::default()).await;
    let session = DebugSession::connect(session_config(server.addr, "shop"));
    session.send(DebugEvent::effect("Feed", "Refresh"));

    let store = server.handle.store().clone();
    assert!(wait_until(WAIT, || store.len() == 1).await);

    server.handle.stop().await;
    assert!(server.handle.is_stopped());
    assert!(store.is_empty());

    let mut status = session.watch_status();
    tokio::time::timeout(
        WAIT,
        status.wait_for(|s| matches!(s, ConnectionStatus::Sink | ConnectionStatus::Closed)),
    )
    .await
    .expect("session notices the drop")
    .expect("status channel open");

    tokio::time::timeout(WAIT, server.task)
        .await
        .expect("server exits")
        .expect("server task ok");
}

#[tokio::test]
async fn test_health_endpoint_reports_counts() {
    let server = start_server(StoreLimits::default()).await;

    let mut stream = TcpStream::connect(server.addr).await.expect("connect");
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");

    assert!(response.starts_with("HTTP/1.1 200"));
    let body = response.split("\r\n\r\n").nth(1).expect("body");
    let json: serde_json::Value = serde_json::from_str(body).expect("json body");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "mvi-devtools");
    assert_eq!(json["clients"], 0);
    assert_eq!(json["events"], 0);

    server.handle.stop().await;
}

#[tokio::test]
async fn test_stop_during_flood_leaves_store_empty() {
    let server = start_server(StoreLimits::default()).await;
    let url = format!("ws://{}/ws/flood", server.addr);
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    let frame = encode_event(&DebugEvent::effect("Feed", "Tick")).expect("encode");
    let flood = tokio::spawn(async move {
        for _ in 0..2_000 {
            if ws.send(Message::Text(frame.clone().into())).await.is_err() {
                break;
            }
        }
    });

    let store = server.handle.store().clone();
    assert!(wait_until(WAIT, || !store.is_empty()).await);

    tokio::time::timeout(WAIT, server.handle.stop())
        .await
        .expect("stop finishes");
    assert!(store.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.is_empty());
    assert_eq!(server.handle.client_count(), 0);

    let _ = tokio::time::timeout(WAIT, flood).await;
}

#[tokio::test]
async fn test_session_reconnects_to_restarted_host() {
    let first = start_server(StoreLimits::default()).await;
    let addr = first.addr;
    let session = DebugSession::connect(SessionConfig {
        reconnect_attempts: 20,
        reconnect_backoff_ms: 25,
        ..session_config(addr, "shop")
    });
    let mut status = session.watch_status();
    tokio::time::timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("first connect")
        .expect("status channel open");

    first.handle.stop().await;
    tokio::time::timeout(WAIT, status.wait_for(|s| *s != ConnectionStatus::Connected))
        .await
        .expect("session notices the drop")
        .expect("status channel open");

    let second = start_server_at(addr, StoreLimits::default()).await;
    tokio::time::timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("reconnects")
        .expect("status channel open");

    session.send(DebugEvent::effect("Feed", "AfterRestart"));
    let store = second.handle.store().clone();
    assert!(wait_until(WAIT, || store.len() == 1).await);
    assert_eq!(store.snapshot_logs()[0].payload, "AfterRestart");

    session.disconnect();
    session.closed().await;
    second.handle.stop().await;
}
