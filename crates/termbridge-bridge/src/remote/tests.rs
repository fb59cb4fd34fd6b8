//! Remote backend tests against a real loopback WebSocket server.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use termbridge_common::{BridgePhase, ConnectionState, TermSize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use super::RemoteBackend;
use crate::isolation;
use crate::session::SessionEnd;
use crate::surface::{HeadlessProbe, HeadlessSurface};
use crate::view::TerminalView;

const WAIT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

/// Accept a single connection on an ephemeral port and hand it to `handler`.
async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{addr}")
}

/// Keep reading until the client goes away.
async fn drain(ws: &mut ServerWs) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn view_for(url: &str) -> (TerminalView, HeadlessProbe) {
    let (surface, probe) = HeadlessSurface::new(TermSize::default());
    let view = TerminalView::new(Arc::new(RemoteBackend::new(url)), Box::new(surface));
    (view, probe)
}

#[tokio::test]
async fn open_sends_resize_then_writes_server_text_once() {
    let (first_tx, first_rx) = oneshot::channel();
    let url = serve_once(|mut ws| async move {
        let first = ws.next().await.unwrap().unwrap();
        let _ = first_tx.send(first);
        ws.send(Message::Text("hello\r\n".into())).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let (mut view, probe) = view_for(&url);
    assert!(view.mount().unwrap());

    let first = tokio::time::timeout(WAIT, first_rx).await.unwrap().unwrap();
    assert_eq!(
        first,
        Message::Text(r#"{"type":"resize","cols":80,"rows":24}"#.into())
    );

    assert!(probe.wait_for_output("hello\r\n", WAIT).await);
    let hellos = probe.writes().iter().filter(|w| *w == "hello\r\n").count();
    assert_eq!(hellos, 1);
    assert_eq!(view.session().connection(), ConnectionState::Connected);
    assert_eq!(view.session().phase(), BridgePhase::Ready);

    view.unmount().await;
}

#[tokio::test]
async fn server_close_disconnects_with_one_notice() {
    let url = serve_once(|mut ws| async move {
        let _ = ws.close(None).await;
        drain(&mut ws).await;
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();

    let end = tokio::time::timeout(WAIT, view.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(end, SessionEnd::Disconnected);
    assert_eq!(
        view.session().connection_history(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected
        ]
    );
    assert_eq!(probe.output().matches("Connection closed.").count(), 1);

    // Typing after the socket closed is dropped silently.
    probe.type_input("lost");
    view.unmount().await;
    assert_eq!(probe.output().matches("Connection closed.").count(), 1);
    assert_eq!(probe.dispose_count(), 1);
}

#[tokio::test]
async fn keystrokes_are_forwarded_in_order() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let url = serve_once(|mut ws| async move {
        // Initial resize.
        let _ = ws.next().await;
        while let Some(Ok(frame)) = ws.next().await {
            if frames_tx.send(frame).is_err() {
                break;
            }
        }
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();
    let mut connected = view.session().watch_connection();
    tokio::time::timeout(WAIT, connected.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    probe.type_input("l");
    probe.type_input("s");
    probe.type_input("\r");
    probe.type_input(vec![0xff, 0xfe]);

    let mut received = Vec::new();
    while received.len() < 4 {
        let frame = tokio::time::timeout(WAIT, frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(frame);
    }
    assert_eq!(
        received,
        vec![
            Message::Text("l".into()),
            Message::Text("s".into()),
            Message::Text("\r".into()),
            Message::Binary(vec![0xff, 0xfe].into()),
        ]
    );

    view.unmount().await;
}

#[tokio::test]
async fn each_resize_event_sends_one_notification() {
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let url = serve_once(|mut ws| async move {
        while let Some(Ok(frame)) = ws.next().await {
            if frames_tx.send(frame).is_err() {
                break;
            }
        }
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();

    let initial = tokio::time::timeout(WAIT, frames_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        initial,
        Message::Text(r#"{"type":"resize","cols":80,"rows":24}"#.into())
    );

    probe.resize(TermSize::new(100, 50));
    probe.resize(TermSize::new(100, 50));
    probe.resize(TermSize::new(120, 40));

    let mut resizes = Vec::new();
    while resizes.len() < 3 {
        let frame = tokio::time::timeout(WAIT, frames_rx.recv())
            .await
            .unwrap()
            .unwrap();
        resizes.push(frame.into_text().unwrap().to_string());
    }
    assert_eq!(
        resizes,
        vec![
            r#"{"type":"resize","cols":100,"rows":50}"#,
            r#"{"type":"resize","cols":100,"rows":50}"#,
            r#"{"type":"resize","cols":120,"rows":40}"#,
        ]
    );
    assert_eq!(view.session().size(), TermSize::new(120, 40));

    view.unmount().await;
}

#[tokio::test]
async fn binary_output_is_decoded() {
    let url = serve_once(|mut ws| async move {
        let _ = ws.next().await;
        ws.send(Message::Binary(b"caf\xc3\xa9 \xff".to_vec().into()))
            .await
            .unwrap();
        drain(&mut ws).await;
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();

    assert!(probe.wait_for_output("caf\u{e9} \u{fffd}", WAIT).await);
    view.unmount().await;
}

#[tokio::test]
async fn connect_failure_fails_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (mut view, probe) = view_for(&format!("ws://{addr}"));
    view.mount().unwrap();

    let end = tokio::time::timeout(WAIT, view.wait_until_settled())
        .await
        .unwrap();
    assert_eq!(end, SessionEnd::Failed);
    assert_eq!(view.session().phase(), BridgePhase::Failed);
    assert_eq!(
        view.session().connection_history(),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );
    assert!(probe.output().contains("Error: connect to"));

    view.unmount().await;
}

#[tokio::test]
async fn unmount_closes_the_socket() {
    let (closed_tx, closed_rx) = oneshot::channel();
    let url = serve_once(|mut ws| async move {
        drain(&mut ws).await;
        let _ = closed_tx.send(());
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();
    let mut connected = view.session().watch_connection();
    tokio::time::timeout(WAIT, connected.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    view.unmount().await;
    tokio::time::timeout(WAIT, closed_rx).await.unwrap().unwrap();
    assert_eq!(probe.dispose_count(), 1);
    assert!(!probe.output().contains("Connection closed."));
}

#[tokio::test]
async fn unsatisfied_transport_check_warns_and_connects() {
    let url = serve_once(|mut ws| async move {
        let _ = ws.next().await;
        ws.send(Message::Text("$ ".into())).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let backend = RemoteBackend::new(url)
        .with_isolation(isolation::always_unsatisfied("plaintext endpoint"));
    let (surface, probe) = HeadlessSurface::new(TermSize::default());
    let mut view = TerminalView::new(Arc::new(backend), Box::new(surface));
    view.mount().unwrap();

    assert!(probe.wait_for_output("$ ", WAIT).await);
    let output = probe.output();
    assert!(output.contains("plaintext endpoint"));
    assert!(output.find("plaintext endpoint") < output.find("$ "));

    view.unmount().await;
}

#[tokio::test]
async fn output_flows_while_peer_stops_reading() {
    let url = serve_once(|mut ws| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        ws.send(Message::Text("MARKER".into())).await.unwrap();
        // Hold the socket open without reading anything.
        tokio::time::sleep(Duration::from_secs(30)).await;
    })
    .await;

    let (mut view, probe) = view_for(&url);
    view.mount().unwrap();
    let mut connected = view.session().watch_connection();
    tokio::time::timeout(WAIT, connected.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    // Far more than the socket buffers can hold.
    let chunk = "a".repeat(64 * 1024);
    for _ in 0..256 {
        probe.type_input(chunk.as_str());
    }

    assert!(probe.wait_for_output("MARKER", WAIT).await);

    let started = tokio::time::Instant::now();
    view.unmount().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(probe.dispose_count(), 1);
}
