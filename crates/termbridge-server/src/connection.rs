//! Per-connection handler: spawn a shell, then pump frames both ways.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use termbridge_bridge::notices;
use termbridge_bridge::remote::{write_frames, ControlMessage};
use termbridge_bridge::sandbox::{ProcessOutput, SandboxService, ShellProcess, SpawnRequest};
use termbridge_bridge::Utf8Decoder;
use termbridge_common::TermSize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// How long a closing connection waits for queued output to reach the client.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

enum Ended {
    ClientGone,
    ShellExited(Option<u32>),
}

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    service: Arc<SandboxService>,
    shell: SpawnRequest,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. Get the shared container and a shell of our own.
    let spawned = match service.container().await {
        Ok(container) => container.spawn(shell).await,
        Err(e) => Err(e),
    };
    let mut process = match spawned {
        Ok(process) => process,
        Err(e) => {
            tracing::error!(peer = %addr, error = %e, "Failed to start shell");
            let _ = sink
                .send(Message::Text(notices::error(&e.to_string()).into()))
                .await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };
    let Some(mut output) = process.take_output() else {
        tracing::error!(peer = %addr, "Shell output stream unavailable");
        let _ = process.kill();
        let _ = sink.send(Message::Close(None)).await;
        return;
    };

    tracing::info!(peer = %addr, pid = ?process.pid(), "Client attached");

    // 2. Writer task owns the sink so a slow client never blocks reads.
    let (frames, queued) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_frames(sink, queued));

    // 3. Forwarding loop.
    let mut decoder = Utf8Decoder::new();
    let ended = loop {
        tokio::select! {
            chunk = output.recv() => match chunk {
                Some(ProcessOutput::Data(bytes)) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        let _ = frames.send(Message::Text(text.into()));
                    }
                }
                Some(ProcessOutput::Exited(code)) => break Ended::ShellExited(code),
                None => break Ended::ShellExited(None),
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => apply_text(process.as_mut(), text.as_str(), addr),
                Some(Ok(Message::Binary(data))) => write_input(process.as_mut(), &data, addr),
                Some(Ok(Message::Ping(data))) => {
                    let _ = frames.send(Message::Pong(data));
                }
                Some(Ok(Message::Close(_))) | None => break Ended::ClientGone,
                Some(Err(e)) => {
                    tracing::debug!(peer = %addr, error = %e, "WS error");
                    break Ended::ClientGone;
                }
                _ => {}
            },

            written = &mut writer => {
                if let Ok(Err(e)) = written {
                    tracing::debug!(peer = %addr, error = %e, "WS send failed");
                }
                break Ended::ClientGone;
            }
        }
    };

    // 4. Cleanup.
    match ended {
        Ended::ClientGone => {
            tracing::info!(peer = %addr, "Client disconnected");
            if let Err(e) = process.kill() {
                tracing::debug!(peer = %addr, error = %e, "Shell kill failed");
            }
            if !writer.is_finished() {
                writer.abort();
            }
        }
        Ended::ShellExited(code) => {
            tracing::info!(peer = %addr, ?code, "Shell exited");
            let tail = decoder.finish();
            if !tail.is_empty() {
                let _ = frames.send(Message::Text(tail.into()));
            }
            let _ = frames.send(Message::Close(None));
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                tracing::debug!(peer = %addr, "Client not draining, dropping socket");
                writer.abort();
            }
        }
    }
}

/// A text frame is either a control message or raw input.
fn apply_text(process: &mut dyn ShellProcess, text: &str, addr: SocketAddr) {
    match ControlMessage::parse(text) {
        Some(ControlMessage::Resize { cols, rows }) => {
            let size = TermSize::new(cols, rows);
            if !size.is_valid() {
                tracing::warn!(peer = %addr, %size, "Ignoring invalid resize");
                return;
            }
            tracing::debug!(peer = %addr, %size, "Resize");
            if let Err(e) = process.resize(size) {
                tracing::warn!(peer = %addr, error = %e, "Resize failed");
            }
        }
        None => write_input(process, text.as_bytes(), addr),
    }
}

fn write_input(process: &mut dyn ShellProcess, data: &[u8], addr: SocketAddr) {
    if let Err(e) = process.write(data) {
        tracing::debug!(peer = %addr, error = %e, "Input dropped");
    }
}
