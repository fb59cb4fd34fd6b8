use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use termbridge_common::{BackendKind, BridgeError, BridgePhase, ConnectionState, TransportError};
use termbridge_config::TermbridgeConfig;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::connect_async;

use super::protocol::ControlMessage;
use crate::isolation::{self, IsolationCheck};
use crate::notices;
use crate::session::SessionEnd;
use crate::surface::SurfaceEvent;
use crate::view::{Backend, BridgeLink};

/// Bridges a surface to a shell server over WebSocket.
///
/// Each mount opens its own socket. There is no reconnect: once the
/// socket closes, the session stays disconnected until the view is
/// remounted.
pub struct RemoteBackend {
    url: String,
    isolation: IsolationCheck,
}

impl RemoteBackend {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let isolation = isolation::transport_security(&url);
        Self { url, isolation }
    }

    pub fn from_config(config: &TermbridgeConfig) -> Self {
        Self::new(config.remote.url.clone())
    }

    /// Replace the transport security check.
    pub fn with_isolation(mut self, check: IsolationCheck) -> Self {
        self.isolation = check;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Input bytes become a text frame when they are valid UTF-8, a binary
/// frame otherwise.
fn input_frame(bytes: Vec<u8>) -> Message {
    match String::from_utf8(bytes) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}

fn resize_frame(message: ControlMessage) -> Result<Message, TransportError> {
    Ok(Message::Text(message.to_json()?.into()))
}

/// How long an unmount waits for queued frames and the close frame to
/// drain before the writer is dropped.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Owns the socket's write half. Frames go out in queue order; the pump
/// only enqueues, so a peer that stops reading never stalls the read side.
///
/// Ends after sending a close frame or when the queue is dropped.
pub async fn write_frames<S>(
    mut sink: S,
    mut frames: mpsc::UnboundedReceiver<Message>,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = frames.recv().await {
        let closing = matches!(frame, Message::Close(_));
        sink.send(frame)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
    Ok(())
}

#[async_trait]
impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn run(&self, link: BridgeLink) -> Result<(), BridgeError> {
        link.report_isolation(&self.isolation);

        let BridgeLink {
            session,
            surface,
            mut events,
            cancel,
        } = link;

        session.set_connection(ConnectionState::Connecting);
        tracing::info!(session = session.id().short(), url = %self.url, "connecting");

        let connected = tokio::select! {
            _ = cancel.cancelled() => {
                session.set_connection(ConnectionState::Disconnected);
                return Err(BridgeError::Cancelled);
            }
            result = connect_async(self.url.as_str()) => result,
        };
        let ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                session.set_connection(ConnectionState::Disconnected);
                return Err(TransportError::Connect {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        session.set_connection(ConnectionState::Connected);
        session.set_phase(BridgePhase::Ready);

        let (sink, mut stream) = ws.split();
        let (frames, queued) = mpsc::unbounded_channel();
        let mut writer = tokio::spawn(write_frames(sink, queued));

        let size = surface.size();
        session.set_size(size);
        let _ = frames.send(resize_frame(ControlMessage::resize(size))?);

        let mut events_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(session = session.id().short(), "closing socket on unmount");
                    let _ = frames.send(Message::Close(None));
                    if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                        tracing::debug!(session = session.id().short(), "peer not draining, dropping socket");
                        writer.abort();
                    }
                    session.set_connection(ConnectionState::Disconnected);
                    return Ok(());
                }

                written = &mut writer => {
                    match written {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::error!(session = session.id().short(), error = %e, "websocket error");
                            surface.write(notices::CONNECTION_ERROR);
                        }
                        Err(e) => {
                            tracing::error!(session = session.id().short(), error = %e, "websocket writer stopped");
                            surface.write(notices::CONNECTION_ERROR);
                        }
                    }
                    break;
                }

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        surface.write(text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        surface.write(&String::from_utf8_lossy(&data));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = frames.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(session = session.id().short(), ?frame, "server closed the connection");
                        break;
                    }
                    None | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
                    Some(Err(e)) => {
                        tracing::error!(session = session.id().short(), error = %e, "websocket error");
                        surface.write(notices::CONNECTION_ERROR);
                        break;
                    }
                    Some(Ok(_)) => {}
                },

                event = events.recv(), if events_open => match event {
                    Some(SurfaceEvent::Input(bytes)) => {
                        let _ = frames.send(input_frame(bytes));
                    }
                    Some(SurfaceEvent::Resize(size)) => {
                        session.set_size(size);
                        let _ = frames.send(resize_frame(ControlMessage::resize(size))?);
                    }
                    None => events_open = false,
                },
            }
        }

        if !writer.is_finished() {
            writer.abort();
        }
        session.set_connection(ConnectionState::Disconnected);
        surface.write(notices::CONNECTION_CLOSED);
        session.settle(SessionEnd::Disconnected);
        Ok(())
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn utf8_input_is_a_text_frame() {
        assert_eq!(input_frame(b"ls\r".to_vec()), Message::Text("ls\r".into()));
    }

    #[test]
    fn invalid_utf8_input_is_a_binary_frame() {
        let bytes = vec![0xff, 0x1b, b'['];
        assert_eq!(input_frame(bytes.clone()), Message::Binary(bytes.into()));
    }

    #[tokio::test]
    async fn writer_reports_send_failure() {
        let sink = Box::pin(futures_util::sink::unfold((), |(), _frame: Message| async {
            Err::<(), _>("connection reset")
        }));
        let (frames, queued) = mpsc::unbounded_channel();
        frames.send(Message::Text("ls".into())).unwrap();

        let err = write_frames(sink, queued).await.unwrap_err();
        assert!(matches!(err, TransportError::Send(reason) if reason == "connection reset"));
    }

    #[test]
    fn from_config_uses_remote_url() {
        let config = TermbridgeConfig::default();
        let backend = RemoteBackend::from_config(&config);
        assert_eq!(backend.url(), "ws://localhost:4000");
    }
}
