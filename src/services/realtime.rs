use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::dto::ws::{ClientCommand, ServerEvent};
use crate::error::SessionError;

/// Lifecycle of the underlying connection, owned by [`RealtimeChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Handshake in progress.
    Connecting,
    /// Connected; commands can be sent.
    Open,
    /// The connection failed; terminal, no reconnection is attempted.
    Errored,
    /// The connection was closed, by either side.
    Closed,
}

/// Connection-lifecycle signals and parsed events, delivered strictly in
/// arrival order to the single consumer.
#[derive(Debug)]
pub enum ChannelSignal {
    /// A parsed inbound event frame.
    Event(ServerEvent),
    /// The connection failed. Terminal.
    Errored(tungstenite::Error),
    /// The connection was closed. Terminal.
    Closed,
}

/// The one bidirectional streaming connection of a play session.
///
/// Inbound text frames are parsed into [`ServerEvent`]s by a reader task;
/// frames that are not valid JSON are logged and skipped, the session
/// continues. A dedicated writer task drains outbound frames so sends never
/// block the dispatch loop. There is no reconnection: an error or close is
/// surfaced once and the channel is done.
#[derive(Debug)]
pub struct RealtimeChannel {
    outbound: Option<mpsc::UnboundedSender<Message>>,
    signals: mpsc::UnboundedReceiver<ChannelSignal>,
    phase: ConnectionPhase,
    reader: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Open the party channel. Resolving successfully means the handshake
    /// completed, so the returned channel is already `Open`.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let mut phase = ConnectionPhase::Connecting;
        debug!(%url, ?phase, "opening party channel");
        let (stream, _response) = connect_async(url).await.map_err(SessionError::Connect)?;
        phase = ConnectionPhase::Open;
        let (mut sink, mut stream) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<ChannelSignal>();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || is_close {
                    break;
                }
            }
        });

        let pong_tx = outbound_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if signal_tx.send(ChannelSignal::Event(event)).is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "ignoring malformed event frame");
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = pong_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        let _ = signal_tx.send(ChannelSignal::Errored(err));
                        return;
                    }
                }
            }
            let _ = signal_tx.send(ChannelSignal::Closed);
        });

        info!("party channel open");
        Ok(Self {
            outbound: Some(outbound_tx),
            signals: signal_rx,
            phase,
            reader,
        })
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Wait for the next signal. Yields `None` once the channel is torn
    /// down. Terminal signals also flip the phase so later sends become
    /// no-ops.
    pub async fn next_signal(&mut self) -> Option<ChannelSignal> {
        let signal = self.signals.recv().await;
        match &signal {
            Some(ChannelSignal::Errored(_)) => self.phase = ConnectionPhase::Errored,
            Some(ChannelSignal::Closed) | None => self.phase = ConnectionPhase::Closed,
            Some(ChannelSignal::Event(_)) => {}
        }
        signal
    }

    /// Queue a command frame. Commands issued while the channel is not open
    /// are dropped with a warning; the state machine guards against this,
    /// so hitting the guard means a race with teardown, not a bug upstream.
    pub fn send(&mut self, command: &ClientCommand) {
        if self.phase != ConnectionPhase::Open {
            warn!(phase = ?self.phase, "dropping command while channel is not open");
            return;
        }

        let payload = match serde_json::to_string(command) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize command `{command:?}`");
                return;
            }
        };

        let Some(outbound) = &self.outbound else {
            return;
        };
        if outbound.send(Message::Text(payload.into())).is_err() {
            warn!("writer task ended; marking channel closed");
            self.phase = ConnectionPhase::Closed;
        }
    }

    /// Close the connection. Idempotent; called on every session exit path.
    pub fn close(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };
        let _ = outbound.send(Message::Close(None));
        self.phase = ConnectionPhase::Closed;
        info!("party channel closed");
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        // The writer winds down once the outbound sender is gone; the reader
        // may be parked on the socket and has to be aborted.
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn local_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/p-1", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn delivers_events_in_arrival_order_then_closed() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"new_question","question":"q1","choices":["a","b"],"timeout":10}"#
                    .into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"event":"game_over","scores":{}}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        });

        let mut channel = RealtimeChannel::connect(&url).await.unwrap();
        assert_eq!(channel.phase(), ConnectionPhase::Open);

        match channel.next_signal().await {
            Some(ChannelSignal::Event(ServerEvent::NewQuestion { question, .. })) => {
                assert_eq!(question, "q1");
            }
            other => panic!("expected new_question first, got {other:?}"),
        }
        match channel.next_signal().await {
            Some(ChannelSignal::Event(ServerEvent::GameOver { .. })) => {}
            other => panic!("expected game_over second, got {other:?}"),
        }
        match channel.next_signal().await {
            Some(ChannelSignal::Closed) => {}
            other => panic!("expected closed, got {other:?}"),
        }
        assert_eq!(channel.phase(), ConnectionPhase::Closed);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let (listener, url) = local_server().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(Message::Text("not json".into())).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"question_timeout"}"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        });

        let mut channel = RealtimeChannel::connect(&url).await.unwrap();
        match channel.next_signal().await {
            Some(ChannelSignal::Event(ServerEvent::QuestionTimeout)) => {}
            other => panic!("expected the valid frame only, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commands_reach_the_server() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            let frame = ws.next().await.unwrap().unwrap();
            let payload: serde_json::Value =
                serde_json::from_str(frame.to_text().unwrap()).unwrap();
            assert_eq!(payload["event"], "answer");
            assert_eq!(payload["answer"], "a");
            ws.close(None).await.unwrap();
        });

        let mut channel = RealtimeChannel::connect(&url).await.unwrap();
        channel.send(&ClientCommand::Answer {
            answer: "a".into(),
            user_id: "u-1".into(),
            party_id: "p-1".into(),
        });

        while let Some(signal) = channel.next_signal().await {
            if matches!(signal, ChannelSignal::Closed) {
                break;
            }
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_silences_sends() {
        let (listener, url) = local_server().await;
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if matches!(frame, Message::Close(_)) {
                    break;
                }
            }
        });

        let mut channel = RealtimeChannel::connect(&url).await.unwrap();
        channel.close();
        channel.close();
        assert_eq!(channel.phase(), ConnectionPhase::Closed);

        // Dropped, not queued: the channel is no longer open.
        channel.send(&ClientCommand::StartGame {
            user_id: "u-1".into(),
            party_id: "p-1".into(),
        });
    }
}
