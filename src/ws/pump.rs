//! Reader/writer halves of a push connection.
//!
//! Both halves are generic over the socket's `Sink`/`Stream` so they can be driven by
//! in-memory channels in tests.

use crate::hub::FrameReceiver;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;

/// Why the writer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// Outbound queue closed: unregistered or evicted as a slow consumer
    QueueClosed,
    WriteFailed,
}

/// Why the reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    ClientClosed,
    StreamEnded,
    ReadError,
    IdleTimeout,
}

/// Forward queued frames to the socket, pinging the client every `ping_interval`.
///
/// Sends a close frame once the queue is closed.
pub async fn write_frames<S>(
    mut sink: S,
    mut outbound: FrameReceiver,
    ping_interval: Duration,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    ping.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        return WriterExit::WriteFailed;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return WriterExit::QueueClosed;
                }
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    return WriterExit::WriteFailed;
                }
            }
        }
    }
}

/// Read from the socket until it closes, fails, or stays silent for `idle_timeout`.
///
/// Inbound application data is ignored; any frame (pongs included) counts as activity.
pub async fn read_until_closed<S, E>(stream: &mut S, idle_timeout: Duration) -> ReaderExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        match tokio::time::timeout(idle_timeout, stream.next()).await {
            Err(_) => return ReaderExit::IdleTimeout,
            Ok(None) => return ReaderExit::StreamEnded,
            Ok(Some(Err(e))) => {
                tracing::debug!("WebSocket read error: {}", e);
                return ReaderExit::ReadError;
            }
            Ok(Some(Ok(Message::Close(_)))) => return ReaderExit::ClientClosed,
            Ok(Some(Ok(Message::Text(text)))) => {
                tracing::debug!("Ignoring {} bytes of inbound text", text.as_str().len());
            }
            Ok(Some(Ok(_))) => {}
        }
    }
}
