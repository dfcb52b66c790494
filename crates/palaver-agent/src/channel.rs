//! Channel client — one WebSocket connection per agent
//!
//! Bridges the socket to the runtime's mpsc pair. Transport failure is never
//! swallowed: it is logged and answered with reconnect-plus-backoff, because
//! a silently dead socket looks exactly like a quiet room.

use futures::{SinkExt, StreamExt};
use palaver_core::{protocol, ChannelMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMsg};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

pub struct ChannelClient {
    url: String,
    agent_id: String,
}

impl ChannelClient {
    pub fn new(url: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            agent_id: agent_id.into(),
        }
    }

    /// Run until shutdown: connect, pump frames both ways, reconnect on error.
    pub async fn run(
        self,
        inbound: mpsc::Sender<ChannelMessage>,
        mut outbound: mpsc::Receiver<ChannelMessage>,
        shutdown: CancellationToken,
    ) {
        let mut backoff = BACKOFF_INITIAL;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let ws_stream = tokio::select! {
                _ = shutdown.cancelled() => break,
                connected = connect_async(&self.url) => match connected {
                    Ok((stream, _)) => {
                        info!(agent = %self.agent_id, url = %self.url, "channel connected");
                        backoff = BACKOFF_INITIAL;
                        stream
                    }
                    Err(e) => {
                        warn!(
                            agent = %self.agent_id,
                            retry_in_s = backoff.as_secs(),
                            "channel connect failed: {}", e
                        );
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                        continue;
                    }
                },
            };

            let (mut ws_tx, mut ws_rx) = ws_stream.split();

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,

                    out = outbound.recv() => match out {
                        Some(message) => {
                            let frame = match protocol::encode_frame(&message) {
                                Ok(frame) => frame,
                                Err(e) => {
                                    warn!(agent = %self.agent_id, "unencodable outbound message: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = ws_tx.send(WsMsg::Text(frame)).await {
                                warn!(agent = %self.agent_id, "channel send failed: {}", e);
                                break;
                            }
                        }
                        // Runtime gone; nothing left to do on this socket.
                        None => return,
                    },

                    frame = ws_rx.next() => match frame {
                        Some(Ok(WsMsg::Text(text))) => match protocol::decode_frame(&text) {
                            Ok(message) => {
                                if inbound.send(message).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => debug!(agent = %self.agent_id, "dropping bad frame: {}", e),
                        },
                        Some(Ok(WsMsg::Ping(_) | WsMsg::Pong(_))) => {}
                        Some(Ok(WsMsg::Close(_))) | None => {
                            warn!(agent = %self.agent_id, "channel closed, reconnecting");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(agent = %self.agent_id, "channel read error: {}", e);
                            break;
                        }
                    },
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
        info!(agent = %self.agent_id, "channel client stopped");
    }
}
