// Realtime channel: WebSocket connections upgraded from the HTTP listener.
// Events and connection notices travel over tokio broadcast channels.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::AppContext;

const EVENT_CAPACITY: usize = 1000;
const CONNECTION_CAPACITY: usize = 64;

/// One message pushed to every connected client.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub channel: String,
    pub data: Value,
}

impl ChannelEvent {
    pub fn new(channel: impl Into<String>, data: Value) -> Self {
        Self {
            channel: channel.into(),
            data,
        }
    }
}

/// Announced once per accepted socket.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    pub client_id: Uuid,
}

#[derive(Clone)]
pub struct RealtimeChannel {
    events: broadcast::Sender<ChannelEvent>,
    connections: broadcast::Sender<ConnectionInfo>,
}

impl RealtimeChannel {
    pub fn init() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (connections, _) = broadcast::channel(CONNECTION_CAPACITY);
        Self {
            events,
            connections,
        }
    }

    /// Subscribe to "new connection" notices.
    pub fn on_connection(&self) -> broadcast::Receiver<ConnectionInfo> {
        self.connections.subscribe()
    }

    /// Push an event to every connected client. Returns how many receivers got it.
    pub fn emit(&self, event: ChannelEvent) -> usize {
        match self.events.send(event) {
            Ok(count) => {
                debug!("Realtime event delivered to {} receivers", count);
                count
            }
            Err(_) => {
                debug!("No realtime receivers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    fn announce(&self, info: ConnectionInfo) {
        // Nobody listening for connection notices is fine.
        let _ = self.connections.send(info);
    }
}

// --- GET /socket ---
pub async fn socket_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    let channel = ctx.realtime.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, channel))
}

async fn serve_socket(mut socket: WebSocket, channel: RealtimeChannel) {
    let info = ConnectionInfo {
        client_id: Uuid::new_v4(),
    };
    let mut events = channel.subscribe();
    channel.announce(info);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize realtime event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        client_id = %info.client_id,
                        "Realtime client lagged, skipped {} events",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Keep polling after a close frame so the reply gets flushed
                Some(Ok(Message::Close(_))) => {}
                Some(Ok(Message::Text(text))) => {
                    debug!(
                        client_id = %info.client_id,
                        "Ignoring client message: {}",
                        text.as_str()
                    );
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(client_id = %info.client_id, "Realtime socket error: {}", e);
                    break;
                }
                None => break,
            },
        }
    }

    debug!(client_id = %info.client_id, "Client disconnected");
}
