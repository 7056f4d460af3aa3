//! Hub server core: shared state, WebSocket handler, session lifecycle,
//! and event dispatch.
//!
//! The hub accepts WebSocket connections, assigns each one a [`SessionId`],
//! and routes opaque payloads between the active master and its clients.
//! Each inbound frame is decoded into a [`ClientEvent`] and dispatched to
//! exactly one handler; the sender's role is looked up at dispatch time,
//! never captured in per-role subscriptions.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use maestro_proto::codec;
use maestro_proto::events::{ClientEvent, ServerEvent};
use maestro_proto::session::{Role, SessionId};
use tokio::sync::mpsc;

use crate::registry::{Session, SessionRegistry};
use crate::roles;
use crate::router;

/// Default maximum allowed payload size in bytes (64 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Shared hub state holding the session registry.
pub struct HubState {
    /// All active sessions, keyed by identity.
    pub registry: SessionRegistry,
    /// Maximum allowed payload size in bytes.
    max_payload_size: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Creates hub state with an empty registry and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Creates hub state with a custom payload size limit.
    #[must_use]
    pub fn with_config(max_payload_size: usize) -> Self {
        Self {
            registry: SessionRegistry::new(),
            max_payload_size,
        }
    }

    /// Maximum allowed payload size in bytes.
    #[must_use]
    pub const fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Sends an event to a single session. Unknown ids and closed
    /// channels are ignored — delivery is fire-and-forget.
    pub async fn send_to(&self, id: SessionId, event: &ServerEvent) {
        if let Some(sender) = self.registry.sender(id).await
            && let Ok(bytes) = codec::encode(event)
        {
            let _ = sender.send(Message::Binary(bytes.into()));
        }
    }

    /// Sends an event to every session.
    pub async fn broadcast_all(&self, event: &ServerEvent) {
        let bytes = match codec::encode(event) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound event");
                return;
            }
        };
        for (id, sender) in self.registry.senders().await {
            if sender.send(Message::Binary(bytes.clone().into())).is_err() {
                tracing::debug!(session = %id, "outbound channel closed, dropping event");
            }
        }
    }

    /// Sends an event to every session except one.
    pub async fn broadcast_except(&self, excluded: SessionId, event: &ServerEvent) {
        let bytes = match codec::encode(event) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound event");
                return;
            }
        };
        for (id, sender) in self.registry.senders_except(excluded).await {
            if sender.send(Message::Binary(bytes.clone().into())).is_err() {
                tracing::debug!(session = %id, "outbound channel closed, dropping event");
            }
        }
    }
}

/// Handles an upgraded WebSocket connection for a single endpoint.
///
/// The connection lifecycle:
/// 1. Assign a fresh `SessionId` and insert an `Unassigned` session.
/// 2. Send `Welcome` to the new endpoint and announce it to the others.
/// 3. Enter the message loop, dispatching decoded events.
/// 4. On disconnect, remove the session and notify per its role.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>, addr: std::net::SocketAddr) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let id = SessionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state
        .registry
        .insert(Session::new(id, addr.to_string()), tx)
        .await;

    tracing::info!(session = %id, address = %addr, "endpoint connected");

    // Announce the assigned identity to the new endpoint.
    if let Err(e) = send_event(&mut ws_sender, &ServerEvent::Welcome { id }).await {
        tracing::error!(session = %id, error = %e, "failed to send welcome");
        state.registry.remove(id).await;
        return;
    }

    // Everyone else learns the new identity; only transport-level info is
    // known until the endpoint registers a device name.
    state
        .broadcast_except(
            id,
            &ServerEvent::ClientConnected {
                id,
                address: addr.to_string(),
                device_name: None,
            },
        )
        .await;

    // Writer task: forwards events from the channel to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(session = %id, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader loop: dispatch incoming events from this endpoint.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_frame(id, &data, &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(session = %id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    handle_disconnect(&state, id).await;
}

/// Decodes one inbound frame and dispatches it to its handler.
///
/// Undecodable frames are logged and skipped; nothing is surfaced to the
/// endpoint that sent them.
async fn handle_frame(id: SessionId, data: &[u8], state: &Arc<HubState>) {
    let event = match codec::decode::<ClientEvent>(data) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "failed to decode inbound event");
            return;
        }
    };

    match event {
        ClientEvent::RegisterDevice { device_name } => {
            register_device(state, id, device_name).await;
        }
        ClientEvent::SetRole {
            role,
            master_ip,
            device_model,
        } => {
            roles::declare_role(state, id, role, master_ip, device_model).await;
        }
        ClientEvent::SendData { data, device_name } => {
            router::route(state, id, &data, device_name.as_deref()).await;
        }
        ClientEvent::ForwardData {
            data,
            sender_id,
            recipient_id,
            device_name,
        } => {
            router::relay_from_master(
                state,
                id,
                &data,
                sender_id,
                recipient_id,
                device_name.as_deref(),
            )
            .await;
        }
    }
}

/// Attaches a device name to a session and re-announces its identity.
///
/// Metadata-only: routing is unaffected.
async fn register_device(state: &HubState, id: SessionId, device_name: String) {
    let Some(session) = state.registry.set_device_name(id, device_name).await else {
        tracing::warn!(session = %id, "device registration from unknown session");
        return;
    };
    tracing::info!(session = %id, device = ?session.device_name, "device registered");
    state
        .broadcast_except(
            id,
            &ServerEvent::ClientConnected {
                id,
                address: session.addr.clone(),
                device_name: session.device_name.clone(),
            },
        )
        .await;
}

/// Removes a disconnected session and notifies per its role.
///
/// A master's departure is announced to everyone; no replacement is
/// elected. A non-master's departure is reported to the current master
/// only, if one exists.
async fn handle_disconnect(state: &HubState, id: SessionId) {
    let Some(removed) = state.registry.remove(id).await else {
        return;
    };
    tracing::info!(session = %id, role = %removed.role, "endpoint disconnected");

    if removed.role == Role::Master {
        state.broadcast_all(&ServerEvent::MasterDisconnected).await;
    } else if let Some(master) = state.registry.find_master().await {
        state
            .send_to(master.id, &ServerEvent::ClientDisconnected { id })
            .await;
    }
}

/// Encodes and sends an event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), String> {
    let bytes = codec::encode(event).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the hub server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(HubState::new())).await
}

/// Starts the hub server with a pre-configured [`HubState`].
///
/// Use [`HubState::with_config`] to create a state with a custom payload
/// size limit from the resolved [`crate::config::HubConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<std::net::SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    axum::extract::State(state): axum::extract::State<Arc<HubState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}
