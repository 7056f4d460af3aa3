//! Role-based payload routing.
//!
//! Given a validated payload and the sender's session, decides the
//! destination set and forwards the payload. Routing never mutates the
//! registry, and every failure mode here is non-fatal: the payload is
//! logged and dropped, and nothing is surfaced to the sender — there is
//! no error channel back in this design.

use maestro_proto::events::ServerEvent;
use maestro_proto::session::{Role, SessionId};

use crate::hub::HubState;

/// Routes an opaque payload by the sender's current role.
///
/// From the master: a pure broadcast to every other session. From a
/// client (or a session that never declared): forwarded to the current
/// master, resolved fresh at send time; dropped irrecoverably when no
/// master is active.
pub async fn route(state: &HubState, sender_id: SessionId, data: &str, device_name: Option<&str>) {
    if data.trim().is_empty() {
        tracing::warn!(session = %sender_id, "discarding empty payload");
        return;
    }
    if data.len() > state.max_payload_size() {
        tracing::warn!(
            session = %sender_id,
            size = data.len(),
            max = state.max_payload_size(),
            "payload exceeds size limit, discarding"
        );
        return;
    }

    let Some(sender) = state.registry.get(sender_id).await else {
        tracing::warn!(session = %sender_id, "payload from unknown session");
        return;
    };

    match sender.role {
        Role::Master => {
            tracing::debug!(session = %sender_id, len = data.len(), "broadcasting master payload");
            state
                .broadcast_except(
                    sender_id,
                    &ServerEvent::ReceiveData {
                        data: data.to_string(),
                        sender_id: None,
                        device_name: None,
                    },
                )
                .await;
        }
        Role::Client | Role::Unassigned => {
            if let Some(master) = state.registry.find_master().await {
                tracing::debug!(
                    session = %sender_id,
                    master = %master.id,
                    len = data.len(),
                    "forwarding payload to master"
                );
                state
                    .send_to(
                        master.id,
                        &ServerEvent::ForwardData {
                            data: data.to_string(),
                            sender_id,
                            device_name: device_name.map(ToString::to_string),
                        },
                    )
                    .await;
            } else {
                tracing::warn!(session = %sender_id, "no master available, payload dropped");
            }
        }
    }
}

/// Relays a payload from the master to one specific session.
///
/// Honored only when the sending connection's current role is `Master`,
/// checked here at dispatch time. The recipient gets a `ReceiveData`
/// attributed to `original_sender`; the master itself and the original
/// sender are never targeted.
pub async fn relay_from_master(
    state: &HubState,
    conn_id: SessionId,
    data: &str,
    original_sender: SessionId,
    recipient_id: SessionId,
    device_name: Option<&str>,
) {
    if data.trim().is_empty() {
        tracing::warn!(session = %conn_id, "discarding empty relay payload");
        return;
    }

    let Some(sender) = state.registry.get(conn_id).await else {
        tracing::warn!(session = %conn_id, "relay from unknown session");
        return;
    };
    if sender.role != Role::Master {
        tracing::warn!(session = %conn_id, role = %sender.role, "relay from non-master, ignoring");
        return;
    }

    if recipient_id == conn_id || recipient_id == original_sender {
        tracing::debug!(recipient = %recipient_id, "relay recipient excluded, skipping");
        return;
    }
    if state.registry.get(recipient_id).await.is_none() {
        tracing::warn!(recipient = %recipient_id, "relay recipient unknown, dropping");
        return;
    }

    state
        .send_to(
            recipient_id,
            &ServerEvent::ReceiveData {
                data: data.to_string(),
                sender_id: Some(original_sender),
                device_name: device_name.map(ToString::to_string),
            },
        )
        .await;
}
