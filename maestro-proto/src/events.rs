//! Event types exchanged between endpoints and the hub.
//!
//! Inbound events ([`ClientEvent`]) flow from an endpoint to the hub;
//! outbound events ([`ServerEvent`]) flow from the hub to one or more
//! endpoints. Both are postcard-encoded onto WebSocket binary frames via
//! [`crate::codec`]. Payload `data` is an opaque string the hub never
//! interprets beyond the non-empty check.

use serde::{Deserialize, Serialize};

use crate::session::{DeclaredRole, SessionId, SessionProfile};

/// Events an endpoint sends to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Attach a descriptive device name to this session.
    ///
    /// Metadata-only: the hub re-announces the session's identity with the
    /// name attached, but routing is unaffected.
    RegisterDevice {
        /// Human-readable device name.
        device_name: String,
    },

    /// Declare this session's role.
    ///
    /// A `Master` declaration makes this session the active master and is
    /// announced to everyone; a `Client` declaration enrolls the session
    /// with the current master, if one exists.
    SetRole {
        /// The requested role.
        role: DeclaredRole,
        /// IP the endpoint believes the master is reachable at.
        /// Informational only; never used for routing.
        master_ip: Option<String>,
        /// Descriptive device model.
        device_model: Option<String>,
    },

    /// Send an opaque payload, routed by the sender's current role.
    ///
    /// From the master this broadcasts to every other session; from
    /// anyone else it is forwarded to the current master.
    SendData {
        /// Opaque payload string. Must be non-empty after trimming.
        data: String,
        /// Optional device name for attribution at the receiving end.
        device_name: Option<String>,
    },

    /// Master-only relay: re-deliver a payload to a specific session.
    ///
    /// Honored only when the sending session's current role is `Master`.
    /// The recipient receives a `ReceiveData` attributed to `sender_id`;
    /// the master itself and the original sender are never targeted.
    ForwardData {
        /// Opaque payload string.
        data: String,
        /// The session the payload originally came from.
        sender_id: SessionId,
        /// The session to deliver to.
        recipient_id: SessionId,
        /// Optional device name for attribution.
        device_name: Option<String>,
    },
}

/// Events the hub sends to endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// First event on every connection: the identity the hub assigned.
    Welcome {
        /// This endpoint's session id.
        id: SessionId,
    },

    /// A session appeared or updated its device name.
    ///
    /// Emitted to all other sessions at connect time (no device name yet)
    /// and again after `RegisterDevice` with the name attached.
    ClientConnected {
        /// The session in question.
        id: SessionId,
        /// Transport-level remote address.
        address: String,
        /// Registered device name, once known.
        device_name: Option<String>,
    },

    /// A session declared itself master. Sent to all sessions, the new
    /// master included.
    MasterConnected {
        /// The new master's public identity.
        profile: SessionProfile,
    },

    /// Reply to a client's role declaration when a master is active.
    /// Sent to the declaring client only.
    ConnectedToMaster {
        /// The current master's public identity.
        master: SessionProfile,
        /// The client's own declared device model, echoed back.
        device_model: Option<String>,
    },

    /// An opaque payload delivered by routing.
    ///
    /// `sender_id` is `None` for master broadcasts and carries the
    /// originating session for master-directed relays.
    ReceiveData {
        /// Opaque payload string.
        data: String,
        /// Originating session, when the delivery is attributed.
        sender_id: Option<SessionId>,
        /// Originating device name, when known.
        device_name: Option<String>,
    },

    /// A client payload forwarded to the master for attribution.
    ForwardData {
        /// Opaque payload string.
        data: String,
        /// The client session that sent the payload.
        sender_id: SessionId,
        /// The sender's device name, when supplied.
        device_name: Option<String>,
    },

    /// The master's session ended. Sent to all remaining sessions; no
    /// replacement is elected automatically.
    MasterDisconnected,

    /// A non-master session ended. Sent to the current master only.
    ClientDisconnected {
        /// The session that disconnected.
        id: SessionId,
    },
}
