//! Session identity and role types shared between the hub and endpoints.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identity of a connected endpoint, assigned by the hub when the
/// connection is accepted. Based on UUID v7 so ids sort by connect time.
///
/// An id is stable for the lifetime of its connection and never reused:
/// a reconnecting endpoint receives a brand-new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new session identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `SessionId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a session in the hub's routing topology.
///
/// A session starts `Unassigned` and moves at most once to `Master` or
/// `Client`. There is no demotion path; a later master declaration by
/// another session supersedes without touching the old role field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Connected but has not declared a role yet.
    Unassigned,
    /// The controlling endpoint: broadcasts to all, receives targeted sends.
    Master,
    /// A peer endpoint: sends to the master, receives master broadcasts.
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "unassigned"),
            Self::Master => write!(f, "master"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Role an endpoint may request in a `SetRole` declaration.
///
/// `Unassigned` is the connect-time default, not something an endpoint
/// can ask for, so it is absent here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredRole {
    /// Declare this session the active master.
    Master,
    /// Enroll this session as a client of the current master.
    Client,
}

impl From<DeclaredRole> for Role {
    fn from(declared: DeclaredRole) -> Self {
        match declared {
            DeclaredRole::Master => Self::Master,
            DeclaredRole::Client => Self::Client,
        }
    }
}

/// Public identity of a session as carried by role notifications.
///
/// All metadata is endpoint-supplied and unvalidated; `master_ip` is
/// informational only and never used for routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Hub-assigned identity.
    pub id: SessionId,
    /// Current role.
    pub role: Role,
    /// Descriptive device name, if the endpoint registered one.
    pub device_name: Option<String>,
    /// Descriptive device model from the role declaration.
    pub device_model: Option<String>,
    /// IP the endpoint reported during role declaration.
    pub master_ip: Option<String>,
}
