//! Session registry for the hub.
//!
//! Maintains the in-memory record of every connected session: identity,
//! role, endpoint-supplied metadata, and the outbound channel used to
//! deliver events. Sessions are created at connect, mutated only through
//! the role and device-name entry points, and removed at disconnect.
//!
//! Entries are ephemeral — lost on hub restart, at which point all
//! endpoints must reconnect and re-declare roles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use maestro_proto::session::{Role, SessionId, SessionProfile};
use tokio::sync::{RwLock, mpsc};

/// Per-connection record tracking identity, role, and metadata.
#[derive(Debug, Clone)]
pub struct Session {
    /// Hub-assigned identity, stable for the connection's lifetime.
    pub id: SessionId,
    /// Current role. Starts `Unassigned`.
    pub role: Role,
    /// Device name registered by the endpoint, if any.
    pub device_name: Option<String>,
    /// Device model supplied at role declaration, if any.
    pub device_model: Option<String>,
    /// IP reported at role declaration. Informational only.
    pub master_ip: Option<String>,
    /// Transport-level remote address.
    pub addr: String,
    /// Declaration sequence stamped when this session declared master.
    /// Used only by the `find_master` tie-break.
    master_seq: Option<u64>,
}

impl Session {
    /// Creates a fresh `Unassigned` session with no metadata.
    #[must_use]
    pub const fn new(id: SessionId, addr: String) -> Self {
        Self {
            id,
            role: Role::Unassigned,
            device_name: None,
            device_model: None,
            master_ip: None,
            addr,
            master_seq: None,
        }
    }

    /// The public identity carried by role notifications.
    #[must_use]
    pub fn profile(&self) -> SessionProfile {
        SessionProfile {
            id: self.id,
            role: self.role,
            device_name: self.device_name.clone(),
            device_model: self.device_model.clone(),
            master_ip: self.master_ip.clone(),
        }
    }
}

/// A registry entry: the session record plus its outbound channel.
struct SessionEntry {
    session: Session,
    sender: mpsc::UnboundedSender<Message>,
}

/// In-memory store of all active sessions, keyed by identity.
///
/// All access is serialized behind a single [`RwLock`]; handlers take the
/// write lock for mutations and read snapshots for fan-out, which keeps
/// registry updates non-interleaved across connection tasks.
pub struct SessionRegistry {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
    /// Monotonic counter stamped onto each master declaration.
    declarations: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            declarations: AtomicU64::new(0),
        }
    }

    /// Inserts a session with its outbound channel, overwriting any entry
    /// under the same id. Idempotent.
    pub async fn insert(&self, session: Session, sender: mpsc::UnboundedSender<Message>) {
        let mut entries = self.entries.write().await;
        entries.insert(session.id, SessionEntry { session, sender });
    }

    /// Removes a session, returning the record if it existed.
    /// No-op for unknown ids.
    pub async fn remove(&self, id: SessionId) -> Option<Session> {
        let mut entries = self.entries.write().await;
        entries.remove(&id).map(|e| e.session)
    }

    /// Returns a clone of the session record, if registered.
    pub async fn get(&self, id: SessionId) -> Option<Session> {
        let entries = self.entries.read().await;
        entries.get(&id).map(|e| e.session.clone())
    }

    /// Returns a clone of the outbound sender for a session, if registered.
    pub async fn sender(&self, id: SessionId) -> Option<mpsc::UnboundedSender<Message>> {
        let entries = self.entries.read().await;
        entries.get(&id).map(|e| e.sender.clone())
    }

    /// Returns the current master, or `None`.
    ///
    /// When more than one session is tagged `Master` (a superseded master
    /// keeps its role field), the most recent declaration wins — the
    /// highest declaration sequence. The scan is O(n); the registry is not
    /// expected to exceed a small number of concurrent sessions.
    pub async fn find_master(&self) -> Option<Session> {
        let entries = self.entries.read().await;
        let masters: Vec<&Session> = entries
            .values()
            .map(|e| &e.session)
            .filter(|s| s.role == Role::Master)
            .collect();
        if masters.len() > 1 {
            tracing::warn!(
                count = masters.len(),
                "multiple sessions tagged master, selecting most recent declaration"
            );
        }
        masters.into_iter().max_by_key(|s| s.master_seq).cloned()
    }

    /// Snapshot of all sessions.
    pub async fn all(&self) -> Vec<Session> {
        let entries = self.entries.read().await;
        entries.values().map(|e| e.session.clone()).collect()
    }

    /// Snapshot of all sessions except one, for broadcast.
    pub async fn all_except(&self, excluded: SessionId) -> Vec<Session> {
        let entries = self.entries.read().await;
        entries
            .values()
            .map(|e| &e.session)
            .filter(|s| s.id != excluded)
            .cloned()
            .collect()
    }

    /// Snapshot of every session's outbound sender.
    pub async fn senders(&self) -> Vec<(SessionId, mpsc::UnboundedSender<Message>)> {
        let entries = self.entries.read().await;
        entries
            .values()
            .map(|e| (e.session.id, e.sender.clone()))
            .collect()
    }

    /// Snapshot of every outbound sender except one.
    pub async fn senders_except(
        &self,
        excluded: SessionId,
    ) -> Vec<(SessionId, mpsc::UnboundedSender<Message>)> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| e.session.id != excluded)
            .map(|e| (e.session.id, e.sender.clone()))
            .collect()
    }

    /// Marks a session as master, stamping its declaration sequence, and
    /// returns the updated record. `None` if the id is unknown.
    pub async fn mark_master(
        &self,
        id: SessionId,
        master_ip: Option<String>,
        device_model: Option<String>,
    ) -> Option<Session> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;
        entry.session.role = Role::Master;
        entry.session.master_ip = master_ip;
        entry.session.device_model = device_model;
        entry.session.master_seq = Some(self.declarations.fetch_add(1, Ordering::Relaxed));
        Some(entry.session.clone())
    }

    /// Marks a session as client and returns the updated record.
    /// `None` if the id is unknown.
    pub async fn mark_client(
        &self,
        id: SessionId,
        master_ip: Option<String>,
        device_model: Option<String>,
    ) -> Option<Session> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;
        entry.session.role = Role::Client;
        entry.session.master_ip = master_ip;
        entry.session.device_model = device_model;
        Some(entry.session.clone())
    }

    /// Attaches a device name to a session and returns the updated record.
    /// Metadata-only; role and routing are unaffected. `None` if unknown.
    pub async fn set_device_name(&self, id: SessionId, device_name: String) -> Option<Session> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;
        entry.session.device_name = Some(device_name);
        Some(entry.session.clone())
    }
}
