//! Role declaration handling.
//!
//! Processes `SetRole` events: stamps the session's role and metadata in
//! the registry and emits the matching notifications. A master
//! declaration is announced to everyone; a client declaration is answered
//! only to the declaring session, and only when a master is active.

use maestro_proto::events::ServerEvent;
use maestro_proto::session::{DeclaredRole, SessionId};

use crate::hub::HubState;

/// Applies a role declaration from a session.
///
/// Unknown ids (a race with teardown) are logged and ignored.
pub async fn declare_role(
    state: &HubState,
    id: SessionId,
    declared: DeclaredRole,
    master_ip: Option<String>,
    device_model: Option<String>,
) {
    match declared {
        DeclaredRole::Master => promote_master(state, id, master_ip, device_model).await,
        DeclaredRole::Client => enroll_client(state, id, master_ip, device_model).await,
    }
}

/// Makes a session the active master and announces it to all sessions,
/// the new master included.
///
/// Any previously active master is superseded implicitly: it keeps its
/// role field, and `find_master`'s last-declared-wins rule keeps routing
/// unambiguous. Supersession usually indicates a stale or buggy
/// controller, so it is logged as a warning.
async fn promote_master(
    state: &HubState,
    id: SessionId,
    master_ip: Option<String>,
    device_model: Option<String>,
) {
    if let Some(previous) = state.registry.find_master().await
        && previous.id != id
    {
        tracing::warn!(
            previous = %previous.id,
            new = %id,
            "master declaration supersedes an active master"
        );
    }

    let Some(session) = state.registry.mark_master(id, master_ip, device_model).await else {
        tracing::warn!(session = %id, "role declaration from unknown session");
        return;
    };

    tracing::info!(session = %id, "session declared master");
    state
        .broadcast_all(&ServerEvent::MasterConnected {
            profile: session.profile(),
        })
        .await;
}

/// Enrolls a session as a client of the current master.
///
/// The client's notion of "the master" stays lazy: nothing is cached
/// here, and routing re-resolves the master at every send. If no master
/// is active the client receives nothing and learns of one only from a
/// later `MasterConnected` broadcast.
async fn enroll_client(
    state: &HubState,
    id: SessionId,
    master_ip: Option<String>,
    device_model: Option<String>,
) {
    let Some(session) = state.registry.mark_client(id, master_ip, device_model).await else {
        tracing::warn!(session = %id, "role declaration from unknown session");
        return;
    };

    tracing::info!(session = %id, "session declared client");
    if let Some(master) = state.registry.find_master().await {
        state
            .send_to(
                id,
                &ServerEvent::ConnectedToMaster {
                    master: master.profile(),
                    device_model: session.device_model.clone(),
                },
            )
            .await;
    } else {
        tracing::info!(session = %id, "no master available for client");
    }
}
