// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for session lifecycle handling.
//!
//! Covers the connect and disconnect paths of the hub:
//! - Every connection is welcomed with its hub-assigned identity.
//! - New identities are announced to existing sessions.
//! - Device registration re-announces the identity with the name attached.
//! - A master's departure is announced to every remaining session.
//! - A client's departure is reported to the current master only.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use maestro_hub::hub;
use maestro_proto::codec;
use maestro_proto::events::{ClientEvent, ServerEvent};
use maestro_proto::session::{DeclaredRole, SessionId};
use tokio_tungstenite::tungstenite;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: std::net::SocketAddr) -> (WsStream, SessionId) {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    match recv_event(&mut ws).await {
        ServerEvent::Welcome { id } => (ws, id),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

async fn send_event(ws: &mut WsStream, event: &ClientEvent) {
    let bytes = codec::encode(event).unwrap();
    ws.send(tungstenite::Message::Binary(bytes.into()))
        .await
        .unwrap();
}

async fn recv_event(ws: &mut WsStream) -> ServerEvent {
    let msg = ws.next().await.unwrap().unwrap();
    codec::decode(&msg.into_data()).unwrap()
}

async fn assert_silent(ws: &mut WsStream) {
    let res = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(res.is_err(), "expected no event, got {res:?}");
}

fn set_role(role: DeclaredRole) -> ClientEvent {
    ClientEvent::SetRole {
        role,
        master_ip: None,
        device_model: None,
    }
}

#[tokio::test]
async fn welcome_is_the_first_event() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{addr}/ws");

    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let first = ws.next().await.unwrap().unwrap();
    match codec::decode::<ServerEvent>(&first.into_data()).unwrap() {
        ServerEvent::Welcome { .. } => {}
        other => panic!("expected Welcome first, got {other:?}"),
    }
}

#[tokio::test]
async fn new_connection_announced_to_existing_sessions() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut a, _a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;

    match recv_event(&mut a).await {
        ServerEvent::ClientConnected {
            id,
            address,
            device_name,
        } => {
            assert_eq!(id, b_id);
            assert!(!address.is_empty());
            assert!(device_name.is_none());
        }
        other => panic!("expected ClientConnected, got {other:?}"),
    }
    // The new session itself is not told about its own arrival.
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn register_device_rebroadcasts_identity_with_name() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut a, _a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;
    let _ = recv_event(&mut a).await; // ClientConnected b

    send_event(
        &mut b,
        &ClientEvent::RegisterDevice {
            device_name: "Tablet".into(),
        },
    )
    .await;

    match recv_event(&mut a).await {
        ServerEvent::ClientConnected {
            id, device_name, ..
        } => {
            assert_eq!(id, b_id);
            assert_eq!(device_name.as_deref(), Some("Tablet"));
        }
        other => panic!("expected ClientConnected, got {other:?}"),
    }
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn master_disconnect_notifies_every_remaining_session() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut m, _m_id) = connect(addr).await;
    send_event(&mut m, &set_role(DeclaredRole::Master)).await;
    let _ = recv_event(&mut m).await; // MasterConnected

    let (mut c1, _c1_id) = connect(addr).await;
    let _ = recv_event(&mut m).await;
    let (mut c2, _c2_id) = connect(addr).await;
    let _ = recv_event(&mut m).await;
    let _ = recv_event(&mut c1).await;

    send_event(&mut c1, &set_role(DeclaredRole::Client)).await;
    let _ = recv_event(&mut c1).await;
    send_event(&mut c2, &set_role(DeclaredRole::Client)).await;
    let _ = recv_event(&mut c2).await;

    drop(m);

    for ws in [&mut c1, &mut c2] {
        match recv_event(ws).await {
            ServerEvent::MasterDisconnected => {}
            other => panic!("expected MasterDisconnected, got {other:?}"),
        }
        assert_silent(ws).await;
    }
}

#[tokio::test]
async fn client_disconnect_notifies_master_only() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut m, _m_id) = connect(addr).await;
    send_event(&mut m, &set_role(DeclaredRole::Master)).await;
    let _ = recv_event(&mut m).await;

    let (mut c1, c1_id) = connect(addr).await;
    let _ = recv_event(&mut m).await;
    let (mut c2, _c2_id) = connect(addr).await;
    let _ = recv_event(&mut m).await;
    let _ = recv_event(&mut c1).await;

    send_event(&mut c1, &set_role(DeclaredRole::Client)).await;
    let _ = recv_event(&mut c1).await;
    send_event(&mut c2, &set_role(DeclaredRole::Client)).await;
    let _ = recv_event(&mut c2).await;

    drop(c1);

    match recv_event(&mut m).await {
        ServerEvent::ClientDisconnected { id } => assert_eq!(id, c1_id),
        other => panic!("expected ClientDisconnected, got {other:?}"),
    }
    assert_silent(&mut m).await;
    assert_silent(&mut c2).await;
}

#[tokio::test]
async fn disconnect_without_master_notifies_nobody() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut a, _a_id) = connect(addr).await;
    let (b, _b_id) = connect(addr).await;
    let _ = recv_event(&mut a).await; // ClientConnected b

    drop(b);

    assert_silent(&mut a).await;
}

#[tokio::test]
async fn unassigned_disconnect_reported_to_master() {
    let (addr, _handle) = hub::start_server("127.0.0.1:0").await.unwrap();

    let (mut m, _m_id) = connect(addr).await;
    send_event(&mut m, &set_role(DeclaredRole::Master)).await;
    let _ = recv_event(&mut m).await;

    // u connects and leaves without ever declaring a role.
    let (u, u_id) = connect(addr).await;
    let _ = recv_event(&mut m).await; // ClientConnected u

    drop(u);

    match recv_event(&mut m).await {
        ServerEvent::ClientDisconnected { id } => assert_eq!(id, u_id),
        other => panic!("expected ClientDisconnected, got {other:?}"),
    }
}
