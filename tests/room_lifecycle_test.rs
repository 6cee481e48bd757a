//! Connection lifecycle against a scripted transport.

mod common;

use common::*;
use transport::{PeerId, TransportEvent};
use voice_mesh::config::DEFAULT_JOIN_ANNOUNCEMENT;
use voice_mesh::events::LinkStatus;
use voice_mesh::registry::{CallPhase, ConnectionPhase};
use voice_mesh::{Envelope, RoomError, SessionState};

#[tokio::test]
async fn test_connect_twice_registers_once() {
    let mut f = fixture("a", None);
    let b = PeerId::from("b");

    f.room.connect(&b).await;
    f.room.connect(&b).await;

    assert_eq!(f.room.registry().len(), 1);
    let dials = f
        .transport
        .wire()
        .into_iter()
        .filter(|wire| matches!(wire, Wire::Dialed { .. }))
        .count();
    assert_eq!(dials, 1);
    let appeared = f
        .handler
        .count(|event| matches!(event, Event::PeerAppeared { .. }));
    assert_eq!(appeared, 1);

    let state = f.room.registry().get(&b).unwrap();
    assert_eq!(state.connection_phase(), ConnectionPhase::Dialing);
    assert_eq!(state.call_phase(), CallPhase::Dialing);
    assert!(state.call().is_some());
}

#[tokio::test]
async fn test_connect_to_self_is_noop() {
    let mut f = fixture("a", None);
    f.room.connect(&PeerId::from("a")).await;

    assert!(f.room.registry().is_empty());
    assert!(f.transport.wire().is_empty());
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let mut f = fixture("a", None);
    let b = PeerId::from("b");
    connect_open(&mut f.room, "b").await;
    let link = link_id(&f.room, "b");
    let call = call_id(&f.room, "b");
    f.transport.clear_wire();

    assert!(f.room.cleanup(&b).await);
    assert!(!f.room.cleanup(&b).await);

    assert!(!f.room.registry().contains(&b));
    assert_eq!(f.handler.removed_count("b"), 1);
    assert_eq!(
        f.transport.wire(),
        vec![
            Wire::CallClosed {
                to: b.clone(),
                call
            },
            Wire::LinkClosed {
                to: b.clone(),
                link
            },
        ]
    );

    // Absence is not a tombstone: a later connect creates a fresh entry.
    f.room.connect(&b).await;
    assert!(f.room.registry().contains(&b));
    assert_ne!(link_id(&f.room, "b"), link);
}

#[tokio::test]
async fn test_open_link_sends_peers_then_metadata_then_greeting() {
    let mut f = fixture("a", None);
    connect_open(&mut f.room, "b").await;

    // Nothing to share with the first peer.
    assert_eq!(
        f.transport.sent_to("b"),
        vec![
            Envelope::metadata("a", "Desk microphone"),
            Envelope::chat(DEFAULT_JOIN_ANNOUNCEMENT, "a"),
        ]
    );

    connect_open(&mut f.room, "c").await;
    assert_eq!(
        f.transport.sent_to("c"),
        vec![
            Envelope::Peers { peers: ids(&["b"]) },
            Envelope::metadata("a", "Desk microphone"),
            Envelope::chat(DEFAULT_JOIN_ANNOUNCEMENT, "a"),
        ]
    );
    assert!(f.handler.events().contains(&Event::LinkStatusChanged {
        peer: PeerId::from("c"),
        status: LinkStatus::Open,
    }));
}

#[tokio::test]
async fn test_link_error_reports_notice_then_cleans_up() {
    let mut f = fixture("a", None);
    let b = PeerId::from("b");
    f.room.connect(&b).await;
    let link = link_id(&f.room, "b");
    f.handler.clear();

    f.room
        .handle_transport_event(TransportEvent::LinkError {
            peer: b.clone(),
            link,
            reason: "unreachable".to_string(),
        })
        .await;

    assert!(!f.room.registry().contains(&b));
    let events = f.handler.events();
    assert!(matches!(&events[0], Event::SystemNotice { notice } if notice.contains("unreachable")));
    assert_eq!(
        events[1..].to_vec(),
        vec![
            Event::LinkStatusChanged {
                peer: b.clone(),
                status: LinkStatus::Closed
            },
            Event::PeerRemoved { peer: b.clone() },
        ]
    );
}

#[tokio::test]
async fn test_failed_dial_leaves_no_entry() {
    let mut f = fixture("a", None);
    f.transport.set_unreachable(true);

    f.room.connect(&PeerId::from("b")).await;

    assert!(f.room.registry().is_empty());
    let notices = f
        .handler
        .count(|event| matches!(event, Event::SystemNotice { .. }));
    assert_eq!(notices, 2);
}

#[tokio::test]
async fn test_simultaneous_dial_smaller_id_keeps_own_link() {
    let mut f = fixture("a", None);
    f.room.connect(&PeerId::from("b")).await;
    let own = link_id(&f.room, "b");

    let inbound = f.transport.inbound_link("b");
    let inbound_id = inbound.id();
    f.room
        .handle_transport_event(TransportEvent::IncomingLink(inbound))
        .await;

    assert_eq!(link_id(&f.room, "b"), own);
    assert!(f.transport.wire().contains(&Wire::LinkClosed {
        to: PeerId::from("b"),
        link: inbound_id,
    }));
}

#[tokio::test]
async fn test_simultaneous_dial_larger_id_adopts_inbound_link() {
    let mut f = fixture("c", None);
    let b = PeerId::from("b");
    f.room.connect(&b).await;
    let own = link_id(&f.room, "b");

    let inbound = f.transport.inbound_link("b");
    let inbound_id = inbound.id();
    f.room
        .handle_transport_event(TransportEvent::IncomingLink(inbound))
        .await;

    assert_eq!(link_id(&f.room, "b"), inbound_id);
    assert!(f.transport.wire().contains(&Wire::LinkClosed {
        to: b.clone(),
        link: own,
    }));

    // The close of the replaced link is stale and must not tear down the entry.
    f.room
        .handle_transport_event(TransportEvent::LinkClosed {
            peer: b.clone(),
            link: own,
        })
        .await;
    assert!(f.room.registry().contains(&b));
    assert_eq!(f.handler.removed_count("b"), 0);

    open_link(&mut f.room, "b").await;
    assert!(f.room.registry().get(&b).unwrap().is_open());
}

#[tokio::test]
async fn test_taking_over_an_open_link_reports_closed_between_opens() {
    let mut f = fixture("c", None);
    let b = PeerId::from("b");
    connect_open(&mut f.room, "b").await;

    let inbound = f.transport.inbound_link("b");
    f.room
        .handle_transport_event(TransportEvent::IncomingLink(inbound))
        .await;
    assert!(!f.room.registry().get(&b).unwrap().is_open());
    open_link(&mut f.room, "b").await;

    let statuses: Vec<LinkStatus> = f
        .handler
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::LinkStatusChanged { peer, status } if peer == b => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![LinkStatus::Open, LinkStatus::Closed, LinkStatus::Open]
    );
    assert_eq!(f.handler.removed_count("b"), 0);
    assert!(f.room.registry().get(&b).unwrap().is_open());
}

#[tokio::test]
async fn test_inbound_link_from_rendezvous_is_host() {
    let mut f = fixture("n", Some("h"));
    accept_open(&mut f, "h").await;
    accept_open(&mut f, "x").await;

    let events = f.handler.events();
    assert!(events.contains(&Event::PeerAppeared {
        peer: PeerId::from("h"),
        is_host: true,
    }));
    assert!(events.contains(&Event::PeerAppeared {
        peer: PeerId::from("x"),
        is_host: false,
    }));
    assert!(!f.room.is_host());
}

#[tokio::test]
async fn test_inbound_call_is_answered_and_streams() {
    let mut f = fixture("a", None);
    let b = PeerId::from("b");
    let call = f.transport.inbound_call("b");
    let call_id = call.id();

    f.room
        .handle_transport_event(TransportEvent::IncomingCall(call))
        .await;
    assert!(f.transport.wire().contains(&Wire::Answered {
        to: b.clone(),
        call: call_id,
    }));

    // A call-only entry adopts the data link that follows.
    accept_open(&mut f, "b").await;
    assert_eq!(f.room.registry().len(), 1);

    f.room
        .handle_transport_event(TransportEvent::CallStream {
            peer: b.clone(),
            call: call_id,
        })
        .await;
    let state = f.room.registry().get(&b).unwrap();
    assert_eq!(state.call_phase(), CallPhase::Streaming);
    assert!(state.is_open());
    assert!(f
        .handler
        .events()
        .contains(&Event::PeerStreaming { peer: b.clone() }));

    f.room
        .handle_transport_event(TransportEvent::CallClosed {
            peer: b.clone(),
            call: call_id,
        })
        .await;
    assert!(!f.room.registry().contains(&b));
}

#[tokio::test]
async fn test_call_error_keeps_entry() {
    let mut f = fixture("a", None);
    let b = PeerId::from("b");
    connect_open(&mut f.room, "b").await;
    let call = call_id(&f.room, "b");

    f.room
        .handle_transport_event(TransportEvent::CallError {
            peer: b.clone(),
            call,
            reason: "ice failed".to_string(),
        })
        .await;

    assert!(f.room.registry().get(&b).unwrap().is_open());
    assert_eq!(f.handler.removed_count("b"), 0);
}

#[tokio::test]
async fn test_terminated_session_rejects_commands_and_events() {
    let mut f = fixture("a", None);
    connect_open(&mut f.room, "b").await;
    f.room.leave().await.unwrap();
    assert_eq!(f.room.session(), SessionState::Left);

    assert!(matches!(
        f.room.set_display_name("z").await,
        Err(RoomError::SessionTerminated)
    ));
    assert!(matches!(
        f.room.leave().await,
        Err(RoomError::SessionTerminated)
    ));

    f.room.connect(&PeerId::from("c")).await;
    let inbound = f.transport.inbound_link("d");
    let inbound_id = inbound.id();
    f.room
        .handle_transport_event(TransportEvent::IncomingLink(inbound))
        .await;

    assert!(f.room.registry().is_empty());
    assert!(f.transport.wire().contains(&Wire::LinkClosed {
        to: PeerId::from("d"),
        link: inbound_id,
    }));
}
