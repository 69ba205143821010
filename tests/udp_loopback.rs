//! Integration tests over real UDP sockets on loopback
//!
//! 1. Ping/pong round trip between two nodes driven by hand
//! 2. A relay service answering probes and data packets until shutdown

use std::sync::Arc;
use std::time::Duration;

use flightguard_core::{unix_timestamp, DataBody, DataPacket};
use flightguard_crypto::Identity;
use flightguard_logging::init_for_tests;
use flightguard_relay::{
    AckOutcome, DatagramOutcome, ProbeOutcome, RelayConfig, RelayNode,
    RelayService, Transport, UdpTransport, MAX_DATAGRAM_SIZE,
};
use tokio::sync::oneshot;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn bind_node() -> RelayNode<UdpTransport> {
    let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    RelayNode::new(Identity::generate(), transport, RelayConfig::default())
}

/// Receive one datagram on `node` and dispatch it
async fn pump(node: &RelayNode<UdpTransport>) -> DatagramOutcome {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (len, source) = tokio::time::timeout(RECV_TIMEOUT, node.transport().recv_from(&mut buf))
        .await
        .expect("timed out waiting for a datagram")
        .unwrap();
    node.handle_datagram(&buf[..len], source).await.unwrap()
}

// =============================================================================
// 1. Ping / pong
// =============================================================================

#[tokio::test]
async fn test_ping_pong_round_trip() {
    init_for_tests();

    let a = bind_node().await;
    let b = bind_node().await;
    let a_addr = a.transport().local_addr().unwrap();
    let b_addr = b.transport().local_addr().unwrap();

    a.add_neighbor(b.aircraft_id(), b_addr);
    let ping = a.send_ping(&b.aircraft_id()).await.unwrap().unwrap();

    // B sees a ping, records A, and answers
    match pump(&b).await {
        DatagramOutcome::Probe(ProbeOutcome::PongSent { peer, pong }) => {
            assert_eq!(peer, a.aircraft_id());
            assert_eq!(pong.nonce, ping.nonce);
        }
        other => panic!("expected a pong to be sent, got {:?}", other),
    }
    assert_eq!(b.neighbor(&a.aircraft_id()).unwrap().addr, a_addr);

    // A matches the pong to its ping
    match pump(&a).await {
        DatagramOutcome::Probe(ProbeOutcome::PongMatched { peer, rtt_ms }) => {
            assert_eq!(peer, b.aircraft_id());
            assert!(rtt_ms < RECV_TIMEOUT.as_millis() as u32);
            assert_eq!(a.neighbor(&b.aircraft_id()).unwrap().rtt_ms, rtt_ms);
        }
        other => panic!("expected a matched pong, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_neighbor_reprobed_over_udp() {
    init_for_tests();

    let a = bind_node().await;
    let b = bind_node().await;
    let b_addr = b.transport().local_addr().unwrap();

    // A packet relayed by B reports a six-second flight, above the threshold
    a.add_neighbor(b.aircraft_id(), b_addr);
    let mut packet = DataPacket::originate(unix_timestamp() - 6, DataBody::default());
    packet.header.append_hop(b.aircraft_id()).unwrap();
    a.handle_packet(&mut packet, b_addr).await.unwrap();

    assert_eq!(a.monitor_latency().await.unwrap(), 1);

    // B got the ack first, then the ping
    assert!(matches!(pump(&b).await, DatagramOutcome::Ack(_)));
    assert!(matches!(
        pump(&b).await,
        DatagramOutcome::Probe(ProbeOutcome::PongSent { .. })
    ));
}

// =============================================================================
// 2. Relay service
// =============================================================================

#[tokio::test]
async fn test_service_relays_until_shutdown() {
    init_for_tests();

    let relay = Arc::new(bind_node().await);
    let relay_addr = relay.transport().local_addr().unwrap();
    let service = RelayService::new(relay.clone(), Duration::from_secs(60));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        service
            .run(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let client = bind_node().await;
    client.add_neighbor(relay.aircraft_id(), relay_addr);

    // Introduce ourselves so the relay can attribute the packet
    client.send_ping(&relay.aircraft_id()).await.unwrap();
    assert!(matches!(
        pump(&client).await,
        DatagramOutcome::Probe(ProbeOutcome::PongMatched { .. })
    ));

    let packet = DataPacket::originate(unix_timestamp(), DataBody::default());
    client
        .transport()
        .send_to(&packet.to_bytes(), relay_addr)
        .await
        .unwrap();

    match pump(&client).await {
        DatagramOutcome::Ack(outcome) => assert_eq!(outcome, AckOutcome::Verified(relay.aircraft_id())),
        other => panic!("expected an ack, got {:?}", other),
    }

    let info = relay.neighbor(&client.aircraft_id()).unwrap();
    assert_eq!(info.addr, client.transport().local_addr().unwrap());

    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(RECV_TIMEOUT, handle).await.unwrap().unwrap();
    assert!(result.is_ok());
}
