//! Relay service loop
//!
//! Drives a [`RelayNode`]: every inbound datagram is dispatched in arrival
//! order and `monitor_latency` runs on a fixed interval until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use flightguard_core::Clock;

use crate::error::{RelayError, TransportError};
use crate::node::{DatagramOutcome, PacketOutcome, ProbeOutcome, RelayNode};
use crate::transport::Transport;

/// Largest datagram we will read
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

pub struct RelayService<T: Transport, C: Clock> {
    node: Arc<RelayNode<T, C>>,
    monitor_interval: Duration,
}

impl<T: Transport, C: Clock> RelayService<T, C> {
    pub fn new(node: Arc<RelayNode<T, C>>, monitor_interval: Duration) -> Self {
        Self {
            node,
            monitor_interval,
        }
    }

    pub fn node(&self) -> &Arc<RelayNode<T, C>> {
        &self.node
    }

    /// Run until `shutdown` resolves or the transport closes.
    ///
    /// Failures while handling a single datagram or a monitor pass are
    /// logged and the loop continues.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut monitor = tokio::time::interval(self.monitor_interval);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Relay service started (monitor every {:?})",
            self.monitor_interval
        );

        loop {
            tokio::select! {
                result = self.node.transport().recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => self.dispatch(&buf[..len], source).await,
                        Err(TransportError::Closed) => {
                            info!("Transport closed, stopping relay service");
                            break;
                        }
                        Err(e) => error!("Receive error: {}", e),
                    }
                }
                _ = monitor.tick() => {
                    match self.node.monitor_latency().await {
                        Ok(0) => {}
                        Ok(sent) => debug!("Pinged {} slow neighbor(s)", sent),
                        Err(e) => warn!("Latency monitor: {}", e),
                    }
                }
                _ = &mut shutdown => {
                    info!("Relay service shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, bytes: &[u8], source: std::net::SocketAddr) {
        match self.node.handle_datagram(bytes, source).await {
            Ok(DatagramOutcome::Packet(PacketOutcome::Rejected(reason)))
            | Ok(DatagramOutcome::Probe(ProbeOutcome::Rejected(reason))) => {
                debug!("Rejected datagram from {}: {:?}", source, reason);
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to handle datagram from {}: {}", source, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use flightguard_core::{DataBody, DataPacket, ManualClock};
    use flightguard_crypto::Identity;
    use tokio::sync::oneshot;

    use crate::node::RelayConfig;
    use crate::transport::MemoryTransport;

    const NOW_SECS: u64 = 1_700_000_000;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    fn test_service() -> RelayService<MemoryTransport, ManualClock> {
        let node = RelayNode::with_clock(
            Identity::generate(),
            MemoryTransport::new(addr(7400)),
            RelayConfig::default(),
            ManualClock::at_secs(NOW_SECS),
        );
        RelayService::new(Arc::new(node), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_service_acks_injected_packet() {
        let service = test_service();
        let packet = DataPacket::originate(NOW_SECS - 1, DataBody::default());
        service
            .node()
            .transport()
            .inject(packet.to_bytes(), addr(9000));
        // Garbage is logged and skipped
        service.node().transport().inject(vec![1, 2, 3], addr(9000));

        let (tx, rx) = oneshot::channel::<()>();
        let node = service.node().clone();
        let watcher = async move {
            while node.transport().sent_count() == 0 {
                tokio::task::yield_now().await;
            }
            let _ = tx.send(());
        };

        let (result, _) = tokio::join!(
            service.run(async {
                let _ = rx.await;
            }),
            watcher
        );
        assert!(result.is_ok());

        let sent = service.node().transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].dest, addr(9000));
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() {
        let service = test_service();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            service.run(std::future::ready(())),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
