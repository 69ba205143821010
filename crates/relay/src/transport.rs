//! Datagram transport
//!
//! Connectionless, best-effort delivery to a `(host, port)`. The relay
//! core sends each datagram once; retries, if any, belong to the caller.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), TransportError>;

    /// Wait for the next datagram, returning its length and source
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

// =============================================================================
// UDP
// =============================================================================

/// UDP socket transport
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind to an address such as `"0.0.0.0:7400"` or `"localhost:0"`
    pub async fn bind<A: ToSocketAddrs + std::fmt::Display>(
        addr: A,
    ) -> Result<Self, TransportError> {
        let label = addr.to_string();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: label,
                reason: e.to_string(),
            })?;
        if let Ok(local) = socket.local_addr() {
            info!("UDP transport bound to {}", local);
        }
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        let sent = self
            .socket
            .send_to(buf, dest)
            .await
            .map_err(|e| TransportError::Send {
                dest,
                reason: e.to_string(),
            })?;
        if sent != buf.len() {
            return Err(TransportError::Send {
                dest,
                reason: format!("short send: {} of {} bytes", sent, buf.len()),
            });
        }
        trace!("Sent {} bytes to {}", sent, dest);
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        let (len, addr) = self
            .socket
            .recv_from(buf)
            .await
            .map_err(|e| TransportError::Recv(e.to_string()))?;
        trace!("Received {} bytes from {}", len, addr);
        Ok((len, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(|e| TransportError::Recv(e.to_string()))
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// A datagram handed to [`MemoryTransport::send_to`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub dest: SocketAddr,
    pub bytes: Vec<u8>,
}

/// Transport that records outbound datagrams and replays injected inbound ones
pub struct MemoryTransport {
    local_addr: SocketAddr,
    sent: Mutex<Vec<SentDatagram>>,
    inbound_tx: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    fail_sends: AtomicBool,
}

impl MemoryTransport {
    pub fn new(local_addr: SocketAddr) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            local_addr,
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Queue a datagram for the next `recv_from`
    pub fn inject(&self, bytes: Vec<u8>, from: SocketAddr) {
        // The receiver lives as long as self, so this cannot fail
        let _ = self.inbound_tx.send((bytes, from));
    }

    /// Make every subsequent send fail (or succeed again)
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the sent log
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                dest,
                reason: "simulated send failure".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentDatagram {
                dest,
                bytes: buf.to_vec(),
            });
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        let (bytes, from) = self
            .inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)?;
        // Like UDP, excess bytes are discarded
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok((len, from))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_memory_transport_records_sends() {
        let transport = MemoryTransport::new(addr(1));
        transport.send_to(b"one", addr(2)).await.unwrap();
        transport.send_to(b"two", addr(3)).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].dest, addr(2));
        assert_eq!(sent[1].bytes, b"two");

        assert_eq!(transport.take_sent().len(), 2);
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_transport_fail_sends() {
        let transport = MemoryTransport::new(addr(1));
        transport.set_fail_sends(true);
        let result = transport.send_to(b"x", addr(2)).await;
        assert!(matches!(result, Err(TransportError::Send { .. })));
        assert_eq!(transport.sent_count(), 0);

        transport.set_fail_sends(false);
        assert!(transport.send_to(b"x", addr(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_transport_inject() {
        let transport = MemoryTransport::new(addr(1));
        transport.inject(b"hello".to_vec(), addr(9));

        let mut buf = [0u8; 16];
        let (len, from) = transport.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, addr(9));
        assert_eq!(transport.local_addr().unwrap(), addr(1));
    }

    #[tokio::test]
    async fn test_udp_loopback() {
        let a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
