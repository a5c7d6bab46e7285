//! UDP endpoint
//!
//! Owns the socket and enforces the datagram size ceiling. Readiness
//! multiplexing is left to the tokio reactor.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

use super::NetworkConfig;
use crate::crypto::{sign_packet, verify_packet, CryptoError, Signer};
use crate::protocol::{CodecError, EncodeOptions, Opcode, Packet};

/// Endpoint errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Signature error: {0}")]
    Signature(#[from] CryptoError),

    #[error("Packet too large: {0} bytes (max: {1})")]
    PacketTooLarge(usize, usize),

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Send/receive counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndpointStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_rejected: u64,
}

/// A bound UDP socket speaking the 2ping wire format
pub struct Endpoint {
    socket: UdpSocket,
    config: NetworkConfig,
    encode_options: EncodeOptions,
    signer: Option<Arc<dyn Signer>>,
    recv_buf: Vec<u8>,
    stats: EndpointStats,
}

impl Endpoint {
    /// Bind to the configured address
    pub async fn bind(config: NetworkConfig) -> NetworkResult<Self> {
        let bind_addr = config.bind_addr();
        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            NetworkError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        tracing::info!("Listening on {}", socket.local_addr()?);

        // One spare byte so oversized datagrams can be told apart
        let recv_buf = vec![0u8; config.max_packet_size + 1];
        Ok(Self {
            socket,
            config,
            encode_options: EncodeOptions::default(),
            signer: None,
            recv_buf,
            stats: EndpointStats::default(),
        })
    }

    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode_options = options;
        self
    }

    /// Sign outgoing packets and require valid digests on incoming ones
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn local_addr(&self) -> NetworkResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn stats(&self) -> &EndpointStats {
        &self.stats
    }

    /// Encode, sign if configured, and send a packet.
    ///
    /// With a signer set, a packet without an HMAC opcode gets one added
    /// so that it is always signed.
    pub async fn send(&mut self, packet: &Packet, addr: SocketAddr) -> NetworkResult<usize> {
        let mut encoded = match &self.signer {
            Some(_) if !packet.opcodes.contains(Opcode::HMAC) => {
                let mut signed = packet.clone();
                signed.opcodes.insert(Opcode::HMAC, Opcode::hmac());
                signed.dump_with(&self.encode_options)?
            }
            _ => packet.dump_with(&self.encode_options)?,
        };
        if let Some(signer) = &self.signer {
            sign_packet(&mut encoded, signer.as_ref())?;
        }

        if encoded.bytes.len() > self.config.max_packet_size {
            return Err(NetworkError::PacketTooLarge(
                encoded.bytes.len(),
                self.config.max_packet_size,
            ));
        }

        let sent = self.socket.send_to(&encoded.bytes, addr).await?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += sent as u64;
        tracing::debug!("Sent {} bytes to {}: message {}", sent, addr, packet.message_id);
        Ok(sent)
    }

    /// Wait for one packet using the configured timeout
    pub async fn recv(&mut self) -> NetworkResult<Option<(Packet, SocketAddr)>> {
        let timeout = self.config.recv_timeout();
        self.recv_timeout(timeout).await
    }

    /// Wait up to `timeout` for one packet.
    ///
    /// Returns `Ok(None)` when nothing arrived in time or the wait was
    /// interrupted.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> NetworkResult<Option<(Packet, SocketAddr)>> {
        let (len, addr) = match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.recv_buf)).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Ok(result) => result?,
        };
        self.stats.bytes_received += len as u64;

        match self.accept(len) {
            Ok(packet) => {
                self.stats.packets_received += 1;
                tracing::debug!("Received {} bytes from {}: message {}", len, addr, packet.message_id);
                Ok(Some((packet, addr)))
            }
            Err(e) => {
                self.stats.packets_rejected += 1;
                tracing::warn!("Rejected {} bytes from {}: {}", len, addr, e);
                Err(e)
            }
        }
    }

    fn accept(&self, len: usize) -> NetworkResult<Packet> {
        if len > self.config.max_packet_size {
            return Err(NetworkError::PacketTooLarge(len, self.config.max_packet_size));
        }

        let data = &self.recv_buf[..len];
        let packet = Packet::load(data)?;
        if let Some(signer) = &self.signer {
            verify_packet(data, signer.as_ref())?;
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HmacSigner;
    use crate::protocol::MessageId;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback_config() -> NetworkConfig {
        NetworkConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_packet_size: 128,
            recv_timeout_ms: 2000,
        }
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let mut a = Endpoint::bind(loopback_config()).await.unwrap();
        let mut b = Endpoint::bind(loopback_config()).await.unwrap();

        let mut packet = Packet::new(MessageId::new([0, 0, 0, 0, 0xa0, 0x01]));
        packet.insert(Opcode::ReplyRequested).unwrap();

        let sent = a.send(&packet, b.local_addr().unwrap()).await.unwrap();
        assert_eq!(sent, 14);

        let (received, from) = b.recv().await.unwrap().unwrap();
        assert_eq!(received, packet);
        assert_eq!(from, a.local_addr().unwrap());
        assert_eq!(b.stats().packets_received, 1);
        assert_eq!(a.stats().bytes_sent, 14);
    }

    #[tokio::test]
    async fn test_recv_timeout_is_not_an_error() {
        let mut endpoint = Endpoint::bind(loopback_config()).await.unwrap();
        let result = endpoint.recv_timeout(Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_oversized_send_rejected() {
        let mut endpoint = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_encode_options(EncodeOptions {
                min_length: 200,
                padding_pattern: vec![0],
            });
        let target = endpoint.local_addr().unwrap();
        let err = endpoint.send(&Packet::default(), target).await.unwrap_err();
        assert!(matches!(err, NetworkError::PacketTooLarge(200, 128)));
    }

    #[tokio::test]
    async fn test_garbage_datagram_rejected() {
        let mut endpoint = Endpoint::bind(loopback_config()).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"definitely not 2ping", endpoint.local_addr().unwrap())
            .await
            .unwrap();

        let err = endpoint.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::Protocol(CodecError::InvalidMagic(_))));
        assert_eq!(endpoint.stats().packets_rejected, 1);
    }

    #[tokio::test]
    async fn test_signed_exchange() {
        let signer: Arc<dyn Signer> = Arc::new(HmacSigner::new(b"shared").unwrap());
        let mut a = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_signer(signer.clone());
        let mut b = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_signer(signer);

        let mut packet = Packet::new(MessageId::random());
        packet.insert(Opcode::hmac()).unwrap();
        a.send(&packet, b.local_addr().unwrap()).await.unwrap();

        let (received, _) = b.recv().await.unwrap().unwrap();
        assert_eq!(received.message_id, packet.message_id);
    }

    #[tokio::test]
    async fn test_signing_endpoint_adds_hmac_opcode() {
        let signer: Arc<dyn Signer> = Arc::new(HmacSigner::new(b"shared").unwrap());
        let mut a = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_signer(signer.clone());
        let mut b = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_signer(signer);

        let mut packet = Packet::new(MessageId::random());
        packet.insert(Opcode::ReplyRequested).unwrap();
        let sent = a.send(&packet, b.local_addr().unwrap()).await.unwrap();
        // 14 bytes plus the HMAC segment (length, digest length, digest)
        assert_eq!(sent, 14 + 2 + 6);

        let (received, _) = b.recv().await.unwrap().unwrap();
        assert!(received.reply_requested());
        assert!(received.opcodes.contains(Opcode::HMAC));
        assert_eq!(b.stats().packets_rejected, 0);
    }

    #[tokio::test]
    async fn test_unsigned_packet_rejected_by_signing_endpoint() {
        let mut a = Endpoint::bind(loopback_config()).await.unwrap();
        let mut b = Endpoint::bind(loopback_config())
            .await
            .unwrap()
            .with_signer(Arc::new(HmacSigner::new(b"shared").unwrap()));

        a.send(&Packet::new(MessageId::random()), b.local_addr().unwrap())
            .await
            .unwrap();

        let err = b.recv().await.unwrap_err();
        assert!(matches!(err, NetworkError::Signature(CryptoError::NoHmacRegion)));
    }
}
