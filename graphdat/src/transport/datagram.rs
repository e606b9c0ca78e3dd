use super::Transport;
use crate::error::TransportError;
use std::net::UdpSocket;

/// The max size of a datagram we want to send, large enough for any sample
/// and safely below the UDP limit.
pub(crate) const UDP_PACKET_MAX_LENGTH: usize = 65_000;

/// Sends each sample as one UDP datagram to `host:port`.
#[derive(Debug)]
pub struct DatagramTransport {
    host: String,
    port: u16,
    socket: Option<UdpSocket>,
}

impl DatagramTransport {
    /// Creates the transport. The socket is bound on first send.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        DatagramTransport {
            host: host.into(),
            port,
            socket: None,
        }
    }

    fn socket(&mut self) -> Result<&UdpSocket, TransportError> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.connect((self.host.as_str(), self.port))?;
            graphdat_debug!(
                name: "DatagramTransport.Connected",
                host = self.host.as_str(),
                port = self.port
            );
            self.socket = Some(socket);
        }
        self.socket
            .as_ref()
            .ok_or_else(|| TransportError::NotConnected(format!("{}:{}", self.host, self.port)))
    }

    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > UDP_PACKET_MAX_LENGTH {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: UDP_PACKET_MAX_LENGTH,
            });
        }
        self.socket()?.send(payload)?;
        Ok(())
    }
}

impl Transport for DatagramTransport {
    fn name(&self) -> &'static str {
        "datagram"
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        match self.send_datagram(payload) {
            Ok(()) => true,
            Err(err) => {
                graphdat_error!(
                    name: "DatagramTransport.SendFailed",
                    host = self.host.as_str(),
                    port = self.port,
                    error = err.to_string()
                );
                if matches!(err, TransportError::Io(_)) {
                    self.socket = None;
                }
                false
            }
        }
    }
}
