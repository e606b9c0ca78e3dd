use super::Transport;
use crate::error::TransportError;
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Largest body a frame header can describe.
const MAX_FRAME_LENGTH: usize = u32::MAX as usize;

/// Persistent connection to the collector's Unix domain socket.
///
/// Every payload is written as a frame: a 4-byte big-endian length followed
/// by the body. A frame of length zero with no body is a heartbeat.
#[derive(Debug)]
pub struct StreamTransport {
    path: PathBuf,
    stream: Option<UnixStream>,
    send_attempts: u32,
    heartbeat_interval: Duration,
    write_timeout: Duration,
    last_sent: Instant,
}

impl StreamTransport {
    /// Creates a closed transport for the socket at `path`. Nothing is
    /// connected until the first send.
    pub fn new(
        path: impl Into<PathBuf>,
        send_attempts: u32,
        heartbeat_interval: Duration,
        write_timeout: Duration,
    ) -> Self {
        StreamTransport {
            path: path.into(),
            stream: None,
            send_attempts: send_attempts.max(1),
            heartbeat_interval,
            write_timeout,
            last_sent: Instant::now(),
        }
    }

    /// Socket file this transport connects to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Connects unless already connected. Returns whether the transport is
    /// open afterwards.
    pub fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }

        match UnixStream::connect(&self.path) {
            Ok(stream) => {
                if !self.write_timeout.is_zero() {
                    if let Err(err) = stream.set_write_timeout(Some(self.write_timeout)) {
                        graphdat_warn!(
                            name: "StreamTransport.WriteTimeoutNotSet",
                            error = err.to_string()
                        );
                    }
                }
                graphdat_debug!(
                    name: "StreamTransport.Connected",
                    path = self.path.display().to_string()
                );
                self.stream = Some(stream);
                true
            }
            Err(err) => {
                graphdat_error!(
                    name: "StreamTransport.ConnectFailed",
                    path = self.path.display().to_string(),
                    error = err.to_string()
                );
                false
            }
        }
    }

    /// Drops the connection, if any.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            graphdat_debug!(
                name: "StreamTransport.Disconnected",
                path = self.path.display().to_string()
            );
        }
    }

    fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let length = u32::try_from(payload.len()).map_err(|_| TransportError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_LENGTH,
        })?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::NotConnected(self.path.display().to_string()))?;

        stream.write_all(&length.to_be_bytes())?;
        if !payload.is_empty() {
            stream.write_all(payload)?;
        }
        stream.flush()?;
        Ok(())
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        for attempt in 1..=self.send_attempts {
            if !self.connect() {
                self.disconnect();
                continue;
            }

            match self.write_frame(payload) {
                Ok(()) => {
                    self.last_sent = Instant::now();
                    return true;
                }
                Err(err @ TransportError::PayloadTooLarge { .. }) => {
                    graphdat_error!(name: "StreamTransport.SendFailed", error = err.to_string());
                    return false;
                }
                Err(err) => {
                    graphdat_warn!(
                        name: "StreamTransport.WriteFailed",
                        attempt = attempt,
                        error = err.to_string()
                    );
                    self.disconnect();
                }
            }
        }

        graphdat_error!(
            name: "StreamTransport.SendFailed",
            path = self.path.display().to_string(),
            attempts = self.send_attempts
        );
        false
    }

    fn heartbeat_interval(&self) -> Option<Duration> {
        Some(self.heartbeat_interval)
    }

    fn heartbeat_due_in(&self) -> Option<Duration> {
        Some(self.heartbeat_interval.saturating_sub(self.last_sent.elapsed()))
    }

    fn heartbeat(&mut self) -> bool {
        if self.last_sent.elapsed() < self.heartbeat_interval {
            return false;
        }
        graphdat_debug!(name: "StreamTransport.Heartbeat");
        self.send(&[])
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
