//! # Collector transports
//!
//! A [`Transport`] moves encoded samples from the sender thread to the local
//! collector. Two are provided:
//!
//! * [`StreamTransport`] writes length-prefixed frames to a Unix domain
//!   socket, reconnecting on failure and sending heartbeats while idle.
//! * [`DatagramTransport`] sends each sample as a single UDP datagram.
//!
//! Transports never surface errors. A failed send is logged and reported as
//! `false`; the sample is lost and the next send starts over.
use crate::config::{Config, Target};
use std::fmt::Debug;
use std::time::Duration;

mod datagram;
#[cfg(unix)]
mod stream;

pub use datagram::DatagramTransport;
#[cfg(unix)]
pub use stream::StreamTransport;

/// Delivers encoded samples to the collector.
///
/// The sender thread owns the only calls to [`send`](Transport::send);
/// [`heartbeat`](Transport::heartbeat) is called from the heartbeat thread
/// under the same lock, so implementations never see concurrent calls.
pub trait Transport: Send + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Delivers one payload. Returns `true` when it was handed to the socket.
    fn send(&mut self, payload: &[u8]) -> bool;

    /// Longest idle time allowed before a heartbeat is due.
    /// `None` disables the heartbeat thread.
    fn heartbeat_interval(&self) -> Option<Duration> {
        None
    }

    /// Time left until the next heartbeat is due. The heartbeat thread sleeps
    /// this long; zero means "wait a full interval".
    fn heartbeat_due_in(&self) -> Option<Duration> {
        self.heartbeat_interval()
    }

    /// Keeps an idle connection alive. Returns `true` when a heartbeat was
    /// sent.
    fn heartbeat(&mut self) -> bool {
        false
    }
}

/// Builds the transport for the configured target.
pub(crate) fn build_transport(config: &Config) -> Box<dyn Transport> {
    match &config.target {
        #[cfg(unix)]
        Target::SocketFile(path) => Box::new(StreamTransport::new(
            path.clone(),
            config.send_attempts,
            config.heartbeat_interval,
            config.write_timeout,
        )),
        Target::Udp { host, port } => Box::new(DatagramTransport::new(host.clone(), *port)),
    }
}
