//! # Delivery pipeline
//!
//! Completed samples are handed to a [`DeliveryPipeline`], which queues them
//! and ships them to the collector from a dedicated sender thread. Request
//! threads never wait on the network: when the queue is full the sample is
//! dropped.
//!
//! Transports that want keep-alives get a second thread that sleeps until the
//! transport's next heartbeat is due and then pokes the transport. Both
//! threads share the transport behind one mutex, so a heartbeat frame can
//! never interleave with a sample frame.
use crate::config::Config;
use crate::error::Error;
use crate::sample::Sample;
use crate::transport::Transport;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

mod queue;

use queue::{Message, SampleQueue};

const SENDER_THREAD: &str = "graphdat-sender";
const HEARTBEAT_THREAD: &str = "graphdat-heartbeat";

type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

struct Heartbeat {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Bounded queue plus the background threads delivering its samples.
pub struct DeliveryPipeline {
    queue: SampleQueue,
    transport_name: &'static str,
    sender: Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl fmt::Debug for DeliveryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryPipeline")
            .field("transport", &self.transport_name)
            .field("capacity", &self.queue.capacity())
            .field("is_shutdown", &self.queue.is_shutdown())
            .field("dropped_samples", &self.queue.dropped_samples())
            .finish()
    }
}

impl DeliveryPipeline {
    /// Starts the sender thread and, when the transport asks for one, the
    /// heartbeat thread.
    pub fn new(config: &Config, transport: Box<dyn Transport>) -> Result<Self, Error> {
        let (queue, receiver) = SampleQueue::new(config.max_queue_size);
        let transport_name = transport.name();
        let heartbeat_interval = transport
            .heartbeat_interval()
            .filter(|interval| !interval.is_zero());
        let transport: SharedTransport = Arc::new(Mutex::new(transport));

        let message_dump = config.message_dump;
        let sender_transport = Arc::clone(&transport);
        let sender = thread::Builder::new()
            .name(SENDER_THREAD.to_string())
            .spawn(move || run_sender(receiver, sender_transport, message_dump))
            .map_err(|source| Error::ThreadSpawn {
                name: SENDER_THREAD,
                source,
            })?;

        let heartbeat = match heartbeat_interval {
            Some(interval) => Some(spawn_heartbeat(transport, interval)?),
            None => None,
        };

        graphdat_info!(
            name: "DeliveryPipeline.Started",
            transport = transport_name,
            max_queue_size = queue.capacity(),
            heartbeat_interval_ms = heartbeat_interval.map(|i| i.as_millis() as u64).unwrap_or(0)
        );

        Ok(DeliveryPipeline {
            queue,
            transport_name,
            sender: Mutex::new(Some(sender)),
            heartbeat: Mutex::new(heartbeat),
        })
    }

    /// Queues `sample` for delivery without blocking. Returns `false` when
    /// the queue is full or the pipeline was shut down, in which case the
    /// sample is dropped.
    pub fn enqueue(&self, sample: Sample) -> bool {
        self.queue.enqueue(sample)
    }

    /// Number of samples dropped because the queue was full or the sender
    /// thread was gone. Samples offered after shutdown are not counted.
    pub fn dropped_samples(&self) -> usize {
        self.queue.dropped_samples()
    }

    /// Name of the transport samples are delivered through.
    pub fn transport_name(&self) -> &'static str {
        self.transport_name
    }

    /// Whether [`shutdown`](DeliveryPipeline::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.queue.is_shutdown()
    }

    /// Stops accepting samples, waits for the sender thread to deliver what
    /// is already queued, stops the heartbeat and joins both threads.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.queue.close()?;

        let sender = self.sender.lock()?.take();
        let sender_result = match sender {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::ThreadPanicked(SENDER_THREAD)),
            None => Ok(()),
        };

        let heartbeat = self.heartbeat.lock()?.take();
        let heartbeat_result = match heartbeat {
            Some(Heartbeat { stop, handle }) => {
                let _ = stop.send(());
                handle
                    .join()
                    .map_err(|_| Error::ThreadPanicked(HEARTBEAT_THREAD))
            }
            None => Ok(()),
        };

        let dropped = self.queue.dropped_samples();
        if dropped > 0 {
            graphdat_warn!(
                name: "DeliveryPipeline.SamplesDropped",
                dropped_samples = dropped,
                max_queue_size = self.queue.capacity()
            );
        }
        graphdat_info!(name: "DeliveryPipeline.Shutdown", transport = self.transport_name);

        sender_result.and(heartbeat_result)
    }
}

fn run_sender(receiver: Receiver<Message>, transport: SharedTransport, message_dump: bool) {
    graphdat_debug!(name: "DeliveryPipeline.SenderStarted");
    // also ends when every producer is gone
    while let Ok(Message::Deliver(sample)) = receiver.recv() {
        deliver(&transport, &sample, message_dump);
    }
    graphdat_debug!(name: "DeliveryPipeline.SenderStopped");
}

fn deliver(transport: &SharedTransport, sample: &Sample, message_dump: bool) {
    let payload = match sample.encode() {
        Ok(payload) => payload,
        Err(err) => {
            graphdat_error!(
                name: "DeliveryPipeline.EncodeFailed",
                route = sample.route(),
                error = err.to_string()
            );
            return;
        }
    };

    if message_dump {
        graphdat_info!(
            name: "DeliveryPipeline.MessageDump",
            route = sample.route(),
            host = sample.host(),
            response_time_ms = sample.response_time_ms(),
            spans = sample.context().len(),
            bytes = payload.len()
        );
    }

    let sent = match transport.lock() {
        Ok(mut transport) => transport.send(&payload),
        Err(err) => {
            graphdat_error!(
                name: "DeliveryPipeline.TransportLockPoisoned",
                error = err.to_string()
            );
            false
        }
    };

    if sent {
        graphdat_debug!(
            name: "DeliveryPipeline.SampleSent",
            route = sample.route(),
            bytes = payload.len()
        );
    } else {
        graphdat_error!(name: "DeliveryPipeline.SampleLost", route = sample.route());
    }
}

fn spawn_heartbeat(transport: SharedTransport, interval: Duration) -> Result<Heartbeat, Error> {
    let (stop, stop_receiver) = mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name(HEARTBEAT_THREAD.to_string())
        .spawn(move || {
            graphdat_debug!(
                name: "DeliveryPipeline.HeartbeatStarted",
                interval_ms = interval.as_millis() as u64
            );
            let mut wait = match transport.lock() {
                Ok(transport) => next_heartbeat_wait(transport.as_ref(), interval),
                Err(_) => interval,
            };
            loop {
                match stop_receiver.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => match transport.lock() {
                        Ok(mut transport) => {
                            transport.heartbeat();
                            wait = next_heartbeat_wait(transport.as_ref(), interval);
                        }
                        Err(err) => {
                            graphdat_error!(
                                name: "DeliveryPipeline.TransportLockPoisoned",
                                error = err.to_string()
                            );
                            break;
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            graphdat_debug!(name: "DeliveryPipeline.HeartbeatStopped");
        })
        .map_err(|source| Error::ThreadSpawn {
            name: HEARTBEAT_THREAD,
            source,
        })?;

    Ok(Heartbeat { stop, handle })
}

/// How long the heartbeat thread sleeps next. A transport reporting nothing
/// due (for example right after a failed heartbeat) waits a full interval.
fn next_heartbeat_wait(transport: &dyn Transport, interval: Duration) -> Duration {
    transport
        .heartbeat_due_in()
        .filter(|due_in| !due_in.is_zero())
        .unwrap_or(interval)
}
