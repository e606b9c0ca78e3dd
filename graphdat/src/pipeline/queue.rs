use crate::error::Error;
use crate::sample::Sample;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{PoisonError, RwLock};

/// Messages exchanged between request threads and the sender thread.
#[derive(Debug)]
pub(crate) enum Message {
    Deliver(Sample),
    Shutdown,
}

/// Producer side of the bounded queue feeding the sender thread.
///
/// Enqueueing never blocks: when `capacity` samples are already waiting the
/// new sample is dropped and counted. Producers hold the shutdown flag for
/// read while they push, so no sample can land behind the shutdown message.
#[derive(Debug)]
pub(crate) struct SampleQueue {
    sender: SyncSender<Message>,
    capacity: usize,
    is_shutdown: RwLock<bool>,
    dropped_samples: AtomicUsize,
}

impl SampleQueue {
    pub(crate) fn new(capacity: usize) -> (Self, Receiver<Message>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = sync_channel(capacity);
        let queue = SampleQueue {
            sender,
            capacity,
            is_shutdown: RwLock::new(false),
            dropped_samples: AtomicUsize::new(0),
        };
        (queue, receiver)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        *self.is_shutdown.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Samples dropped because the queue was full or the sender thread was
    /// gone.
    pub(crate) fn dropped_samples(&self) -> usize {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    /// Offers `sample` to the sender thread. Returns `false` when it was
    /// dropped.
    pub(crate) fn enqueue(&self, sample: Sample) -> bool {
        let is_shutdown = self.is_shutdown.read().unwrap_or_else(PoisonError::into_inner);
        if *is_shutdown {
            graphdat_debug!(name: "SampleQueue.Closed", route = sample.route());
            return false;
        }

        match self.sender.try_send(Message::Deliver(sample)) {
            Ok(()) => true,
            Err(err) => {
                // Only the first drop is logged; the total is reported at shutdown.
                if self.dropped_samples.fetch_add(1, Ordering::Relaxed) == 0 {
                    let reason = match err {
                        TrySendError::Full(_) => "queue full",
                        TrySendError::Disconnected(_) => "sender thread gone",
                    };
                    graphdat_warn!(
                        name: "SampleQueue.SampleDroppingStarted",
                        reason = reason,
                        capacity = self.capacity,
                        message = "Dropped a sample. Further drops are counted silently and reported at shutdown."
                    );
                }
                false
            }
        }
    }

    /// Stops accepting samples and tells the sender thread to exit once it
    /// has drained what is already queued. Blocks while the queue is full.
    pub(crate) fn close(&self) -> Result<(), Error> {
        {
            let mut is_shutdown = self.is_shutdown.write()?;
            if *is_shutdown {
                return Err(Error::AlreadyShutdown);
            }
            *is_shutdown = true;
        }
        // every accepted sample is already in the channel ahead of this
        if self.sender.send(Message::Shutdown).is_err() {
            graphdat_warn!(name: "SampleQueue.SenderThreadGone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestInfo;
    use crate::span::SpanTree;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn sample(path: &str) -> Sample {
        SpanTree::new(RequestInfo::new("GET", "example.com", path)).compile()
    }

    #[test]
    fn test_enqueue_beyond_capacity_drops_without_blocking() {
        let (queue, receiver) = SampleQueue::new(100);
        for i in 0..100 {
            assert!(queue.enqueue(sample(&format!("/{}", i))));
        }

        let start = Instant::now();
        assert!(!queue.enqueue(sample("/overflow")));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!queue.enqueue(sample("/overflow")));
        assert_eq!(queue.dropped_samples(), 2);

        let queued: Vec<_> = receiver.try_iter().collect();
        assert_eq!(queued.len(), 100);
        assert!(matches!(&queued[0], Message::Deliver(sample) if sample.route() == "GET /0"));
        assert!(matches!(&queued[99], Message::Deliver(sample) if sample.route() == "GET /99"));
    }

    #[test]
    fn test_close_rejects_further_samples() {
        let (queue, receiver) = SampleQueue::new(4);
        assert!(queue.enqueue(sample("/before")));
        queue.close().unwrap();
        assert!(queue.is_shutdown());
        assert!(!queue.enqueue(sample("/after")));

        let queued: Vec<_> = receiver.try_iter().collect();
        assert_eq!(queued.len(), 2);
        assert!(matches!(queued[0], Message::Deliver(_)));
        assert!(matches!(queued[1], Message::Shutdown));
    }

    #[test]
    fn test_close_twice_fails() {
        let (queue, _receiver) = SampleQueue::new(1);
        queue.close().unwrap();
        assert!(matches!(queue.close(), Err(Error::AlreadyShutdown)));
    }

    #[test]
    fn test_enqueue_without_consumer_counts_drop() {
        let (queue, receiver) = SampleQueue::new(1);
        drop(receiver);
        assert!(!queue.enqueue(sample("/gone")));
        assert_eq!(queue.dropped_samples(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (queue, _receiver) = SampleQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.enqueue(sample("/one")));
        assert!(!queue.enqueue(sample("/two")));
    }

    #[test]
    fn test_concurrent_producers_never_exceed_capacity() {
        let (queue, receiver) = SampleQueue::new(16);
        let queue = Arc::new(queue);

        let producers: Vec<_> = (0..8)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    (0..50)
                        .filter(|i| queue.enqueue(sample(&format!("/{}/{}", producer, i))))
                        .count()
                })
            })
            .collect();
        let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();

        assert_eq!(accepted, 16);
        assert_eq!(accepted + queue.dropped_samples(), 8 * 50);
        assert_eq!(receiver.try_iter().count(), accepted);
    }
}
