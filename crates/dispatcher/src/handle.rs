//! SinkHandle - one sink behind its own bounded queue and worker task
//!
//! The dispatcher only ever offers frames; a full queue drops the frame for
//! that sink alone, so a slow disk never stalls the acquisition thread.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{FrameReady, FrameSink};

use crate::stats::{FrameOutcome, SinkStats};

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<FrameReady>,
    stats: Arc<SinkStats>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker for `sink` with room for `queue_capacity` pending frames
    pub fn spawn<S: FrameSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let stats = Arc::new(SinkStats::new(&name));

        let worker = SinkWorker {
            sink,
            rx,
            stats: Arc::clone(&stats),
        };
        let worker = tokio::spawn(worker.run());

        Self {
            name,
            tx,
            stats,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &Arc<SinkStats> {
        &self.stats
    }

    /// Queue a frame without waiting. Returns false when it was dropped.
    pub fn offer(&self, frame: FrameReady) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.stats
                    .set_queue_depth(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.stats.record(&frame, FrameOutcome::Dropped);
                warn!(
                    sink = %self.name,
                    frame_number = frame.frame_number,
                    position = frame.event.index.position_key(),
                    "Queue full, frame dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                self.stats.record(&frame, FrameOutcome::Dropped);
                error!(sink = %self.name, "Sink worker gone, frame dropped");
                false
            }
        }
    }

    /// Close the queue and wait until the worker has written, flushed and
    /// closed the sink.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        let Self {
            name, tx, worker, ..
        } = self;
        drop(tx);
        if let Err(e) = worker.await {
            error!(sink = %name, error = ?e, "Sink worker panicked");
        }
    }
}

struct SinkWorker<S> {
    sink: S,
    rx: mpsc::Receiver<FrameReady>,
    stats: Arc<SinkStats>,
}

impl<S: FrameSink> SinkWorker<S> {
    #[instrument(name = "sink_worker_loop", skip(self), fields(sink = %self.sink.name()))]
    async fn run(mut self) {
        debug!("Sink worker started");
        while let Some(frame) = self.rx.recv().await {
            self.stats.set_queue_depth(self.rx.len());
            self.write(&frame).await;
        }
        self.close().await;
        debug!(
            written = self.stats.written(),
            failed = self.stats.failed(),
            "Sink worker stopped"
        );
    }

    async fn write(&mut self, frame: &FrameReady) {
        match self.sink.write(frame).await {
            Ok(()) => self.stats.record(frame, FrameOutcome::Written),
            Err(e) => {
                // one bad frame does not stop the sink
                self.stats.record(frame, FrameOutcome::Failed);
                error!(
                    frame_number = frame.frame_number,
                    index = %frame.event.index,
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "Close failed on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;
    use contracts::{Axis, ContractError, EventIndex};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Sink that remembers frame numbers, fails chosen frames and can be held
    /// closed until the test releases it
    struct ScriptedSink {
        name: String,
        written: Arc<Mutex<Vec<u64>>>,
        fail_frames: Vec<u64>,
        gate: Option<Arc<Semaphore>>,
        closed: Arc<Mutex<bool>>,
    }

    impl ScriptedSink {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                written: Arc::default(),
                fail_frames: Vec::new(),
                gate: None,
                closed: Arc::default(),
            }
        }
    }

    impl FrameSink for ScriptedSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, frame: &FrameReady) -> Result<(), ContractError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_frames.contains(&frame.frame_number) {
                return Err(ContractError::sink_write(&self.name, "disk full"));
            }
            self.written.lock().unwrap().push(frame.frame_number);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_frames_written_in_order_then_closed() {
        let sink = ScriptedSink::new("ordered");
        let written = Arc::clone(&sink.written);
        let closed = Arc::clone(&sink.closed);

        let handle = SinkHandle::spawn(sink, 10);
        for i in 0..5 {
            assert!(handle.offer(test_frame(i)));
        }
        let stats = Arc::clone(handle.stats());
        handle.shutdown().await;

        assert_eq!(*written.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(*closed.lock().unwrap());
        assert_eq!(stats.report().written, 5);
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_this_sink() {
        let gate = Arc::new(Semaphore::new(0));
        let sink = ScriptedSink {
            gate: Some(Arc::clone(&gate)),
            ..ScriptedSink::new("stalled")
        };

        let handle = SinkHandle::spawn(sink, 2);
        let accepted = (0..10).filter(|i| handle.offer(test_frame(*i))).count() as u64;

        // queue of two plus at most one frame already inside the worker
        assert!(accepted <= 3, "accepted {accepted}");
        assert_eq!(handle.stats().dropped(), 10 - accepted);

        gate.add_permits(10);
        let stats = Arc::clone(handle.stats());
        handle.shutdown().await;

        let report = stats.report();
        assert_eq!(report.written, accepted);
        assert_eq!(report.offered(), 10);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_worker() {
        let sink = ScriptedSink {
            fail_frames: vec![1],
            ..ScriptedSink::new("flaky")
        };
        let written = Arc::clone(&sink.written);

        let handle = SinkHandle::spawn(sink, 10);
        for i in 0..3 {
            let mut frame = test_frame(i);
            frame.event.index = EventIndex::new().with(Axis::Position, 1);
            handle.offer(frame);
        }
        let stats = Arc::clone(handle.stats());
        handle.shutdown().await;

        assert_eq!(*written.lock().unwrap(), vec![0, 2]);
        let report = stats.report();
        assert_eq!((report.written, report.failed), (2, 1));
        assert_eq!(report.written_per_position.get(&1), Some(&2));
    }
}
