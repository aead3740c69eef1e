//! LogSink - logs frame summary via tracing

use contracts::{ContractError, FrameReady, FrameSink};
use tracing::{info, instrument};

/// Sink that logs frame summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_frame_summary(&self, frame: &FrameReady) {
        let event = &frame.event;
        info!(
            sink = %self.name,
            sequence_uid = %frame.sequence_uid,
            frame_number = frame.frame_number,
            index = %event.index,
            x = ?event.x_pos,
            y = ?event.y_pos,
            z = ?event.z_pos,
            width = frame.image.width,
            height = frame.image.height,
            format = ?frame.image.format,
            mean = frame.image.mean(),
            "FrameReady received"
        );
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_number = frame.frame_number)
    )]
    async fn write(&mut self, frame: &FrameReady) -> Result<(), ContractError> {
        self.log_frame_summary(frame);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
