//! # Dispatcher
//!
//! 帧分发模块。
//!
//! 负责：
//! - 消费引擎发出的 `FrameReady`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞采集链路

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod sinks;
pub mod stats;

pub use contracts::{FrameReady, FrameSink};
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig, create_dispatcher,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use sinks::{FileSink, FileSinkConfig, LogSink};
pub use stats::{FrameOutcome, SinkReport, SinkStats};

#[cfg(test)]
pub(crate) fn test_frame(frame_number: u64) -> FrameReady {
    use contracts::{Image, MdaEvent};

    let image = Image::mono16(2, 2, &[100, 200, 300, 400]);
    FrameReady::new(image, MdaEvent::default(), uuid::Uuid::nil(), frame_number)
}
