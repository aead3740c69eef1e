//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: acquisition
//! events and sequences, images, the drift table, and the capability traits the
//! engines consume (host core, image generator) and feed (frame sinks).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Coordinate Model
//! - Stage coordinates are in stage units (µm on real hardware), f64
//! - `min_start_time` is measured in seconds from the start of a run

mod blueprint;
mod drift;
mod error;
mod event;
mod frame;
mod generator;
mod host;
mod image;
mod sequence;
mod sink;

pub use blueprint::*;
pub use drift::{DriftEntry, DriftTable, DriftVector};
pub use error::*;
pub use event::{Axis, Channel, EventIndex, MdaEvent, NO_POSITION};
pub use frame::FrameReady;
pub use generator::ImageGenerator;
pub use host::{AcquisitionHost, FrameReadyCallback};
pub use image::{Image, PixelFormat, SnapParams, StagePoint};
pub use sequence::{
    AxisOrder, MdaSequence, SequencePlan, StagePosition, TimePlan, ZPlan, MAX_SEQUENCE_EVENTS,
    MAX_Z_SLICES,
};
pub use sink::*;
