//! FrameReady - payload of the frame-ready notification

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Image, MdaEvent};

/// Captured frame with the (possibly drift-corrected) event it answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReady {
    pub image: Image,
    pub event: MdaEvent,
    /// Uid of the sequence being run
    pub sequence_uid: Uuid,
    /// 0-based frame counter within the run
    pub frame_number: u64,
}

impl FrameReady {
    pub fn new(image: Image, event: MdaEvent, sequence_uid: Uuid, frame_number: u64) -> Self {
        Self {
            image,
            event,
            sequence_uid,
            frame_number,
        }
    }
}
