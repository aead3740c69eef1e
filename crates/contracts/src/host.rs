//! AcquisitionHost trait - host core capabilities consumed by the engines
//!
//! The host owns hardware access, pacing and cancellation, and delivery of
//! frame-ready notifications. Engines only decide what to capture and where.

use std::sync::Arc;

use crate::{ContractError, FrameReady, Image, MdaEvent, MdaSequence};

/// Frame-ready callback type
///
/// Hosts that publish frames through a callback store one of these.
/// Uses `Arc` to allow callback sharing across threads.
pub type FrameReadyCallback = Arc<dyn Fn(FrameReady) + Send + Sync>;

/// Host acquisition core
///
/// Abstracts a real microscope core and the simulated demo core.
/// Engines drive it from a single thread, one event at a time.
///
/// # Call Order (per run)
///
/// 1. `prepare_to_run` once
/// 2. per event: `wait_until_event`, then (unless cancelled) `prep_hardware`,
///    image acquisition and `frame_ready`
/// 3. `finish_run` once, also after cancellation or failure
pub trait AcquisitionHost: Send {
    /// Pre-run setup
    fn prepare_to_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError>;

    /// Block until the event may start.
    ///
    /// Returns `true` if the run was cancelled while waiting.
    fn wait_until_event(&mut self, event: &MdaEvent, sequence: &MdaSequence) -> bool;

    /// Move stage / focus and apply channel and exposure for the event
    fn prep_hardware(&mut self, event: &MdaEvent) -> Result<(), ContractError>;

    /// Trigger a real camera exposure
    fn snap_image(&mut self) -> Result<(), ContractError>;

    /// Read out the image of the last `snap_image`
    fn get_image(&mut self) -> Result<Image, ContractError>;

    /// Publish a captured frame together with the event it belongs to
    fn frame_ready(&mut self, image: Image, event: &MdaEvent);

    /// Post-run teardown
    fn finish_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError>;
}

impl<H: AcquisitionHost + ?Sized> AcquisitionHost for Box<H> {
    fn prepare_to_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError> {
        (**self).prepare_to_run(sequence)
    }

    fn wait_until_event(&mut self, event: &MdaEvent, sequence: &MdaSequence) -> bool {
        (**self).wait_until_event(event, sequence)
    }

    fn prep_hardware(&mut self, event: &MdaEvent) -> Result<(), ContractError> {
        (**self).prep_hardware(event)
    }

    fn snap_image(&mut self) -> Result<(), ContractError> {
        (**self).snap_image()
    }

    fn get_image(&mut self) -> Result<Image, ContractError> {
        (**self).get_image()
    }

    fn frame_ready(&mut self, image: Image, event: &MdaEvent) {
        (**self).frame_ready(image, event)
    }

    fn finish_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError> {
        (**self).finish_run(sequence)
    }
}
