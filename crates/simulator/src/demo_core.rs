//! DemoCore - simulated microscope host
//!
//! Implements `AcquisitionHost` without hardware: stage moves are recorded,
//! the demo camera produces noise frames, and frames are published through
//! a `FrameReadyCallback`, consistent with how a real core emits signals.

use std::thread;
use std::time::{Duration, Instant};

use contracts::{
    AcquisitionHost, Channel, ContractError, FrameReady, FrameReadyCallback, Image, MdaEvent,
    MdaSequence,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::CancelToken;

/// Longest single sleep while waiting for an event, so cancellation stays responsive
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Demo camera dark level
const CAMERA_OFFSET: f64 = 100.0;

/// Demo camera signal per millisecond of exposure
const CAMERA_GAIN: f64 = 10.0;

/// Demo core configuration
#[derive(Debug, Clone)]
pub struct DemoCoreConfig {
    /// Demo camera width
    pub camera_width: u32,
    /// Demo camera height
    pub camera_height: u32,
    /// Wall-clock factor applied to `min_start_time` (0 = never sleep)
    pub time_scale: f64,
    /// Camera noise seed
    pub seed: Option<u64>,
}

impl Default for DemoCoreConfig {
    fn default() -> Self {
        Self {
            camera_width: 512,
            camera_height: 512,
            time_scale: 1.0,
            seed: None,
        }
    }
}

/// Current stage / focus position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Simulated host core
pub struct DemoCore {
    config: DemoCoreConfig,
    stage: StageState,
    exposure_ms: f64,
    channel: Option<Channel>,
    cancel: CancelToken,
    callback: Option<FrameReadyCallback>,
    rng: StdRng,
    pending_image: Option<Image>,
    run_started: Option<Instant>,
    sequence_uid: Uuid,
    frame_number: u64,
}

impl DemoCore {
    pub fn new() -> Self {
        Self::with_config(DemoCoreConfig::default())
    }

    pub fn with_config(config: DemoCoreConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            stage: StageState::default(),
            exposure_ms: 10.0,
            channel: None,
            cancel: CancelToken::new(),
            callback: None,
            rng,
            pending_image: None,
            run_started: None,
            sequence_uid: Uuid::nil(),
            frame_number: 0,
        }
    }

    /// Register the frame-ready callback (replaces any previous one)
    pub fn on_frame_ready(&mut self, callback: FrameReadyCallback) {
        self.callback = Some(callback);
    }

    /// Token that cancels the current run when triggered
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.config.time_scale = time_scale.max(0.0);
    }

    pub fn stage(&self) -> StageState {
        self.stage
    }

    pub fn exposure_ms(&self) -> f64 {
        self.exposure_ms
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Frames published in the current (or last) run
    pub fn frames_emitted(&self) -> u64 {
        self.frame_number
    }

    /// Block until the run is cancelled
    fn wait_for_cancel(&self) -> bool {
        while !self.cancel.is_cancelled() {
            thread::sleep(WAIT_SLICE);
        }
        true
    }

    fn noise_frame(&mut self) -> Image {
        let mean = CAMERA_OFFSET + self.exposure_ms * CAMERA_GAIN;
        let sigma = mean.sqrt();
        let count = self.config.camera_width as usize * self.config.camera_height as usize;
        let pixels: Vec<u16> = (0..count)
            .map(|_| {
                let noise: f64 = self.rng.sample(StandardNormal);
                (mean + noise * sigma).round().clamp(0.0, u16::MAX as f64) as u16
            })
            .collect();
        Image::mono16(self.config.camera_width, self.config.camera_height, &pixels)
    }
}

impl Default for DemoCore {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionHost for DemoCore {
    fn prepare_to_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError> {
        self.run_started = Some(Instant::now());
        self.sequence_uid = sequence.uid();
        self.frame_number = 0;
        self.pending_image = None;
        info!(
            sequence_uid = %sequence.uid(),
            events = sequence.len(),
            "demo core ready"
        );
        Ok(())
    }

    fn wait_until_event(&mut self, event: &MdaEvent, _sequence: &MdaSequence) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }

        let (Some(start), Some(min_start)) = (self.run_started, event.min_start_time) else {
            return false;
        };
        if self.config.time_scale <= 0.0 || min_start <= 0.0 {
            return false;
        }

        let deadline = Duration::try_from_secs_f64(min_start * self.config.time_scale)
            .ok()
            .and_then(|offset| start.checked_add(offset));
        let Some(deadline) = deadline else {
            warn!(
                min_start,
                time_scale = self.config.time_scale,
                "start time out of range, waiting for cancel"
            );
            return self.wait_for_cancel();
        };
        loop {
            if self.cancel.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }

    fn prep_hardware(&mut self, event: &MdaEvent) -> Result<(), ContractError> {
        for (axis, value) in [("x", event.x_pos), ("y", event.y_pos), ("z", event.z_pos)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ContractError::hardware(
                    "DemoStage",
                    format!("non-finite {axis} target"),
                ));
            }
        }

        if let Some(x) = event.x_pos {
            self.stage.x = x;
        }
        if let Some(y) = event.y_pos {
            self.stage.y = y;
        }
        if let Some(z) = event.z_pos {
            self.stage.z = z;
        }
        if let Some(channel) = &event.channel {
            self.channel = Some(channel.clone());
            if let Some(exposure) = channel.exposure_ms {
                self.exposure_ms = exposure;
            }
        }
        if let Some(exposure) = event.exposure_ms {
            self.exposure_ms = exposure;
        }

        trace!(
            x = self.stage.x,
            y = self.stage.y,
            z = self.stage.z,
            exposure_ms = self.exposure_ms,
            "hardware prepared"
        );
        Ok(())
    }

    fn snap_image(&mut self) -> Result<(), ContractError> {
        if self.config.camera_width == 0 || self.config.camera_height == 0 {
            return Err(ContractError::camera("demo camera has zero-sized sensor"));
        }
        let image = self.noise_frame();
        self.pending_image = Some(image);
        Ok(())
    }

    fn get_image(&mut self) -> Result<Image, ContractError> {
        self.pending_image
            .take()
            .ok_or_else(|| ContractError::camera("get_image called before snap_image"))
    }

    fn frame_ready(&mut self, image: Image, event: &MdaEvent) {
        let frame = FrameReady::new(image, event.clone(), self.sequence_uid, self.frame_number);
        self.frame_number += 1;
        match &self.callback {
            Some(callback) => callback(frame),
            None => debug!(frame_number = frame.frame_number, "frame ready (no listener)"),
        }
    }

    fn finish_run(&mut self, sequence: &MdaSequence) -> Result<(), ContractError> {
        let elapsed = self
            .run_started
            .take()
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or_default();
        info!(
            sequence_uid = %sequence.uid(),
            frames = self.frame_number,
            elapsed_s = elapsed,
            "demo core finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Axis, EventIndex};
    use std::sync::{Arc, Mutex};

    fn core() -> DemoCore {
        DemoCore::with_config(DemoCoreConfig {
            camera_width: 8,
            camera_height: 8,
            time_scale: 0.0,
            seed: Some(3),
        })
    }

    #[test]
    fn test_prep_hardware_keeps_absent_axes() {
        let mut core = core();
        core.prep_hardware(&MdaEvent::default().at(5.0, 6.0)).unwrap();
        let mut event = MdaEvent::default();
        event.x_pos = Some(1.0);
        event.z_pos = Some(2.0);
        event.exposure_ms = Some(25.0);
        core.prep_hardware(&event).unwrap();

        assert_eq!(core.stage(), StageState { x: 1.0, y: 6.0, z: 2.0 });
        assert_eq!(core.exposure_ms(), 25.0);
    }

    #[test]
    fn test_prep_hardware_rejects_nan() {
        let mut core = core();
        let event = MdaEvent::default().at(f64::NAN, 0.0);
        assert!(matches!(
            core.prep_hardware(&event),
            Err(ContractError::Hardware { .. })
        ));
    }

    #[test]
    fn test_get_image_requires_snap() {
        let mut core = core();
        assert!(core.get_image().is_err());
        core.snap_image().unwrap();
        let image = core.get_image().unwrap();
        assert_eq!(image.pixel_count(), 64);
        assert!(core.get_image().is_err());
    }

    #[test]
    fn test_exposure_raises_camera_mean() {
        let mut core = core();
        core.exposure_ms = 1.0;
        core.snap_image().unwrap();
        let dim = core.get_image().unwrap().mean();
        core.exposure_ms = 100.0;
        core.snap_image().unwrap();
        let bright = core.get_image().unwrap().mean();
        assert!(bright > dim);
    }

    #[test]
    fn test_frame_ready_numbers_frames_per_run() {
        let mut core = core();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        core.on_frame_ready(Arc::new(move |frame: FrameReady| {
            sink.lock().unwrap().push(frame.frame_number);
        }));

        let sequence = MdaSequence::from_events(vec![MdaEvent::default()]);
        for _ in 0..2 {
            core.prepare_to_run(&sequence).unwrap();
            core.frame_ready(Image::mono16(1, 1, &[0]), &MdaEvent::default());
            core.frame_ready(Image::mono16(1, 1, &[0]), &MdaEvent::default());
            core.finish_run(&sequence).unwrap();
        }

        assert_eq!(*received.lock().unwrap(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_wait_reports_cancellation() {
        let mut core = core();
        let sequence = MdaSequence::from_events(vec![MdaEvent::default()]);
        core.prepare_to_run(&sequence).unwrap();

        let event = MdaEvent::with_index(EventIndex::new().with(Axis::Time, 0));
        assert!(!core.wait_until_event(&event, &sequence));

        core.cancel_token().cancel();
        assert!(core.wait_until_event(&event, &sequence));
    }

    #[test]
    fn test_unreachable_start_time_waits_for_cancel() {
        let mut core = core();
        core.set_time_scale(1.0);
        let sequence = MdaSequence::from_events(vec![MdaEvent::default()]);
        core.prepare_to_run(&sequence).unwrap();

        let cancel = core.cancel_token();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            cancel.cancel();
        });

        let event = MdaEvent {
            min_start_time: Some(1e20),
            ..MdaEvent::default()
        };
        assert!(core.wait_until_event(&event, &sequence));
        canceller.join().unwrap();
    }

    #[test]
    fn test_wait_sleeps_until_min_start_time() {
        let mut core = core();
        core.set_time_scale(1.0);
        let sequence = MdaSequence::from_events(vec![MdaEvent::default()]);
        core.prepare_to_run(&sequence).unwrap();

        let event = MdaEvent {
            min_start_time: Some(0.05),
            ..MdaEvent::default()
        };
        let start = Instant::now();
        assert!(!core.wait_until_event(&event, &sequence));
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
