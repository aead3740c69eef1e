//! DevEngine - acquisition with simulated images
//!
//! Runs the host's event loop but takes every frame from an image generator
//! instead of the camera. The scene is stepped once per new time index.

use std::any::Any;

use contracts::{AcquisitionHost, ImageGenerator, MdaSequence, SnapParams, StagePoint};
use simulator::SceneGenerator;
use tracing::{instrument, warn};

use crate::runner::{self, enter};
use crate::{EngineError, Result, RunPhase, RunSummary, SimulatedTimeCursor};

const ENGINE: &str = "dev";

/// Particle count of the default scene
pub const DEFAULT_PARTICLES: usize = 5000;

/// Engine for developing acquisition software without a microscope
pub struct DevEngine<H> {
    host: H,
    generator: Box<dyn ImageGenerator>,
    cursor: SimulatedTimeCursor,
}

impl<H: AcquisitionHost> DevEngine<H> {
    /// Engine with a default 5000-particle scene
    pub fn new(host: H) -> Self {
        Self::with_generator(host, SceneGenerator::new(DEFAULT_PARTICLES))
    }

    pub fn with_generator(host: H, generator: impl ImageGenerator + 'static) -> Self {
        Self {
            host,
            generator: Box::new(generator),
            cursor: SimulatedTimeCursor::new(),
        }
    }

    pub fn image_generator(&self) -> &dyn ImageGenerator {
        self.generator.as_ref()
    }

    pub fn image_generator_mut(&mut self) -> &mut dyn ImageGenerator {
        self.generator.as_mut()
    }

    /// Replace the image generator
    pub fn register_image_generator(&mut self, generator: impl ImageGenerator + 'static) {
        self.generator = Box::new(generator);
    }

    /// Register a generator handed over as an untyped object (plugin boundary).
    ///
    /// Accepts a `Box<dyn ImageGenerator>` or a `SceneGenerator`. Anything else
    /// is rejected and the current generator stays active.
    pub fn try_register_image_generator(&mut self, candidate: Box<dyn Any + Send>) -> Result<()> {
        let candidate = match candidate.downcast::<Box<dyn ImageGenerator>>() {
            Ok(generator) => {
                self.generator = *generator;
                return Ok(());
            }
            Err(candidate) => candidate,
        };
        match candidate.downcast::<SceneGenerator>() {
            Ok(scene) => {
                self.generator = scene;
                Ok(())
            }
            Err(_) => {
                warn!(engine = ENGINE, "rejected incompatible image generator");
                Err(EngineError::IncompatibleGenerator)
            }
        }
    }

    pub fn cursor(&self) -> SimulatedTimeCursor {
        self.cursor
    }

    /// Reset the time cursor, then run host pre-run setup
    pub fn prepare_to_run(&mut self, sequence: &MdaSequence) -> Result<()> {
        self.cursor.reset();
        runner::prepare(&mut self.host, sequence, ENGINE)
    }

    /// Run the sequence to completion or cancellation. Blocks the calling thread.
    #[instrument(
        name = "dev_engine_run",
        skip(self, sequence),
        fields(sequence_uid = %sequence.uid(), events = sequence.len())
    )]
    pub fn run(&mut self, sequence: &MdaSequence) -> Result<RunSummary> {
        self.prepare_to_run(sequence)?;

        let Self {
            host,
            generator,
            cursor,
        } = self;

        runner::run_events(host, sequence, ENGINE, |host, event, summary| {
            enter(ENGINE, RunPhase::Prepare);
            host.prep_hardware(&event)
                .map_err(|e| EngineError::host(RunPhase::Prepare, e))?;

            enter(ENGINE, RunPhase::Capture);
            if cursor.advance(event.index.time()) {
                generator.step_positions();
                summary.scene_steps += 1;
            }

            let position = StagePoint::new(event.x_pos.unwrap_or(0.0), event.y_pos.unwrap_or(0.0));
            let params = SnapParams {
                channel: event.index.channel(),
                z: event.z_pos.unwrap_or(0.0),
                exposure_ms: event.exposure_ms.unwrap_or(0.0),
            };
            let image = generator
                .snap_img(position, params)
                .map_err(EngineError::Generator)?;

            runner::emit(host, image, &event, ENGINE, summary);
            Ok(())
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}
