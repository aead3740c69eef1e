//! DriftCorrectionEngine - per-position stage offset correction
//!
//! 每个事件在移动硬件之前按位置索引减去漂移量。若注册了图像生成器则
//! 使用模拟图像 (RGB)，否则使用主机相机的 snap/get。

use contracts::{AcquisitionHost, DriftTable, ImageGenerator, MdaSequence, StagePoint};
use tracing::{debug, instrument};

use crate::runner::{self, enter};
use crate::{EngineError, Result, RunPhase, RunSummary, SimulatedTimeCursor};

const ENGINE: &str = "drift_correction";

/// Engine that applies a drift table to every stage move
pub struct DriftCorrectionEngine<H> {
    host: H,
    generator: Option<Box<dyn ImageGenerator>>,
    drift_table: DriftTable,
    cursor: SimulatedTimeCursor,
}

impl<H: AcquisitionHost> DriftCorrectionEngine<H> {
    /// Engine with an empty drift table and the host camera as image source
    pub fn new(host: H) -> Self {
        Self::with_drift_table(host, DriftTable::new())
    }

    pub fn with_drift_table(host: H, drift_table: DriftTable) -> Self {
        Self {
            host,
            generator: None,
            drift_table,
            cursor: SimulatedTimeCursor::new(),
        }
    }

    /// Set (or with `None` clear) the simulated image source. Resets the time cursor.
    pub fn register_image_generator(&mut self, generator: Option<Box<dyn ImageGenerator>>) {
        self.generator = generator;
        self.cursor.reset();
    }

    pub fn image_generator(&self) -> Option<&dyn ImageGenerator> {
        self.generator.as_deref()
    }

    pub fn is_simulating(&self) -> bool {
        self.generator.is_some()
    }

    pub fn drift_table(&self) -> &DriftTable {
        &self.drift_table
    }

    pub fn drift_table_mut(&mut self) -> &mut DriftTable {
        &mut self.drift_table
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
        name = "drift_engine_run",
        skip(self, sequence),
        fields(
            sequence_uid = %sequence.uid(),
            events = sequence.len(),
            drift_entries = self.drift_table.len(),
            simulated = self.generator.is_some()
        )
    )]
    pub fn run(&mut self, sequence: &MdaSequence) -> Result<RunSummary> {
        self.prepare_to_run(sequence)?;

        let Self {
            host,
            generator,
            drift_table,
            cursor,
        } = self;

        runner::run_events(host, sequence, ENGINE, |host, event, summary| {
            let position_key = event.index.position_key();
            let offset = drift_table.offset(position_key);
            let corrected = drift_table.correct(&event);
            if !offset.is_zero() {
                debug!(
                    position = position_key,
                    dx = offset.x,
                    dy = offset.y,
                    "drift correction applied"
                );
                metrics::histogram!("mda_drift_correction_um", "axis" => "x").record(offset.x.abs());
                metrics::histogram!("mda_drift_correction_um", "axis" => "y").record(offset.y.abs());
            }

            enter(ENGINE, RunPhase::Prepare);
            host.prep_hardware(&corrected)
                .map_err(|e| EngineError::host(RunPhase::Prepare, e))?;

            enter(ENGINE, RunPhase::Capture);
            let image = match generator.as_deref_mut() {
                Some(generator) => {
                    if cursor.advance(corrected.index.time()) {
                        generator.step_positions();
                        summary.scene_steps += 1;
                    }
                    let position = StagePoint::new(
                        corrected.x_pos.unwrap_or(0.0),
                        corrected.y_pos.unwrap_or(0.0),
                    );
                    generator
                        .snap_rgb(position)
                        .map_err(EngineError::Generator)?
                }
                None => {
                    host.snap_image()
                        .map_err(|e| EngineError::host(RunPhase::Capture, e))?;
                    host.get_image()
                        .map_err(|e| EngineError::host(RunPhase::Capture, e))?
                }
            };

            runner::emit(host, image, &corrected, ENGINE, summary);
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
