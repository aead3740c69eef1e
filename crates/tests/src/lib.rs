//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 引擎行为测试（记录型 fake host）
//! - 配置 → 序列 → 引擎 的跨 crate 测试
//! - DemoCore + SceneGenerator + Dispatcher 端到端测试

#[cfg(test)]
mod fakes {
    use std::sync::{Arc, Mutex};

    use contracts::{
        AcquisitionHost, ContractError, Image, ImageGenerator, MdaEvent, MdaSequence, SnapParams,
        StagePoint,
    };

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Prepare,
        Wait(usize),
        Prep(MdaEvent),
        Snap,
        Get,
        Emit(MdaEvent),
        Finish,
    }

    /// Host that records calls and cancels on request
    #[derive(Default)]
    pub struct FakeHost {
        pub calls: Vec<Call>,
        /// 0-based event whose wait reports cancellation
        pub cancel_at: Option<usize>,
        waits: usize,
    }

    impl FakeHost {
        pub fn cancelling_at(event: usize) -> Self {
            Self {
                cancel_at: Some(event),
                ..Default::default()
            }
        }

        pub fn emitted(&self) -> Vec<MdaEvent> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Emit(event) => Some(event.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn prepped(&self) -> Vec<MdaEvent> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Prep(event) => Some(event.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, wanted: &Call) -> usize {
            self.calls.iter().filter(|call| *call == wanted).count()
        }
    }

    impl AcquisitionHost for FakeHost {
        fn prepare_to_run(&mut self, _sequence: &MdaSequence) -> Result<(), ContractError> {
            self.calls.push(Call::Prepare);
            Ok(())
        }

        fn wait_until_event(&mut self, _event: &MdaEvent, _sequence: &MdaSequence) -> bool {
            let n = self.waits;
            self.waits += 1;
            self.calls.push(Call::Wait(n));
            self.cancel_at == Some(n)
        }

        fn prep_hardware(&mut self, event: &MdaEvent) -> Result<(), ContractError> {
            self.calls.push(Call::Prep(event.clone()));
            Ok(())
        }

        fn snap_image(&mut self) -> Result<(), ContractError> {
            self.calls.push(Call::Snap);
            Ok(())
        }

        fn get_image(&mut self) -> Result<Image, ContractError> {
            self.calls.push(Call::Get);
            Ok(Image::mono16(1, 1, &[42]))
        }

        fn frame_ready(&mut self, _image: Image, event: &MdaEvent) {
            self.calls.push(Call::Emit(event.clone()));
        }

        fn finish_run(&mut self, _sequence: &MdaSequence) -> Result<(), ContractError> {
            self.calls.push(Call::Finish);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct GeneratorLog {
        pub steps: usize,
        pub snaps: Vec<(StagePoint, SnapParams)>,
        pub rgb_snaps: Vec<StagePoint>,
    }

    /// Generator that renders 1x1 frames and logs what it was asked for
    pub struct ScriptedGenerator {
        log: Arc<Mutex<GeneratorLog>>,
    }

    impl ScriptedGenerator {
        pub fn new() -> (Self, Arc<Mutex<GeneratorLog>>) {
            let log = Arc::new(Mutex::new(GeneratorLog::default()));
            (
                Self {
                    log: Arc::clone(&log),
                },
                log,
            )
        }
    }

    impl ImageGenerator for ScriptedGenerator {
        fn step_positions(&mut self) {
            self.log.lock().unwrap().steps += 1;
        }

        fn snap_img(
            &mut self,
            position: StagePoint,
            params: SnapParams,
        ) -> Result<Image, ContractError> {
            self.log.lock().unwrap().snaps.push((position, params));
            Ok(Image::mono16(1, 1, &[1]))
        }

        fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError> {
            self.log.lock().unwrap().rgb_snaps.push(position);
            Ok(Image::rgb8(1, 1, vec![1, 2, 3]))
        }
    }
}

#[cfg(test)]
mod engine_tests {
    use contracts::{Axis, DriftTable, DriftVector, EventIndex, MdaEvent, MdaSequence};
    use mda_engine::{DevEngine, DriftCorrectionEngine, EngineError};

    use crate::fakes::{Call, FakeHost, ScriptedGenerator};

    fn positioned(p: usize, x: f64, y: f64) -> MdaEvent {
        MdaEvent::with_index(EventIndex::new().with(Axis::Position, p)).at(x, y)
    }

    fn timed(t: usize) -> MdaEvent {
        MdaEvent::with_index(EventIndex::new().with(Axis::Time, t))
    }

    fn five_events() -> MdaSequence {
        MdaSequence::from_events((0..5).map(|p| positioned(p, p as f64, 0.0)).collect())
    }

    #[test]
    fn test_every_event_emitted_in_order() {
        let sequence = five_events();
        let (generator, _) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(FakeHost::default(), generator);

        let summary = engine.run(&sequence).unwrap();
        let host = engine.into_host();

        assert_eq!(summary.frames_emitted, 5);
        assert_eq!(host.emitted(), sequence.events());
        assert_eq!(host.calls.first(), Some(&Call::Prepare));
        assert_eq!(host.calls.last(), Some(&Call::Finish));
    }

    #[test]
    fn test_scene_steps_once_per_new_time_index() {
        // time innermost: 0 1 2 | 0 1 2
        let events = (0..2)
            .flat_map(|p| {
                (0..3).map(move |t| {
                    MdaEvent::with_index(
                        EventIndex::new().with(Axis::Position, p).with(Axis::Time, t),
                    )
                })
            })
            .collect();
        let sequence = MdaSequence::from_events(events);
        let (generator, log) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(FakeHost::default(), generator);

        let summary = engine.run(&sequence).unwrap();

        assert_eq!(log.lock().unwrap().steps, 2);
        assert_eq!(summary.scene_steps, 2);
        assert_eq!(log.lock().unwrap().snaps.len(), 6);
    }

    #[test]
    fn test_repeated_time_index_steps_once() {
        let sequence = MdaSequence::from_events(vec![timed(0), timed(1), timed(1), timed(1)]);
        let (generator, log) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(FakeHost::default(), generator);

        engine.run(&sequence).unwrap();
        assert_eq!(log.lock().unwrap().steps, 1);
    }

    #[test]
    fn test_empty_drift_table_leaves_targets() {
        let sequence = five_events();
        let mut engine = DriftCorrectionEngine::new(FakeHost::default());

        engine.run(&sequence).unwrap();
        let host = engine.into_host();

        assert_eq!(host.prepped(), sequence.events());
        assert_eq!(host.emitted(), sequence.events());
    }

    #[test]
    fn test_drift_offset_subtracted_for_its_position() {
        let mut table = DriftTable::new();
        table.set(2, DriftVector::new(1.5, -0.5));
        let sequence =
            MdaSequence::from_events(vec![positioned(2, 10.0, 20.0), positioned(3, 10.0, 20.0)]);
        let mut engine = DriftCorrectionEngine::with_drift_table(FakeHost::default(), table);

        engine.run(&sequence).unwrap();
        // looking up position 3 does not add an entry
        assert_eq!(engine.drift_table().len(), 1);
        let host = engine.into_host();

        let prepped = host.prepped();
        assert_eq!((prepped[0].x_pos, prepped[0].y_pos), (Some(8.5), Some(20.5)));
        assert_eq!((prepped[1].x_pos, prepped[1].y_pos), (Some(10.0), Some(20.0)));
        // the emitted event is the corrected one
        assert_eq!(host.emitted(), prepped);
        // the sequence itself is untouched
        assert_eq!(sequence.events()[0].x_pos, Some(10.0));
    }

    #[test]
    fn test_non_generator_rejected_and_previous_kept() {
        let (generator, log) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(FakeHost::default(), generator);

        let err = engine
            .try_register_image_generator(Box::new("not a generator"))
            .unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleGenerator));
        assert!(err.is_configuration());

        engine
            .run(&MdaSequence::from_events(vec![timed(0), timed(1)]))
            .unwrap();
        assert_eq!(log.lock().unwrap().snaps.len(), 2);
    }

    #[test]
    fn test_boxed_generator_accepted() {
        let (old, old_log) = ScriptedGenerator::new();
        let (new, new_log) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(FakeHost::default(), old);

        let boxed: Box<dyn contracts::ImageGenerator> = Box::new(new);
        engine.try_register_image_generator(Box::new(boxed)).unwrap();
        engine.run(&MdaSequence::from_events(vec![timed(0)])).unwrap();

        assert!(old_log.lock().unwrap().snaps.is_empty());
        assert_eq!(new_log.lock().unwrap().snaps.len(), 1);
    }

    #[test]
    fn test_cancel_on_third_event() {
        let sequence = five_events();

        for cancelled_host in [
            run_dev(FakeHost::cancelling_at(2), &sequence),
            run_drift(FakeHost::cancelling_at(2), &sequence),
        ] {
            assert_eq!(cancelled_host.emitted().len(), 2);
            assert_eq!(cancelled_host.count(&Call::Finish), 1);
            assert_eq!(cancelled_host.prepped(), sequence.events()[..2].to_vec());
            assert!(!cancelled_host.calls.contains(&Call::Wait(3)));
        }
    }

    fn run_dev(host: FakeHost, sequence: &MdaSequence) -> FakeHost {
        let (generator, _) = ScriptedGenerator::new();
        let mut engine = DevEngine::with_generator(host, generator);
        let summary = engine.run(sequence).unwrap();
        assert!(summary.cancelled);
        engine.into_host()
    }

    fn run_drift(host: FakeHost, sequence: &MdaSequence) -> FakeHost {
        let mut engine = DriftCorrectionEngine::new(host);
        let summary = engine.run(sequence).unwrap();
        assert!(summary.cancelled);
        engine.into_host()
    }

    #[test]
    fn test_drift_engine_without_generator_uses_host_camera() {
        let sequence = five_events();
        let mut engine = DriftCorrectionEngine::new(FakeHost::default());
        assert!(!engine.is_simulating());

        engine.run(&sequence).unwrap();
        let host = engine.into_host();

        assert_eq!(host.count(&Call::Snap), 5);
        assert_eq!(host.count(&Call::Get), 5);
        // each snap is read out before the next event starts
        let pairs = host
            .calls
            .windows(2)
            .filter(|w| w[0] == Call::Snap && w[1] == Call::Get)
            .count();
        assert_eq!(pairs, 5);
    }

    #[test]
    fn test_drift_engine_with_generator_skips_camera() {
        let mut table = DriftTable::new();
        table.set(0, DriftVector::new(1.0, 1.0));
        let (generator, log) = ScriptedGenerator::new();
        let mut engine = DriftCorrectionEngine::with_drift_table(FakeHost::default(), table);
        engine.register_image_generator(Some(Box::new(generator)));

        engine
            .run(&MdaSequence::from_events(vec![positioned(0, 5.0, 5.0)]))
            .unwrap();
        let host = engine.into_host();

        assert_eq!(host.count(&Call::Snap), 0);
        let rgb = &log.lock().unwrap().rgb_snaps;
        assert_eq!(rgb.len(), 1);
        assert_eq!((rgb[0].x, rgb[0].y), (4.0, 4.0));
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::Axis;
    use mda_engine::DriftCorrectionEngine;

    use crate::fakes::FakeHost;

    const PLATE: &str = r#"
[sequence]
axis_order = "tpc"

[sequence.time_plan]
interval_s = 2.0
loops = 2

[[sequence.stage_positions]]
name = "A1"
x = 100.0
y = 200.0

[[sequence.stage_positions]]
name = "A2"
x = 300.0
y = 200.0

[[sequence.channels]]
config = "DAPI"
exposure_ms = 10.0

[engine]
kind = "drift_correction"
time_scale = 0.0

[[drift]]
position = 1
dx = 3.0
dy = -1.0
"#;

    #[test]
    fn test_blueprint_drives_drift_engine() {
        let blueprint = ConfigLoader::load_from_str(PLATE, ConfigFormat::Toml).unwrap();
        let sequence = blueprint.to_sequence();
        assert_eq!(sequence.len(), 4);

        let mut engine =
            DriftCorrectionEngine::with_drift_table(FakeHost::default(), blueprint.to_drift_table());
        engine.run(&sequence).unwrap();
        let emitted = engine.into_host().emitted();

        assert_eq!(emitted.len(), 4);
        for event in &emitted {
            let expected_x = match event.index.get(Axis::Position) {
                Some(1) => 297.0,
                _ => 100.0,
            };
            assert_eq!(event.x_pos, Some(expected_x));
        }
        assert_eq!(emitted[2].min_start_time, Some(2.0));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FrameReady, SinkConfig, SinkType};
    use dispatcher::create_dispatcher;
    use mda_engine::{DevEngine, DriftCorrectionEngine};
    use observability::AcquisitionMetricsAggregator;
    use simulator::{DemoCore, DemoCoreConfig, SceneGenerator};
    use tokio::sync::mpsc;

    const SMALL: &str = r#"
[sequence]
[sequence.time_plan]
interval_s = 0.5
loops = 2

[[sequence.stage_positions]]
x = 0.0
y = 0.0

[[sequence.stage_positions]]
x = 40.0
y = -40.0

[[sequence.channels]]
config = "DAPI"
exposure_ms = 5.0

[[sequence.channels]]
config = "FITC"
exposure_ms = 8.0

[engine]
time_scale = 0.0

[simulator]
n_particles = 50
width = 24
height = 16
seed = 11

[[drift]]
position = 1
dx = 2.0
dy = 2.0
"#;

    fn quiet_core(width: u32, height: u32) -> DemoCore {
        DemoCore::with_config(DemoCoreConfig {
            camera_width: width,
            camera_height: height,
            time_scale: 0.0,
            seed: Some(5),
        })
    }

    /// End-to-end: config -> DemoCore + DevEngine -> Dispatcher -> FileSink
    #[tokio::test(flavor = "multi_thread")]
    async fn test_e2e_dev_engine_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = ConfigLoader::load_from_str(SMALL, ConfigFormat::Toml).unwrap();
        let sequence = blueprint.to_sequence();
        let run_dir = dir.path().join(sequence.uid().to_string());

        let (tx, rx) = mpsc::channel::<FrameReady>(4);
        let sinks = vec![
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "disk".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 50,
                params: HashMap::from([(
                    "base_path".to_string(),
                    dir.path().to_string_lossy().into_owned(),
                )]),
            },
        ];
        let dispatcher = create_dispatcher(sinks, rx).await.unwrap().spawn();

        let mut core = quiet_core(blueprint.simulator.width, blueprint.simulator.height);
        core.on_frame_ready(Arc::new(move |frame| {
            tx.blocking_send(frame).unwrap();
        }));

        let scene = SceneGenerator::with_config(blueprint.simulator.clone());
        let summary = tokio::task::spawn_blocking(move || {
            DevEngine::with_generator(core, scene).run(&sequence)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(summary.frames_emitted, 8);

        let report = tokio::time::timeout(Duration::from_secs(5), dispatcher)
            .await
            .unwrap()
            .unwrap();
        for (name, metrics) in report {
            assert_eq!(metrics.written, 8, "sink {name}");
            assert_eq!(metrics.failed, 0, "sink {name}");
            assert_eq!(metrics.written_per_position.values().sum::<u64>(), 8);
        }

        // frame numbers are global across positions
        let p0: Vec<_> = std::fs::read_dir(run_dir.join("p0")).unwrap().collect();
        let p1: Vec<_> = std::fs::read_dir(run_dir.join("p1")).unwrap().collect();
        assert_eq!(p0.len() + p1.len(), 16);
    }

    /// DemoCore publishes the corrected event; aggregator sees the drift
    #[test]
    fn test_drift_engine_with_demo_core() {
        let blueprint = ConfigLoader::load_from_str(SMALL, ConfigFormat::Toml).unwrap();
        let drift = blueprint.to_drift_table();
        let frames = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut core = quiet_core(8, 8);
        let sink = Arc::clone(&frames);
        core.on_frame_ready(Arc::new(move |frame| sink.lock().unwrap().push(frame)));

        let mut engine = DriftCorrectionEngine::with_drift_table(core, drift.clone());
        engine.register_image_generator(Some(Box::new(SceneGenerator::with_config(
            blueprint.simulator.clone(),
        ))));
        engine.run(&blueprint.to_sequence()).unwrap();

        assert_eq!(engine.host().stage().x, 38.0);

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 8);
        let mut aggregator = AcquisitionMetricsAggregator::new();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.frame_number, i as u64);
            aggregator.update(frame, &drift);
        }
        let summary = aggregator.summary();
        assert_eq!(summary.corrected_frames, 4);
        assert_eq!(summary.frames_per_position.get(&1), Some(&4));
    }

    /// Cancel from another thread while the core waits for the next time point
    #[test]
    fn test_cancel_during_wait() {
        let mut blueprint = ConfigLoader::load_from_str(SMALL, ConfigFormat::Toml).unwrap();
        if let Some(plan) = blueprint.sequence.time_plan.as_mut() {
            plan.interval_s = 60.0;
        }

        let mut core = quiet_core(8, 8);
        core.set_time_scale(1.0);
        let cancel = core.cancel_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        });

        let mut engine = DevEngine::with_generator(
            core,
            SceneGenerator::with_config(blueprint.simulator.clone()),
        );
        let summary = engine.run(&blueprint.to_sequence()).unwrap();
        canceller.join().unwrap();

        assert!(summary.cancelled);
        // only the t=0 events (2 positions x 2 channels) ran
        assert_eq!(summary.frames_emitted, 4);
        assert_eq!(engine.host().frames_emitted(), 4);
    }
}
