//! Test doubles shared by the engine unit tests

use std::sync::{Arc, Mutex};

use contracts::{
    AcquisitionHost, ContractError, Image, ImageGenerator, MdaEvent, MdaSequence, SnapParams,
    StagePoint,
};

/// Host call, in the order the engine made it
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Prepare,
    Wait(MdaEvent),
    PrepHardware(MdaEvent),
    Snap,
    GetImage,
    FrameReady(MdaEvent),
    Finish,
}

/// Host that records every call
#[derive(Default)]
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
    /// Cancel when the wait for this (0-based) event is reached
    pub cancel_at: Option<usize>,
    pub fail_prepare: bool,
    pub fail_prep_at: Option<usize>,
    pub fail_finish: bool,
    waits: usize,
    preps: usize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn emitted(&self) -> Vec<MdaEvent> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::FrameReady(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn prepped(&self) -> Vec<MdaEvent> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::PrepHardware(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }
}

impl AcquisitionHost for RecordingHost {
    fn prepare_to_run(&mut self, _sequence: &MdaSequence) -> Result<(), ContractError> {
        self.calls.push(HostCall::Prepare);
        if self.fail_prepare {
            return Err(ContractError::hardware("Core", "device not loaded"));
        }
        self.waits = 0;
        self.preps = 0;
        Ok(())
    }

    fn wait_until_event(&mut self, event: &MdaEvent, _sequence: &MdaSequence) -> bool {
        self.calls.push(HostCall::Wait(event.clone()));
        let index = self.waits;
        self.waits += 1;
        self.cancel_at == Some(index)
    }

    fn prep_hardware(&mut self, event: &MdaEvent) -> Result<(), ContractError> {
        self.calls.push(HostCall::PrepHardware(event.clone()));
        let index = self.preps;
        self.preps += 1;
        if self.fail_prep_at == Some(index) {
            return Err(ContractError::hardware("XYStage", "stage stalled"));
        }
        Ok(())
    }

    fn snap_image(&mut self) -> Result<(), ContractError> {
        self.calls.push(HostCall::Snap);
        Ok(())
    }

    fn get_image(&mut self) -> Result<Image, ContractError> {
        self.calls.push(HostCall::GetImage);
        Ok(Image::mono16(1, 1, &[42]))
    }

    fn frame_ready(&mut self, _image: Image, event: &MdaEvent) {
        self.calls.push(HostCall::FrameReady(event.clone()));
    }

    fn finish_run(&mut self, _sequence: &MdaSequence) -> Result<(), ContractError> {
        self.calls.push(HostCall::Finish);
        if self.fail_finish {
            return Err(ContractError::hardware("Core", "shutter stuck"));
        }
        Ok(())
    }
}

/// Generator call log, shared so tests can inspect it after the generator moved
#[derive(Debug, Default)]
pub struct GeneratorLog {
    pub steps: usize,
    pub snaps: Vec<(StagePoint, SnapParams)>,
    pub rgb_snaps: Vec<StagePoint>,
}

/// Generator that records calls and returns tiny images
pub struct CountingGenerator {
    pub log: Arc<Mutex<GeneratorLog>>,
    pub fail: bool,
}

impl CountingGenerator {
    pub fn new() -> (Self, Arc<Mutex<GeneratorLog>>) {
        let log = Arc::new(Mutex::new(GeneratorLog::default()));
        (
            Self {
                log: log.clone(),
                fail: false,
            },
            log,
        )
    }
}

impl ImageGenerator for CountingGenerator {
    fn step_positions(&mut self) {
        self.log.lock().unwrap().steps += 1;
    }

    fn snap_img(
        &mut self,
        position: StagePoint,
        params: SnapParams,
    ) -> Result<Image, ContractError> {
        if self.fail {
            return Err(ContractError::generator("render failed"));
        }
        self.log.lock().unwrap().snaps.push((position, params));
        Ok(Image::mono16(1, 1, &[params.channel as u16]))
    }

    fn snap_rgb(&mut self, position: StagePoint) -> Result<Image, ContractError> {
        if self.fail {
            return Err(ContractError::generator("render failed"));
        }
        self.log.lock().unwrap().rgb_snaps.push(position);
        Ok(Image::rgb8(1, 1, vec![1, 2, 3]))
    }
}
