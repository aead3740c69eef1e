//! FileSink - writes frames to disk with folder structure
//!
//! Layout: `<base_path>/<sequence_uid>/p<position>/<frame_number>.png` plus a
//! JSON sidecar with the event. Events without a position dimension go to
//! `p_none/`. Frame numbers restart every run, so each run gets its own
//! directory.

use contracts::{ContractError, FrameReady, FrameSink, Image, MdaEvent, PixelFormat, NO_POSITION};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

/// JSON sidecar written next to every image
#[derive(Debug, Serialize)]
struct FrameSidecar<'a> {
    sequence_uid: Uuid,
    frame_number: u64,
    written_at: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    event: &'a MdaEvent,
}

/// Sink that writes frames to disk files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    created_dirs: HashSet<PathBuf>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
        })
    }

    /// Directory for one run and position key
    pub fn position_dir(&self, sequence_uid: Uuid, position: i64) -> PathBuf {
        let run_dir = self.config.base_path.join(sequence_uid.to_string());
        if position == NO_POSITION {
            run_dir.join("p_none")
        } else {
            run_dir.join(format!("p{position}"))
        }
    }

    fn write_frame_to_disk(&mut self, frame: &FrameReady) -> std::io::Result<()> {
        let dir = self.position_dir(frame.sequence_uid, frame.event.index.position_key());
        if !self.created_dirs.contains(&dir) {
            fs::create_dir_all(&dir)?;
            self.created_dirs.insert(dir.clone());
        }

        let stem = format!("{:06}", frame.frame_number);

        // 1. Image
        self.save_image(&dir.join(format!("{stem}.png")), &frame.image)?;

        // 2. Event sidecar
        let sidecar = FrameSidecar {
            sequence_uid: frame.sequence_uid,
            frame_number: frame.frame_number,
            written_at: chrono::Utc::now().to_rfc3339(),
            width: frame.image.width,
            height: frame.image.height,
            format: frame.image.format,
            event: &frame.event,
        };
        let file = File::create(dir.join(format!("{stem}.json")))?;
        serde_json::to_writer_pretty(file, &sidecar)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        Ok(())
    }

    fn save_image(&self, path: &Path, image: &Image) -> std::io::Result<()> {
        match image.format {
            PixelFormat::Rgb8 => image::save_buffer(
                path,
                &image.data,
                image.width,
                image.height,
                image::ColorType::Rgb8,
            )
            .map_err(std::io::Error::other),

            PixelFormat::Mono16 => {
                let pixels = image.mono16_pixels().unwrap_or_default();
                let buffer = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
                    image.width,
                    image.height,
                    pixels,
                )
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "pixel data does not match image size",
                    )
                })?;
                buffer.save(path).map_err(std::io::Error::other)
            }
        }
    }

    fn persist_frame(&mut self, frame: &FrameReady) -> Result<(), ContractError> {
        self.write_frame_to_disk(frame).map_err(|e| {
            error!(sink = %self.name, frame_number = frame.frame_number, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl FrameSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_number = frame.frame_number)
    )]
    async fn write(&mut self, frame: &FrameReady) -> Result<(), ContractError> {
        self.persist_frame(frame)?;
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
