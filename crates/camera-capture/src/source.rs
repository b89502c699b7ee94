//! Blocking frame sources

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{CameraConfig, CameraError, VideoFrame};

/// A blocking pull of one frame at a time
///
/// `next_frame` blocks until a frame is available. `CameraError::Exhausted`
/// marks the end of the stream; the source is released when dropped.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).next_frame()
    }
}

/// Blank frames with increasing sequence numbers
///
/// Used when landmarks come from a recording rather than from pixels.
pub struct SyntheticSource {
    config: CameraConfig,
    limit: Option<u32>,
    next_sequence: u32,
}

impl SyntheticSource {
    /// Yield `limit` frames (unbounded when `None`)
    pub fn new(config: CameraConfig, limit: Option<u32>) -> Self {
        Self {
            config,
            limit,
            next_sequence: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.limit.is_some_and(|limit| self.next_sequence >= limit) {
            return Err(CameraError::Exhausted);
        }
        let frame = VideoFrame::blank(self.config.width, self.config.height, self.next_sequence);
        self.next_sequence += 1;
        Ok(frame)
    }
}

/// Frames decoded from an image directory, in file-name order
pub struct ImageDirSource {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageDirSource {
    /// Open a directory of `.png` / `.jpg` / `.jpeg` / `.bmp` frames
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!("{}: no image frames", dir.display())));
        }

        info!("Opened image sequence {} ({} frames)", dir.display(), paths.len());
        Ok(Self { paths, position: 0 })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let Some(path) = self.paths.get(self.position) else {
            return Err(CameraError::Exhausted);
        };
        debug!("Decoding frame {}", path.display());

        let img = image::open(path)
            .map_err(|e| CameraError::Format(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        let frame = VideoFrame::from_rgb_image(img, 0, self.position as u32);
        self.position += 1;
        Ok(frame)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
        .unwrap_or(false)
}
