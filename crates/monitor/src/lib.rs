//! Drowsiness Monitor
//!
//! Runs the DMS pipeline over recorded landmark sessions and renders the
//! per-frame reports to logs and JSON lines.

pub mod replay;
pub mod settings;
pub mod sinks;

pub use replay::Recording;
pub use settings::{LogFormat, LogSettings, Profile, Settings};
pub use sinks::{FanOut, JsonLinesSink, LogSink};

use std::path::Path;

use anyhow::{anyhow, Context};
use camera_capture::{CameraConfig, FrameSource, ImageDirSource, SyntheticSource};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so JSON
/// reports can use stdout.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| anyhow!("Invalid log level {:?}: {}", settings.level, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Frame source for a replay of `recorded_frames` frames
///
/// Images from `frames_dir` when given, blank frames of `camera` size
/// otherwise. A frames directory whose length differs from the recording is
/// accepted with a warning: missing images end the run early and extra images
/// replay with no face.
pub fn open_source(
    frames_dir: Option<&Path>,
    camera: CameraConfig,
    recorded_frames: usize,
) -> anyhow::Result<Box<dyn FrameSource>> {
    let Some(dir) = frames_dir else {
        let limit = u32::try_from(recorded_frames).context("Recording too long")?;
        return Ok(Box::new(SyntheticSource::new(camera, Some(limit))));
    };

    let images = ImageDirSource::open(dir)?;
    if images.len() < recorded_frames {
        warn!(
            "{} has {} images for {} recorded frames; the last {} recorded frames will be skipped",
            dir.display(),
            images.len(),
            recorded_frames,
            recorded_frames - images.len()
        );
    } else if images.len() > recorded_frames {
        warn!(
            "{} has {} images for {} recorded frames; the extra images replay with no face",
            dir.display(),
            images.len(),
            recorded_frames
        );
    }
    Ok(Box::new(images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::CameraError;
    use image::RgbImage;

    fn frames_until_exhausted(mut source: Box<dyn FrameSource>) -> usize {
        let mut count = 0;
        loop {
            match source.next_frame() {
                Ok(_) => count += 1,
                Err(CameraError::Exhausted) => return count,
                Err(e) => panic!("unexpected source error: {e}"),
            }
        }
    }

    #[test]
    fn test_synthetic_source_matches_recording_length() {
        let source = open_source(None, CameraConfig { width: 8, height: 6 }, 4).unwrap();
        assert_eq!(frames_until_exhausted(source), 4);
    }

    #[test]
    fn test_short_frames_dir_still_opens() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            RgbImage::new(4, 4).save(dir.path().join(name)).unwrap();
        }

        let source = open_source(Some(dir.path()), CameraConfig::cabin(), 5).unwrap();
        assert_eq!(frames_until_exhausted(source), 2);
    }

    #[test]
    fn test_missing_frames_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(open_source(Some(&missing), CameraConfig::cabin(), 1).is_err());
    }
}
