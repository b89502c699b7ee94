//! Recorded landmark sessions
//!
//! JSON lines, one object per frame:
//! `{"sequence": 0, "faces": [[[x, y], ... 68 points], ...]}`.
//! Frames missing from the recording replay as "no face detected".

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use dms::{LandmarkSet, ScriptedProvider};
use serde::Deserialize;
use tracing::info;

/// Largest run of missing frames accepted between two recorded frames
const MAX_GAP_FRAMES: u32 = 100_000;

/// Longest session accepted, gaps included (about 18 hours at 15 fps)
const MAX_RECORDING_FRAMES: u32 = 1_000_000;

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    sequence: u32,
    #[serde(default)]
    faces: Vec<LandmarkSet>,
}

/// Per-frame detections indexed by sequence number
#[derive(Debug, Clone, Default)]
pub struct Recording {
    frames: Vec<Vec<LandmarkSet>>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let recording = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to read recording {}", path.display()))?;
        info!("Loaded recording {} ({} frames)", path.display(), recording.len());
        Ok(recording)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut recorded: Vec<RecordedFrame> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame =
                serde_json::from_str(&line).with_context(|| format!("line {}", idx + 1))?;
            recorded.push(frame);
        }
        recorded.sort_by_key(|f| f.sequence);

        let mut frames: Vec<Vec<LandmarkSet>> = Vec::with_capacity(recorded.len());
        for frame in recorded {
            let next = frames.len() as u32;
            if frame.sequence < next {
                bail!("duplicate frame sequence {}", frame.sequence);
            }
            if frame.sequence - next > MAX_GAP_FRAMES {
                bail!("gap of {} frames before sequence {}", frame.sequence - next, frame.sequence);
            }
            if frame.sequence >= MAX_RECORDING_FRAMES {
                bail!(
                    "sequence {} exceeds the {} frame recording limit",
                    frame.sequence,
                    MAX_RECORDING_FRAMES
                );
            }
            frames.resize_with(frame.sequence as usize, Vec::new);
            frames.push(frame.faces);
        }

        Ok(Self { frames })
    }

    /// Frames covered, including gaps
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Replay as a landmark provider, one recorded frame per call
    pub fn into_provider(self) -> ScriptedProvider {
        ScriptedProvider::new(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::LandmarkProvider;
    use image::GrayImage;
    use std::io::Cursor;

    fn face_json(x: f64) -> String {
        let points: Vec<[f64; 2]> = (0..68).map(|i| [x + i as f64, i as f64]).collect();
        serde_json::to_string(&points).unwrap()
    }

    #[test]
    fn test_gaps_replay_as_empty_frames() {
        let text = format!(
            "{{\"sequence\": 2, \"faces\": [{}]}}\n\n{{\"sequence\": 0, \"faces\": [{}, {}]}}\n",
            face_json(0.0),
            face_json(0.0),
            face_json(100.0)
        );
        let recording = Recording::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(recording.len(), 3);

        let gray = GrayImage::new(1, 1);
        let mut provider = recording.into_provider();
        assert_eq!(provider.detect(&gray).unwrap().len(), 2);
        assert!(provider.detect(&gray).unwrap().is_empty());
        assert_eq!(provider.detect(&gray).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_faces_field_means_no_face() {
        let recording = Recording::from_reader(Cursor::new("{\"sequence\": 0}\n")).unwrap();
        assert_eq!(recording.len(), 1);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_faces() {
        let dup = "{\"sequence\": 1}\n{\"sequence\": 1}\n";
        assert!(Recording::from_reader(Cursor::new(dup)).is_err());

        let short_face = "{\"sequence\": 0, \"faces\": [[[1.0, 2.0]]]}\n";
        assert!(Recording::from_reader(Cursor::new(short_face)).is_err());

        let huge_gap = "{\"sequence\": 4000000000}\n";
        assert!(Recording::from_reader(Cursor::new(huge_gap)).is_err());
    }

    #[test]
    fn test_rejects_many_small_gaps_adding_up() {
        let text: String = (0..300u32)
            .map(|i| format!("{{\"sequence\": {}}}\n", i * 100_000))
            .collect();
        let err = Recording::from_reader(Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("recording limit"));

        let text: String = (0..10u32)
            .map(|i| format!("{{\"sequence\": {}}}\n", i * 100_000))
            .collect();
        let recording = Recording::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(recording.len(), 900_001);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        std::fs::write(&path, format!("{{\"sequence\": 0, \"faces\": [{}]}}\n", face_json(5.0))).unwrap();

        let recording = Recording::load(&path).unwrap();
        assert_eq!(recording.len(), 1);
        assert!(Recording::load(&dir.path().join("missing.jsonl")).is_err());
    }
}
