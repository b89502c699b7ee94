//! Driver Monitoring System (DMS)
//!
//! Drowsiness and yawn detection from 68-point facial landmarks:
//! - Eye Aspect Ratio (EAR) and Mouth Aspect Ratio (MAR)
//! - Debounced eye-closure alerting and falling-edge yawn counting
//! - Per-face state with primary-face or nearest-centroid tracking
//! - Frame-by-frame pipeline with injectable source, provider, and sink

pub mod analysis;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod landmarks;
pub mod pipeline;
pub mod state;
pub mod tracker;

pub use analysis::{DmsAlert, FaceReport, FrameReport};
pub use config::DmsConfig;
pub use detector::{LandmarkProvider, ScriptedProvider};
pub use geometry::{eye_aspect_ratio, mouth_aspect_ratio, FaceMetrics, GeometryError};
pub use landmarks::{LandmarkLayout, LandmarkSet, Point, Region, RegionRange};
pub use pipeline::{run, ReportSink, SessionSummary};
pub use state::{EyeState, FatigueEvent, FatigueState, FatigueStateMachine, Thresholds};
pub use tracker::{FaceId, FaceTracker, TrackingConfig, TrackingMode};

use std::collections::HashMap;

use camera_capture::{CameraError, VideoFrame};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Expected 68 landmarks, got {0}")]
    LandmarkCount(usize),

    #[error("{region} region needs {expected} points, got {actual}")]
    RegionSize {
        region: Region,
        expected: usize,
        actual: usize,
    },

    #[error("Degenerate {region} geometry")]
    DegenerateGeometry {
        region: Region,
        source: GeometryError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Landmark provider failed: {0}")]
    Provider(String),

    #[error("Report sink failed: {0}")]
    Sink(String),

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Driver monitoring module
///
/// Owns the landmark provider and one fatigue state machine per tracked face.
pub struct DmsModule<P> {
    config: DmsConfig,
    provider: P,
    tracker: FaceTracker,
    faces: HashMap<FaceId, FatigueStateMachine>,
}

impl<P: LandmarkProvider> DmsModule<P> {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig, provider: P) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            "DMS ready: EAR < {} for {} frames, MAR > {}, tracking {:?}",
            config.thresholds.ear_threshold,
            config.thresholds.ear_consec_frames,
            config.thresholds.mar_threshold,
            config.tracking.mode
        );
        Ok(Self {
            tracker: FaceTracker::new(config.tracking),
            faces: HashMap::new(),
            provider,
            config,
        })
    }

    /// Analyze a single frame for driver state
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<FrameReport, DmsError> {
        let gray = match self.config.frame_width {
            Some(width) => frame.resize_to_width(width).to_grayscale(),
            None => frame.to_grayscale(),
        };
        let faces = self.provider.detect(&gray)?;
        self.analyze_landmarks(frame.sequence, &faces)
    }

    /// Analyze already-detected faces for one frame
    pub fn analyze_landmarks(
        &mut self,
        sequence: u32,
        faces: &[LandmarkSet],
    ) -> Result<FrameReport, DmsError> {
        counter!("dms_frames_total").increment(1);

        let assignment = self.tracker.assign(faces);
        for id in &assignment.pruned {
            if self.faces.remove(id).is_some() {
                info!("Face {} lost, state dropped", id);
            }
        }

        if faces.is_empty() {
            debug!("Frame {}: no face detected", sequence);
            return Ok(FrameReport::empty(sequence));
        }

        let mut reports = Vec::with_capacity(assignment.matches.len());
        for (idx, id) in assignment.matches {
            reports.push(self.analyze_face(sequence, id, &faces[idx])?);
        }
        counter!("dms_faces_total").increment(reports.len() as u64);

        Ok(FrameReport {
            sequence,
            faces: reports,
        })
    }

    fn analyze_face(
        &mut self,
        sequence: u32,
        id: FaceId,
        face: &LandmarkSet,
    ) -> Result<FaceReport, DmsError> {
        let thresholds = self.config.thresholds;
        let perclos_window = self.config.perclos_window_frames;
        let machine = self.faces.entry(id).or_insert_with(|| {
            info!("Tracking face {}", id);
            FatigueStateMachine::new(thresholds, perclos_window)
        });

        let metrics = match FaceMetrics::compute(face, &self.config.layout) {
            Ok(metrics) => metrics,
            Err(e @ DmsError::DegenerateGeometry { .. }) => {
                warn!("Frame {}: face {} skipped: {}", sequence, id, e);
                counter!("dms_degenerate_faces_total").increment(1);
                return Ok(FaceReport::unavailable(id, machine));
            }
            Err(e) => return Err(e),
        };

        let Some(classification) = machine.advance(metrics.ear, metrics.mar) else {
            counter!("dms_degenerate_faces_total").increment(1);
            return Ok(FaceReport::unavailable(id, machine));
        };

        if classification.drowsiness_alert {
            counter!("dms_drowsiness_alerts_total").increment(1);
        }
        if let Some(FatigueEvent::YawnCompleted { count }) = classification
            .events
            .iter()
            .find(|e| matches!(e, FatigueEvent::YawnCompleted { .. }))
        {
            counter!("dms_yawns_total").increment(1);
            debug!("Frame {}: face {} completed yawn #{}", sequence, id, count);
        }

        Ok(FaceReport::classified(
            id,
            metrics.ear,
            metrics.mar,
            classification,
            machine.state(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::synthetic_face;

    fn face_state<P>(dms: &DmsModule<P>, id: FaceId) -> Option<&FatigueState> {
        dms.faces.get(&id).map(FatigueStateMachine::state)
    }

    /// Face with eyes and mouth opened to the given ratios
    fn face(ear: f64, mar: f64, dx: f64) -> LandmarkSet {
        let mut points = synthetic_face(dx, 0.0).points().to_vec();
        // Eye corners are 30 px apart: lid half-opening = ear * 30 / 2
        for start in [36, 42] {
            let half = ear * 30.0 / 2.0;
            points[start + 1].y = 100.0 - half;
            points[start + 2].y = 100.0 - half;
            points[start + 4].y = 100.0 + half;
            points[start + 5].y = 100.0 + half;
        }
        // Mouth corners are 60 px apart
        let half = mar * 60.0 / 2.0;
        for k in [2, 4] {
            points[48 + k].y = 200.0 - half;
        }
        for k in [8, 10] {
            points[48 + k].y = 200.0 + half;
        }
        LandmarkSet::new(points).unwrap()
    }

    fn module(config: DmsConfig) -> DmsModule<ScriptedProvider> {
        DmsModule::new(config, ScriptedProvider::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = DmsConfig::default();
        config.thresholds.ear_consec_frames = 0;
        assert!(matches!(
            DmsModule::new(config, ScriptedProvider::default()),
            Err(DmsError::Config(_))
        ));
    }

    #[test]
    fn test_no_face_leaves_state_untouched() {
        let mut dms = module(DmsConfig::default());
        dms.analyze_landmarks(0, &[face(0.1, 0.2, 0.0)]).unwrap();

        let report = dms.analyze_landmarks(1, &[]).unwrap();
        assert!(!report.face_detected());
        assert_eq!(report.sequence, 1);
        assert_eq!(face_state(&dms, 0).unwrap().closed_eye_frames, 1);
    }

    #[test]
    fn test_end_to_end_drowsiness() {
        let mut dms = module(DmsConfig::default());
        let closed = face(0.1, 0.2, 0.0);

        let mut alert_frames = Vec::new();
        for seq in 1..=48 {
            let report = dms.analyze_landmarks(seq, &[closed.clone()]).unwrap();
            let f = &report.faces[0];
            assert_eq!(f.eye_state, EyeState::Closed);
            assert!((f.ear.unwrap() - 0.1).abs() < 1e-9);
            if f.drowsiness_alert {
                alert_frames.push(seq);
            }
        }
        assert_eq!(alert_frames, vec![48]);

        let report = dms.analyze_landmarks(49, &[face(0.5, 0.2, 0.0)]).unwrap();
        assert!(!report.faces[0].drowsiness_alert);
        assert_eq!(report.faces[0].eye_state, EyeState::Open);
        assert_eq!(face_state(&dms, 0).unwrap().closed_eye_frames, 0);
    }

    #[test]
    fn test_yawn_sequence_through_module() {
        let mut dms = module(DmsConfig::default());
        let counts: Vec<u32> = [0.9, 0.9, 0.2]
            .iter()
            .enumerate()
            .map(|(seq, &mar)| {
                dms.analyze_landmarks(seq as u32, &[face(0.3, mar, 0.0)]).unwrap().faces[0].yawn_count
            })
            .collect();
        assert_eq!(counts, vec![0, 0, 1]);
    }

    #[test]
    fn test_degenerate_mouth_skips_classification() {
        let mut dms = module(DmsConfig::default());
        dms.analyze_landmarks(0, &[face(0.1, 0.9, 0.0)]).unwrap();

        let mut points = face(0.3, 0.1, 0.0).points().to_vec();
        points[54] = points[48];
        let degenerate = LandmarkSet::new(points).unwrap();

        let report = dms.analyze_landmarks(1, &[degenerate]).unwrap();
        let f = &report.faces[0];
        assert!(f.metrics_unavailable);
        assert_eq!(f.mar, None);
        assert!(f.events.is_empty());
        assert_eq!(f.eye_state, EyeState::Closed);
        assert!(!f.drowsiness_alert);
        assert!(f.yawn_in_progress);
        assert_eq!(f.provisional_yawn_count, Some(1));

        // Neither the closed-eye run nor the open mouth was touched
        let state = face_state(&dms, 0).unwrap();
        assert_eq!(state.closed_eye_frames, 1);
        assert!(state.is_yawning);
        assert_eq!(state.yawn_count, 0);
    }

    #[test]
    fn test_primary_mode_uses_largest_face_only() {
        let mut dms = module(DmsConfig::default());
        let small = LandmarkSet::new(
            face(0.1, 0.2, 400.0)
                .points()
                .iter()
                .map(|p| Point::new(400.0 + (p.x - 400.0) * 0.5, p.y * 0.5))
                .collect(),
        )
        .unwrap();

        let report = dms.analyze_landmarks(0, &[small, face(0.4, 0.2, 0.0)]).unwrap();
        assert_eq!(report.faces.len(), 1);
        assert_eq!(report.faces[0].eye_state, EyeState::Open);
    }

    #[test]
    fn test_multi_face_keeps_separate_state() {
        let config = DmsConfig {
            tracking: TrackingConfig {
                mode: TrackingMode::MultiFace,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut dms = module(config);

        for seq in 0..3 {
            let report = dms
                .analyze_landmarks(seq, &[face(0.1, 0.2, 0.0), face(0.4, 0.2, 500.0)])
                .unwrap();
            assert_eq!(report.faces.len(), 2);
        }
        assert_eq!(face_state(&dms, 0).unwrap().closed_eye_frames, 3);
        assert_eq!(face_state(&dms, 1).unwrap().closed_eye_frames, 0);
    }

    #[test]
    fn test_analyze_runs_provider_on_preprocessed_frame() {
        let provider = ScriptedProvider::new(vec![vec![face(0.1, 0.2, 0.0)], vec![]]);
        let mut dms = DmsModule::new(DmsConfig::default(), provider).unwrap();

        let frame = VideoFrame::blank(1280, 720, 9);
        let report = dms.analyze(&frame).unwrap();
        assert_eq!(report.sequence, 9);
        assert_eq!(report.faces.len(), 1);

        assert!(dms.analyze(&frame).unwrap().faces.is_empty());
    }
}
