//! DMS analysis results and alerts

use serde::{Deserialize, Serialize};

use crate::state::{
    Classification, EyePhase, EyeState, FatigueEvent, FatigueState, FatigueStateMachine, YawnPhase,
};
use crate::tracker::FaceId;

/// DMS alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmsAlert {
    /// Eyes closed for the configured number of consecutive frames
    Drowsiness,

    /// A yawn gesture just finished
    Yawn,
}

impl DmsAlert {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmsAlert::Drowsiness => "drowsiness",
            DmsAlert::Yawn => "yawn",
        }
    }
}

/// Result for one face on one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceReport {
    pub face_id: FaceId,

    /// Mean eye aspect ratio (absent when geometry was degenerate)
    pub ear: Option<f64>,

    /// Mouth aspect ratio (absent when geometry was degenerate)
    pub mar: Option<f64>,

    pub eye_state: EyeState,
    pub drowsiness_alert: bool,
    pub yawn_in_progress: bool,

    /// Completed yawns
    pub yawn_count: u32,

    /// Count to display while a yawn is in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisional_yawn_count: Option<u32>,

    /// Fraction of recent frames with eyes closed
    pub perclos: f64,

    /// No classification this frame; state was left untouched
    pub metrics_unavailable: bool,

    pub events: Vec<FatigueEvent>,
}

impl FaceReport {
    pub(crate) fn classified(
        face_id: FaceId,
        ear: f64,
        mar: f64,
        classification: Classification,
        state: &FatigueState,
    ) -> Self {
        Self {
            face_id,
            ear: Some(ear),
            mar: Some(mar),
            eye_state: classification.eye_state,
            drowsiness_alert: classification.drowsiness_alert,
            yawn_in_progress: classification.yawn_in_progress,
            yawn_count: classification.yawn_count,
            provisional_yawn_count: classification.provisional_yawn_count,
            perclos: state.perclos(),
            metrics_unavailable: false,
            events: classification.events,
        }
    }

    /// Report for a face whose ratios could not be computed
    ///
    /// Flags mirror the retained state, which this frame did not advance.
    /// No events are emitted.
    pub(crate) fn unavailable(face_id: FaceId, machine: &FatigueStateMachine) -> Self {
        let state = machine.state();
        let eye_phase = machine.eye_phase();
        let yawning = machine.yawn_phase() == YawnPhase::Yawning;
        Self {
            face_id,
            ear: None,
            mar: None,
            eye_state: match eye_phase {
                EyePhase::Open => EyeState::Open,
                EyePhase::ClosedAccumulating | EyePhase::Alert => EyeState::Closed,
            },
            drowsiness_alert: eye_phase == EyePhase::Alert,
            yawn_in_progress: yawning,
            yawn_count: state.yawn_count,
            provisional_yawn_count: yawning.then(|| state.yawn_count + 1),
            perclos: state.perclos(),
            metrics_unavailable: true,
            events: Vec::new(),
        }
    }

    /// Alerts raised by this frame
    pub fn alerts(&self) -> Vec<DmsAlert> {
        let mut alerts = Vec::new();
        if self.drowsiness_alert {
            alerts.push(DmsAlert::Drowsiness);
        }
        if self
            .events
            .iter()
            .any(|e| matches!(e, FatigueEvent::YawnCompleted { .. }))
        {
            alerts.push(DmsAlert::Yawn);
        }
        alerts
    }
}

/// Complete analysis of one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Source frame sequence number
    pub sequence: u32,

    /// One entry per analyzed face; empty when no face was detected
    pub faces: Vec<FaceReport>,
}

impl FrameReport {
    pub fn empty(sequence: u32) -> Self {
        Self {
            sequence,
            faces: Vec::new(),
        }
    }

    pub fn face_detected(&self) -> bool {
        !self.faces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FatigueStateMachine, Thresholds};

    fn report(ear: f64, mar: f64, machine: &mut FatigueStateMachine) -> FaceReport {
        let c = machine.advance(ear, mar).unwrap();
        FaceReport::classified(0, ear, mar, c, machine.state())
    }

    #[test]
    fn test_alerts_from_report() {
        let mut machine = FatigueStateMachine::new(
            Thresholds {
                ear_consec_frames: 1,
                ..Default::default()
            },
            10,
        );

        let drowsy = report(0.1, 0.9, &mut machine);
        assert_eq!(drowsy.alerts(), vec![DmsAlert::Drowsiness]);

        let yawned = report(0.3, 0.1, &mut machine);
        assert_eq!(yawned.alerts(), vec![DmsAlert::Yawn]);

        let quiet = report(0.3, 0.1, &mut machine);
        assert!(quiet.alerts().is_empty());
        assert!(!FrameReport::empty(5).face_detected());
    }

    #[test]
    fn test_unavailable_report_reflects_retained_state() {
        let mut machine = FatigueStateMachine::new(Thresholds::default(), 10);
        machine.advance(0.1, 0.9);
        machine.advance(0.1, 0.1);

        let r = FaceReport::unavailable(3, &machine);
        assert!(r.metrics_unavailable);
        assert_eq!(r.ear, None);
        assert_eq!(r.eye_state, EyeState::Closed);
        assert!(!r.drowsiness_alert);
        assert!(!r.yawn_in_progress);
        assert_eq!(r.yawn_count, 1);
        assert!(r.events.is_empty());
        assert!(r.alerts().is_empty());
    }

    #[test]
    fn test_unavailable_report_keeps_alert_and_yawn_flags() {
        let mut machine = FatigueStateMachine::new(
            Thresholds {
                ear_consec_frames: 2,
                ..Default::default()
            },
            10,
        );
        machine.advance(0.1, 0.9);
        machine.advance(0.1, 0.9);

        let r = FaceReport::unavailable(0, &machine);
        assert_eq!(r.eye_state, EyeState::Closed);
        assert!(r.drowsiness_alert);
        assert!(r.yawn_in_progress);
        assert_eq!(r.provisional_yawn_count, Some(1));
        assert_eq!(r.yawn_count, 0);
        assert!(r.events.is_empty());

        machine.advance(0.3, 0.1);
        let r = FaceReport::unavailable(0, &machine);
        assert_eq!(r.eye_state, EyeState::Open);
        assert!(!r.drowsiness_alert);
        assert!(!r.yawn_in_progress);
        assert_eq!(r.provisional_yawn_count, None);
        assert_eq!(r.yawn_count, 1);
    }

    #[test]
    fn test_report_json_shape() {
        let mut machine = FatigueStateMachine::new(Thresholds::default(), 10);
        let r = report(0.3, 0.9, &mut machine);
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(json["eye_state"], "OPEN");
        assert_eq!(json["yawn_in_progress"], true);
        assert_eq!(json["provisional_yawn_count"], 1);
        assert_eq!(json["events"][0]["type"], "EYES_OPEN");
        assert_eq!(json["events"][1]["type"], "YAWNING_IN_PROGRESS");
        assert_eq!(json["events"][1]["provisional_count"], 1);
    }
}
