//! Frame loop: source -> DMS -> sink

use std::sync::atomic::{AtomicBool, Ordering};

use camera_capture::{CameraError, FrameSource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::FrameReport;
use crate::detector::LandmarkProvider;
use crate::state::FatigueEvent;
use crate::{DmsError, DmsModule};

/// Consumer of per-frame reports (overlay, alarm, log, file)
pub trait ReportSink {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError>;

    /// Called once after the loop ends
    fn finish(&mut self) -> Result<(), DmsError> {
        Ok(())
    }
}

impl<K: ReportSink + ?Sized> ReportSink for Box<K> {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError> {
        (**self).publish(report)
    }

    fn finish(&mut self) -> Result<(), DmsError> {
        (**self).finish()
    }
}

/// Collects every report in memory
impl ReportSink for Vec<FrameReport> {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError> {
        self.push(report.clone());
        Ok(())
    }
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub frames_with_faces: u64,
    pub face_reports: u64,
    pub degenerate_faces: u64,
    /// Frames where at least one face raised the drowsiness alert
    pub alert_frames: u64,
    pub yawns_completed: u64,
}

impl SessionSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        if report.face_detected() {
            self.frames_with_faces += 1;
        }
        self.face_reports += report.faces.len() as u64;
        self.degenerate_faces += report.faces.iter().filter(|f| f.metrics_unavailable).count() as u64;
        if report.faces.iter().any(|f| f.drowsiness_alert) {
            self.alert_frames += 1;
        }
        self.yawns_completed += report
            .faces
            .iter()
            .flat_map(|f| f.events.iter())
            .filter(|e| matches!(e, FatigueEvent::YawnCompleted { .. }))
            .count() as u64;
    }
}

/// Process frames until the source is exhausted or `stop` is set
///
/// Each frame is fully analyzed and published before the next pull. `stop`
/// is checked once per completed frame. The sink is finished and the source
/// dropped on every return; a loop error takes precedence over a finish error.
pub fn run<S, P, K>(
    mut source: S,
    dms: &mut DmsModule<P>,
    sink: &mut K,
    stop: &AtomicBool,
) -> Result<SessionSummary, DmsError>
where
    S: FrameSource,
    P: LandmarkProvider,
    K: ReportSink + ?Sized,
{
    let mut summary = SessionSummary::default();

    let outcome = process(&mut source, dms, sink, stop, &mut summary);
    let finished = sink.finish();
    drop(source);
    debug!("Video source released");

    if let Err(e) = outcome {
        if let Err(finish_err) = finished {
            warn!("Sink finish failed after loop error: {}", finish_err);
        }
        return Err(e);
    }
    finished?;
    Ok(summary)
}

fn process<S, P, K>(
    source: &mut S,
    dms: &mut DmsModule<P>,
    sink: &mut K,
    stop: &AtomicBool,
    summary: &mut SessionSummary,
) -> Result<(), DmsError>
where
    S: FrameSource,
    P: LandmarkProvider,
    K: ReportSink + ?Sized,
{
    loop {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(CameraError::Exhausted) => {
                info!("Video source exhausted after {} frames", summary.frames);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let report = dms.analyze(&frame)?;
        summary.record(&report);
        sink.publish(&report)?;

        if stop.load(Ordering::Relaxed) {
            info!("Stop requested after frame {}", frame.sequence);
            return Ok(());
        }
    }
}
