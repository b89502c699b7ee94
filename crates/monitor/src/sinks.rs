//! Report sinks: log overlay, JSON lines, fan-out

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use alerting::{AlertConfig, AlertManager};
use dms::{DmsAlert, DmsError, EyeState, FaceReport, FrameReport, ReportSink};
use tracing::{debug, info, warn};

/// Renders reports as log lines, mirroring the on-screen overlay
///
/// Alerts stay level-triggered in the report stream; only the alarm lines
/// go through the cooldown.
pub struct LogSink {
    alarms: AlertManager,
}

impl LogSink {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            alarms: AlertManager::new(config),
        }
    }

    fn render_face(&mut self, sequence: u32, face: &FaceReport) {
        if face.metrics_unavailable {
            debug!(frame = sequence, face = face.face_id, "Metrics unavailable");
            return;
        }

        let eyes = match face.eye_state {
            EyeState::Open => "Eyes Open",
            EyeState::Closed => "Eyes Closed",
        };
        debug!(
            frame = sequence,
            face = face.face_id,
            "{} EAR: {:.2} MAR: {:.2}",
            eyes,
            face.ear.unwrap_or_default(),
            face.mar.unwrap_or_default()
        );

        if let Some(count) = face.provisional_yawn_count {
            debug!(frame = sequence, face = face.face_id, "Yawning, Yawn Count: {}", count);
        }

        for alert in face.alerts() {
            let key = format!("face-{}/{}", face.face_id, alert.as_str());
            if !self.alarms.evaluate(&key, sequence as u64) {
                continue;
            }
            match alert {
                DmsAlert::Drowsiness => warn!(
                    frame = sequence,
                    face = face.face_id,
                    perclos = face.perclos,
                    "DROWSINESS ALERT!"
                ),
                DmsAlert::Yawn => info!(
                    frame = sequence,
                    face = face.face_id,
                    "Yawn Count: {}",
                    face.yawn_count
                ),
            }
        }
    }
}

impl ReportSink for LogSink {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError> {
        if !report.face_detected() {
            debug!(frame = report.sequence, "No face detected");
        }
        for face in &report.faces {
            self.render_face(report.sequence, face);
        }
        Ok(())
    }
}

/// Writes one JSON object per frame
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError> {
        serde_json::to_writer(&mut self.writer, report).map_err(|e| DmsError::Sink(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| DmsError::Sink(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), DmsError> {
        self.writer.flush().map_err(|e| DmsError::Sink(e.to_string()))
    }
}

/// Publishes every report to each inner sink in order
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }
}

impl ReportSink for FanOut {
    fn publish(&mut self, report: &FrameReport) -> Result<(), DmsError> {
        self.sinks.iter_mut().try_for_each(|s| s.publish(report))
    }

    fn finish(&mut self) -> Result<(), DmsError> {
        self.sinks.iter_mut().try_for_each(|s| s.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::FatigueEvent;

    fn face_report(drowsy: bool, yawn_completed: bool) -> FaceReport {
        let mut events = vec![FatigueEvent::EyesClosed];
        if drowsy {
            events.push(FatigueEvent::DrowsinessAlert);
        }
        if yawn_completed {
            events.push(FatigueEvent::YawnCompleted { count: 1 });
        }
        FaceReport {
            face_id: 0,
            ear: Some(0.1),
            mar: Some(0.2),
            eye_state: EyeState::Closed,
            drowsiness_alert: drowsy,
            yawn_in_progress: false,
            yawn_count: if yawn_completed { 1 } else { 0 },
            provisional_yawn_count: None,
            perclos: 1.0,
            metrics_unavailable: false,
            events,
        }
    }

    #[test]
    fn test_log_sink_throttles_alarm_not_report() {
        let mut sink = LogSink::new(AlertConfig {
            cooldown_frames: 10,
            ..Default::default()
        });

        for seq in 0..15 {
            let report = FrameReport {
                sequence: seq,
                faces: vec![face_report(true, seq == 3)],
            };
            sink.publish(&report).unwrap();
        }

        assert_eq!(sink.alarms.fire_count("face-0/drowsiness"), 2);
        assert_eq!(sink.alarms.fire_count("face-0/yawn"), 1);
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_frame() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&FrameReport::empty(0)).unwrap();
        sink.publish(&FrameReport {
            sequence: 1,
            faces: vec![face_report(true, false)],
        })
        .unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.writer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: FrameReport = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.sequence, 1);
        assert!(parsed.faces[0].drowsiness_alert);
        assert_eq!(parsed.faces[0].eye_state, EyeState::Closed);
    }

    #[test]
    fn test_json_lines_sink_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.publish(&FrameReport::empty(7)).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), r#"{"sequence":7,"faces":[]}"#);
    }

    #[test]
    fn test_fan_out_publishes_to_all() {
        let mut fan_out = FanOut::new();
        fan_out.push(Box::new(Vec::<FrameReport>::new()));
        fan_out.push(Box::new(LogSink::new(AlertConfig::default())));

        fan_out.publish(&FrameReport::empty(1)).unwrap();
        fan_out.finish().unwrap();
        assert_eq!(fan_out.sinks.len(), 2);
    }
}
