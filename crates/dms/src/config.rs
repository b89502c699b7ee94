//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::landmarks::LandmarkLayout;
use crate::state::{Thresholds, DEFAULT_PERCLOS_WINDOW};
use crate::tracker::TrackingConfig;
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// EAR / MAR thresholds and the closed-eye frame limit
    pub thresholds: Thresholds,

    /// Landmark offsets of the eye and mouth regions
    pub layout: LandmarkLayout,

    /// Face identity handling
    pub tracking: TrackingConfig,

    /// Frames are resized to this width before detection (`None` keeps the capture size)
    pub frame_width: Option<u32>,

    /// Frames kept for PERCLOS
    pub perclos_window_frames: usize,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            layout: LandmarkLayout::default(),
            tracking: TrackingConfig::default(),
            frame_width: Some(640),
            perclos_window_frames: DEFAULT_PERCLOS_WINDOW,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alerts sooner)
    pub fn strict() -> Self {
        Self {
            thresholds: Thresholds {
                ear_threshold: 0.27,
                ear_consec_frames: 30,
                mar_threshold: 0.65,
            },
            ..Default::default()
        }
    }

    /// Create lenient config (alerts later)
    pub fn lenient() -> Self {
        Self {
            thresholds: Thresholds {
                ear_threshold: 0.22,
                ear_consec_frames: 72,
                mar_threshold: 0.85,
            },
            ..Default::default()
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DmsError> {
        let t = &self.thresholds;
        if !(t.ear_threshold.is_finite() && t.ear_threshold > 0.0) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be positive, got {}",
                t.ear_threshold
            )));
        }
        if !(t.mar_threshold.is_finite() && t.mar_threshold > 0.0) {
            return Err(DmsError::Config(format!(
                "mar_threshold must be positive, got {}",
                t.mar_threshold
            )));
        }
        if t.ear_consec_frames == 0 {
            return Err(DmsError::Config("ear_consec_frames must be at least 1".into()));
        }
        if self.frame_width == Some(0) {
            return Err(DmsError::Config("frame_width must be positive".into()));
        }
        if !(self.tracking.max_match_distance_px.is_finite() && self.tracking.max_match_distance_px >= 0.0) {
            return Err(DmsError::Config(format!(
                "max_match_distance_px must be non-negative, got {}",
                self.tracking.max_match_distance_px
            )));
        }
        self.layout.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::RegionRange;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = DmsConfig::default();
        assert_eq!(config.thresholds.ear_threshold, 0.25);
        assert_eq!(config.thresholds.ear_consec_frames, 48);
        assert_eq!(config.thresholds.mar_threshold, 0.75);
        assert_eq!(config.frame_width, Some(640));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        let strict = DmsConfig::strict();
        let lenient = DmsConfig::lenient();
        assert!(strict.validate().is_ok());
        assert!(lenient.validate().is_ok());
        assert!(strict.thresholds.ear_consec_frames < lenient.thresholds.ear_consec_frames);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DmsConfig::default();
        config.thresholds.ear_consec_frames = 0;
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));

        let mut config = DmsConfig::default();
        config.thresholds.mar_threshold = f64::NAN;
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));

        let mut config = DmsConfig::default();
        config.frame_width = Some(0);
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));

        let mut config = DmsConfig::default();
        config.layout.mouth = RegionRange::new(48, 50);
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: DmsConfig =
            serde_json::from_str(r#"{"thresholds": {"ear_threshold": 0.2}}"#).unwrap();
        assert_eq!(config.thresholds.ear_threshold, 0.2);
        assert_eq!(config.thresholds.ear_consec_frames, 48);
        assert_eq!(config.layout, LandmarkLayout::default());
    }
}
