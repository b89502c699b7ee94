//! Face identity across frames
//!
//! The landmark provider gives no identity between frames. In `Primary` mode
//! only the largest face is kept and always maps to the same id. In
//! `MultiFace` mode detections are matched to the nearest previous centroid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::landmarks::{LandmarkSet, Point};

/// Stable per-session face identifier
pub type FaceId = u32;

/// Id used by `TrackingMode::Primary`
pub const PRIMARY_FACE: FaceId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Largest face only, one state for the session
    #[default]
    Primary,
    /// Nearest-centroid matching, one state per track
    MultiFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    /// Largest centroid jump still matched to an existing track (pixels)
    pub max_match_distance_px: f64,
    /// Unseen frames before a track and its state are dropped
    pub max_lost_frames: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Primary,
            max_match_distance_px: 80.0,
            max_lost_frames: 450,
        }
    }
}

/// Result of matching one frame's detections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// (detection index, face id), in detection order
    pub matches: Vec<(usize, FaceId)>,
    /// Tracks dropped this frame
    pub pruned: Vec<FaceId>,
}

#[derive(Debug, Clone)]
struct Track {
    id: FaceId,
    centroid: Point,
    lost_frames: u32,
}

pub struct FaceTracker {
    config: TrackingConfig,
    tracks: Vec<Track>,
    next_id: FaceId,
}

impl FaceTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: PRIMARY_FACE,
        }
    }

    /// Assign an id to each detection that will be analyzed this frame
    pub fn assign(&mut self, faces: &[LandmarkSet]) -> Assignment {
        match self.config.mode {
            TrackingMode::Primary => Assignment {
                matches: largest_face(faces)
                    .map(|idx| vec![(idx, PRIMARY_FACE)])
                    .unwrap_or_default(),
                pruned: Vec::new(),
            },
            TrackingMode::MultiFace => self.assign_nearest(faces),
        }
    }

    fn assign_nearest(&mut self, faces: &[LandmarkSet]) -> Assignment {
        let centroids: Vec<Point> = faces.iter().map(LandmarkSet::centroid).collect();

        // Candidate pairs within range, closest first
        let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
        for (t, track) in self.tracks.iter().enumerate() {
            for (d, centroid) in centroids.iter().enumerate() {
                let dist = track.centroid.distance(centroid);
                if dist <= self.config.max_match_distance_px {
                    candidates.push((dist, t, d));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut track_taken = vec![false; self.tracks.len()];
        let mut detection_id: Vec<Option<FaceId>> = vec![None; faces.len()];
        for (_, t, d) in candidates {
            if track_taken[t] || detection_id[d].is_some() {
                continue;
            }
            track_taken[t] = true;
            detection_id[d] = Some(self.tracks[t].id);
            self.tracks[t].centroid = centroids[d];
            self.tracks[t].lost_frames = 0;
        }

        for (t, taken) in track_taken.iter().enumerate() {
            if !taken {
                self.tracks[t].lost_frames += 1;
            }
        }

        let mut matches = Vec::with_capacity(faces.len());
        for (d, id) in detection_id.into_iter().enumerate() {
            let id = match id {
                Some(id) => id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!("New face track {} at ({:.1}, {:.1})", id, centroids[d].x, centroids[d].y);
                    self.tracks.push(Track {
                        id,
                        centroid: centroids[d],
                        lost_frames: 0,
                    });
                    id
                }
            };
            matches.push((d, id));
        }

        let max_lost = self.config.max_lost_frames;
        let mut pruned = Vec::new();
        self.tracks.retain(|track| {
            if track.lost_frames > max_lost {
                debug!("Dropping face track {} after {} unseen frames", track.id, track.lost_frames);
                pruned.push(track.id);
                false
            } else {
                true
            }
        });

        Assignment { matches, pruned }
    }
}

/// Index of the face with the largest bounding box
fn largest_face(faces: &[LandmarkSet]) -> Option<usize> {
    faces
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.bounding_box().area().total_cmp(&b.bounding_box().area()))
        .map(|(idx, _)| idx)
}
