//! Driver fatigue state tracking

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Immutable detection thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// EAR below this counts as a closed-eye frame
    pub ear_threshold: f64,
    /// Consecutive closed-eye frames before the drowsiness alert
    pub ear_consec_frames: u32,
    /// MAR above this counts as a yawning frame
    pub mar_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            ear_consec_frames: 48,
            mar_threshold: 0.75,
        }
    }
}

/// Eye state as reported per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EyeState {
    #[default]
    Open,
    Closed,
}

/// Eye sub-machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyePhase {
    #[default]
    Open,
    ClosedAccumulating,
    Alert,
}

/// Yawn sub-machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YawnPhase {
    #[default]
    Idle,
    Yawning,
}

/// Classified event emitted for one face on one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatigueEvent {
    EyesOpen,
    EyesClosed,
    /// Re-emitted on every frame the closed-eye run stays at or above the limit
    DrowsinessAlert,
    /// Display count only; the real counter moves on the falling edge
    YawningInProgress { provisional_count: u32 },
    YawnCompleted { count: u32 },
}

/// Per-face state, lives for the session
#[derive(Debug, Clone)]
pub struct FatigueState {
    /// Consecutive frames with EAR below threshold
    pub closed_eye_frames: u32,

    pub is_yawning: bool,

    /// Completed yawn gestures
    pub yawn_count: u32,

    /// `is_yawning` as of the previous classified frame
    pub previous_yawn_status: bool,

    /// Eye-closed flags for PERCLOS
    closure_history: VecDeque<bool>,
    closure_capacity: usize,
}

impl Default for FatigueState {
    fn default() -> Self {
        Self::with_perclos_window(DEFAULT_PERCLOS_WINDOW)
    }
}

/// ~1 minute at 15fps
pub const DEFAULT_PERCLOS_WINDOW: usize = 900;

impl FatigueState {
    pub fn with_perclos_window(frames: usize) -> Self {
        Self {
            closed_eye_frames: 0,
            is_yawning: false,
            yawn_count: 0,
            previous_yawn_status: false,
            closure_history: VecDeque::with_capacity(frames.min(DEFAULT_PERCLOS_WINDOW)),
            closure_capacity: frames,
        }
    }

    /// Calculate PERCLOS (Percentage of Eye Closure)
    /// Higher PERCLOS indicates drowsiness
    pub fn perclos(&self) -> f64 {
        if self.closure_history.is_empty() {
            return 0.0;
        }
        let closed = self.closure_history.iter().filter(|&&closed| closed).count();
        closed as f64 / self.closure_history.len() as f64
    }

    fn add_eye_sample(&mut self, closed: bool) {
        if self.closure_capacity == 0 {
            return;
        }
        if self.closure_history.len() >= self.closure_capacity {
            self.closure_history.pop_front();
        }
        self.closure_history.push_back(closed);
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::with_perclos_window(self.closure_capacity);
    }
}

/// Outcome of one classified frame
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub eye_state: EyeState,
    pub drowsiness_alert: bool,
    pub yawn_in_progress: bool,
    /// `yawn_count + 1` while yawning
    pub provisional_yawn_count: Option<u32>,
    pub yawn_count: u32,
    pub events: Vec<FatigueEvent>,
}

/// Debounced eye-closure and yawn detection for one face
#[derive(Debug, Clone)]
pub struct FatigueStateMachine {
    thresholds: Thresholds,
    state: FatigueState,
}

impl FatigueStateMachine {
    pub fn new(thresholds: Thresholds, perclos_window: usize) -> Self {
        Self {
            thresholds,
            state: FatigueState::with_perclos_window(perclos_window),
        }
    }

    pub fn state(&self) -> &FatigueState {
        &self.state
    }

    pub fn eye_phase(&self) -> EyePhase {
        match self.state.closed_eye_frames {
            0 => EyePhase::Open,
            n if n < self.thresholds.ear_consec_frames => EyePhase::ClosedAccumulating,
            _ => EyePhase::Alert,
        }
    }

    pub fn yawn_phase(&self) -> YawnPhase {
        if self.state.is_yawning {
            YawnPhase::Yawning
        } else {
            YawnPhase::Idle
        }
    }

    /// Advance both sub-machines by one frame
    ///
    /// Returns `None` without touching any state when either ratio is not
    /// finite.
    pub fn advance(&mut self, ear: f64, mar: f64) -> Option<Classification> {
        if !ear.is_finite() || !mar.is_finite() {
            return None;
        }

        let mut events = Vec::with_capacity(3);

        // Eye sub-machine
        let eye_state;
        let mut drowsiness_alert = false;
        if ear < self.thresholds.ear_threshold {
            self.state.closed_eye_frames = self.state.closed_eye_frames.saturating_add(1);
            eye_state = EyeState::Closed;
            events.push(FatigueEvent::EyesClosed);
            if self.state.closed_eye_frames >= self.thresholds.ear_consec_frames {
                drowsiness_alert = true;
                events.push(FatigueEvent::DrowsinessAlert);
            }
        } else {
            self.state.closed_eye_frames = 0;
            eye_state = EyeState::Open;
            events.push(FatigueEvent::EyesOpen);
        }
        self.state.add_eye_sample(eye_state == EyeState::Closed);

        // Yawn sub-machine
        self.state.previous_yawn_status = self.state.is_yawning;
        let mut provisional_yawn_count = None;
        if mar > self.thresholds.mar_threshold {
            self.state.is_yawning = true;
            let provisional = self.state.yawn_count + 1;
            provisional_yawn_count = Some(provisional);
            events.push(FatigueEvent::YawningInProgress {
                provisional_count: provisional,
            });
        } else {
            self.state.is_yawning = false;
        }

        if self.state.previous_yawn_status && !self.state.is_yawning {
            self.state.yawn_count += 1;
            events.push(FatigueEvent::YawnCompleted {
                count: self.state.yawn_count,
            });
        }

        Some(Classification {
            eye_state,
            drowsiness_alert,
            yawn_in_progress: self.state.is_yawning,
            provisional_yawn_count,
            yawn_count: self.state.yawn_count,
            events,
        })
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
