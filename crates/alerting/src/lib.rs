//! Alerting System
//!
//! Decides when a raised alert should sound an alarm. Alerts are keyed by
//! name (e.g. `face-0/drowsiness`) and clocked by frame sequence.

mod manager;

pub use manager::{AlertConfig, AlertManager, AlertState};
