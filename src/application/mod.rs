//! Application Layer
//!
//! Wires the domain rules to the ports: the detection engine owns the watcher
//! set and turns candidate batches into matches and purchase attempts.

pub mod detection;

pub use detection::{
    CycleReport, DetectionConfig, DetectionEngine, DetectionPorts, DetectionStats,
    DetectionTransition,
};
