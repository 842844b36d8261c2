//! Core aptop library: powermetrics supervision, parsing and rendering.
//!
//! - `rules`: metric extraction table
//! - `parser`: frame → `MetricSet`
//! - `segmenter`: byte stream → frames
//! - `supervisor`: probe process lifecycle
//! - `render`: `MetricSet` → terminal report
//! - `monitor`: the loop wiring everything together
//! - `interrupt`: Ctrl+C / SIGTERM → cancellation
//! - `config`, `logging`, `failure`: ambient plumbing

pub mod config;
pub mod failure;
pub mod interrupt;
pub mod logging;
pub mod monitor;
pub mod parser;
pub mod render;
pub mod rules;
pub mod segmenter;
pub mod supervisor;
