//! Circletrack Core: pivot detection, circle classification and trend-state
//! estimation over daily and weekly bars.
//!
//! This crate contains everything needed to evaluate one instrument:
//! - Domain types (bars, annotated bars, states, evaluation results)
//! - The four-phase analysis pipeline (pivot → circle → validate → estimate)
//! - The incremental archive contract and its CSV and in-memory stores
//! - Bar sources (CSV resources, replay, synthetic random walk)
//! - Trading calendar and session-window policy
//! - The evaluator tying fetch, analysis and checkpointing together

pub mod analysis;
pub mod archive;
pub mod calendar;
pub mod data;
pub mod domain;
pub mod evaluator;
pub mod session;

pub use evaluator::{evaluate_bars, Evaluator};
