//! Domain types for circle tracking

pub mod bar;
pub mod evaluation;
pub mod marks;
pub mod state;
pub mod timeframe;

pub use bar::{Bar, MarkedBar};
pub use evaluation::{round3, EvaluationResult};
pub use marks::{InvalidTurn, Turn};
pub use state::{State, UnknownState};
pub use timeframe::Timeframe;

/// Instrument code type alias
pub type Code = String;
