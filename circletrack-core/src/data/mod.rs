//! Bar sources: the trait, range selection and concrete implementations.

pub mod csv_source;
pub mod provider;
pub mod replay;
pub mod synthetic;

pub use csv_source::CsvBarSource;
pub use provider::{BarSource, DataError, FetchRange};
pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;
