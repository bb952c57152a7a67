pub mod error;
pub mod explorer;
pub mod extract;
pub mod frontier;
pub mod outcome;

pub use error::ExploreError;
pub use explorer::{Explorer, ProgressCallback};
pub use extract::{Extractor, FixtureExtractor, HttpExtractor, Node};
pub use frontier::Frontier;
pub use outcome::{ExploreOutcome, ExploreStats};
