//! Field extraction: pattern sets, matching, coercion and record building.

mod builder;
pub mod coerce;
mod extractor;
mod patterns;

pub use builder::{RecordBuilder, merge_pages};
pub use extractor::{FieldExtractor, FieldMatch, FieldMatches, match_field};
pub use patterns::{ExtractionPattern, PatternDef, PatternSet, PatternSetDef};
