//! Search query engine: boolean query parsing, meta-field filters and
//! scored keyword search across spaces.

pub mod filters;
pub mod parser;
pub mod search;

pub use filters::{FieldSource, FilterMatcher};
pub use parser::{levenshtein_distance, Query, WildcardPattern};
pub use search::{
    FuzzyOptions, SearchEngine, SearchHit, SearchOptions, SearchResponse, SearchSource, SortBy,
};
