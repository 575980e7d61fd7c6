pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod registry;
pub mod table;

pub use error::{ErrorKind, ExtractionError, FetchError, Stage, TableError};
pub use extract::{ExtractionResult, Extractor};
pub use fetch::{Fetch, FetchConfig, HttpFetcher, RawDocument};
pub use normalize::{normalize, Record};
pub use registry::{Registry, SourceDescriptor, StrategyVariant};
pub use table::{parse_generic, parse_structural, TableMatrix};
