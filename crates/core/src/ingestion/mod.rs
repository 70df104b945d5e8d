//! Feed ingestion: window splitting, normalization and suppression filtering

pub mod adapter;
pub mod normalize;
pub mod windows;

pub use adapter::{IngestItem, IngestionAdapter};
pub use normalize::{normalize, Normalized};
pub use windows::split_windows;
