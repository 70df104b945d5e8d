//! # calrecon Domain
//!
//! Business domain types for the calendar reconciliation engine.
//!
//! This crate contains:
//! - Event records, identities, suppression entries and cycle summaries
//! - The error taxonomy and Result alias
//! - Configuration structures and their defaults
//! - The versioned description parser
//!
//! ## Architecture
//! - No dependencies on other calrecon crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::description_parser::{parse_reservation_id, PARSER_VERSION};
