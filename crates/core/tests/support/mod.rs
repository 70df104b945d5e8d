//! Shared test helpers for `calrecon-core` integration tests.
//!
//! In-memory port implementations with the same uniqueness and lifecycle
//! rules as the SQLite store, plus fixtures for feed and calendar events.

#![allow(dead_code)]

pub mod calendar;
pub mod feed;
pub mod fixtures;
pub mod store;
pub mod suppressions;
