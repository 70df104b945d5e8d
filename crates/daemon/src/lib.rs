//! # calrecon daemon
//!
//! Process wiring for the reconciliation engine.
//!
//! This crate contains:
//! - The application context (dependency injection)
//! - The `calrecon` binary entry point
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Builds the infra adapters, hands them to the engine and drives the
//!   engine through the cycle scheduler

pub mod context;

pub use context::AppContext;
