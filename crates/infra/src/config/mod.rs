//! Configuration loading and management
//!
//! Configuration comes from an optional TOML or JSON file, layered under
//! `CALRECON_*` environment overrides.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_env_overrides, load, load_from_file, probe_config_paths};
