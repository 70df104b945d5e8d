//! Domain utilities

pub mod description_parser;
