//! Core domain + resolution logic for the PIN code delivery bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the CSV-backed
//! reference data live behind ports (traits) implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod exclusion;
pub mod formatting;
pub mod logging;
pub mod ports;
pub mod report;
pub mod resolver;

pub use errors::{Error, Result};
