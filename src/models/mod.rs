//! Data models shared by the data-access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod row;
pub mod value;

// Re-export commonly used types
pub use connection::{DatabaseType, Dialect};
pub use row::{ExecResult, Row};
pub use value::{FromValue, HasKind, Kind, Value};
