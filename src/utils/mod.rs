//! Utility Module
//!
//! - [`Clock`]: frame clock reporting elapsed milliseconds
//! - [`interner`]: string interning for shader define symbols

pub mod interner;
pub mod time;

pub use interner::Symbol;
pub use time::Clock;
