//!
//! Utility module for the marketplace sync layer.
//!
//! Re-exports amount formatting helpers for use throughout the codebase.
/// Base-unit amount conversion
pub mod units;

pub use units::{UnitsError, VITE_DECIMALS, format_units, parse_units};
