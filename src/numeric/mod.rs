//! Currency numbers
//!
//! - `decimal`: mantissa/exponent value type that never overflows to `inf`
//! - `format`: display strings under a player-selected notation

pub mod decimal;
pub mod format;

pub use decimal::{Decimal, DecimalParts, MAX_EXPONENT, ParseDecimalError};
pub use format::{INFINITE_GLYPH, Notation, STANDARD_SUFFIXES, format};
