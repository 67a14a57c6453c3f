//! Human-readable number formatting
//!
//! Magnitudes under 1000 print as trimmed fixed-point; larger values print a
//! two-decimal mantissa under the selected [`Notation`].

use serde::{Deserialize, Serialize};

use super::decimal::Decimal;

/// Suffixes for the standard notation, one per power of 1000 (up to 10^93)
pub const STANDARD_SUFFIXES: [&str; 32] = [
    "", "K", "M", "B", "T", "Qa", "Qi", "Sx", "Sp", "Oc", "No", "Dc", "UDc", "DDc", "TDc", "QaDc",
    "QiDc", "SxDc", "SpDc", "OcDc", "NoDc", "Vg", "UVg", "DVg", "TVg", "QaVg", "QiVg", "SxVg",
    "SpVg", "OcVg", "NoVg", "Tg",
];

/// Rendered in place of saturated values
pub const INFINITE_GLYPH: &str = "∞";

/// Decimal places shown for mantissas and small values
const DECIMALS: i32 = 2;

/// Number notation selected by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Notation {
    /// K, M, B, T, ... suffixes; scientific beyond the table
    #[default]
    Standard,
    /// `1.23e45`
    Scientific,
    /// Exponent grouped by three: `123.45e42`
    Engineering,
    /// a, b, ..., z, aa, ab, ... per power of 1000
    Letters,
}

impl Notation {
    pub const ALL: [Notation; 4] = [
        Notation::Standard,
        Notation::Scientific,
        Notation::Engineering,
        Notation::Letters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Notation::Standard => "Standard",
            Notation::Scientific => "Scientific",
            Notation::Engineering => "Engineering",
            Notation::Letters => "Letters",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "std" => Some(Notation::Standard),
            "scientific" | "sci" => Some(Notation::Scientific),
            "engineering" | "eng" => Some(Notation::Engineering),
            "letters" | "letter" => Some(Notation::Letters),
            _ => None,
        }
    }

    /// Format a value under this notation
    pub fn format(&self, value: &Decimal) -> String {
        if value.is_saturated() {
            return if value.is_negative() {
                format!("-{INFINITE_GLYPH}")
            } else {
                INFINITE_GLYPH.to_string()
            };
        }

        let magnitude = value.abs();
        let sign = if value.is_negative() { "-" } else { "" };

        if magnitude.exponent() < 3 {
            let fixed = round_to_decimals(magnitude.to_number());
            if fixed == 0.0 {
                return "0".to_string();
            }
            if fixed < 1000.0 {
                return format!("{sign}{}", trim_fixed(fixed));
            }
        }

        let body = match self {
            Notation::Standard => standard(&magnitude),
            Notation::Scientific => scientific(&magnitude),
            Notation::Engineering => {
                let (mantissa, group) = grouped(&magnitude);
                format!("{mantissa:.2}e{}", group * 3)
            }
            Notation::Letters => {
                let (mantissa, group) = grouped(&magnitude);
                format!("{mantissa:.2}{}", letter_suffix(group))
            }
        };
        format!("{sign}{body}")
    }
}

/// Format with the standard suffix table
pub fn format(value: &Decimal) -> String {
    Notation::Standard.format(value)
}

fn round_to_decimals(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMALS);
    (value * factor).round() / factor
}

/// `12.50` -> `12.5`, `999.00` -> `999`
fn trim_fixed(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Split a non-negative value into a rounded mantissa in `[1, 1000)` and
/// its power-of-1000 group, carrying when rounding reaches 1000.
fn grouped(magnitude: &Decimal) -> (f64, i64) {
    let exponent = magnitude.exponent();
    let mut group = exponent.div_euclid(3);
    let shift = exponent.rem_euclid(3) as i32;
    let mut mantissa = round_to_decimals(magnitude.mantissa() * 10f64.powi(shift));
    if mantissa >= 1000.0 {
        mantissa = round_to_decimals(mantissa / 1000.0);
        group += 1;
    }
    (mantissa, group)
}

fn standard(magnitude: &Decimal) -> String {
    let (mantissa, group) = grouped(magnitude);
    match usize::try_from(group)
        .ok()
        .and_then(|index| STANDARD_SUFFIXES.get(index))
    {
        Some(suffix) => format!("{mantissa:.2}{suffix}"),
        None => scientific(magnitude),
    }
}

fn scientific(magnitude: &Decimal) -> String {
    let mut mantissa = round_to_decimals(magnitude.mantissa());
    let mut exponent = magnitude.exponent();
    if mantissa >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }
    format!("{mantissa:.2}e{exponent}")
}

/// Spreadsheet-style column letters: 1 -> a, 26 -> z, 27 -> aa
fn letter_suffix(group: i64) -> String {
    let mut n = group;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}
