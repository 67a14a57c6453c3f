//! Arbitrary-magnitude decimal numbers
//!
//! Idle currencies outgrow `f64` within days of play. A `Decimal` keeps a
//! normalized `f64` mantissa and an `i64` exponent, so values stay finite,
//! ordered and serializable at any magnitude.
//!
//! Every constructor and operation returns a normalized value:
//! `1 <= |mantissa| < 10`, or exactly zero (`mantissa = 0.0, exponent = 0`).

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Largest exponent a Decimal carries; beyond it values saturate
pub const MAX_EXPONENT: i64 = 9_000_000_000_000_000;

/// Digits an f64 mantissa can hold; smaller addends further apart vanish
const MAX_SIGNIFICANT_DIGITS: i64 = 17;

/// From this exponent on every representable value is an integer
const INTEGRAL_EXPONENT: i64 = 16;

/// Range of the cached power-of-ten table (f64 subnormal floor to overflow)
const POW10_MIN: i64 = -323;
const POW10_MAX: i64 = 308;

/// Correctly rounded 10^exponent, `0` / `inf` outside the f64 range
fn pow10(exponent: i64) -> f64 {
    static POWERS: OnceLock<Vec<f64>> = OnceLock::new();
    if exponent > POW10_MAX {
        return f64::INFINITY;
    }
    if exponent < POW10_MIN {
        return 0.0;
    }
    let powers = POWERS.get_or_init(|| {
        (POW10_MIN..=POW10_MAX)
            .map(|e| format!("1e{e}").parse().unwrap_or(0.0))
            .collect()
    });
    powers[(exponent - POW10_MIN) as usize]
}

/// Multiply by 10^k, splitting the factor so subnormal inputs survive
fn scale(value: f64, k: i64) -> f64 {
    if k > POW10_MAX {
        value * pow10(k - POW10_MAX) * pow10(POW10_MAX)
    } else if k >= 0 {
        value * pow10(k)
    } else if k >= -POW10_MAX {
        value / pow10(-k)
    } else {
        value / pow10(POW10_MAX) / pow10(-k - POW10_MAX)
    }
}

/// A currency-grade number: `mantissa × 10^exponent`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "DecimalParts", into = "DecimalParts")]
pub struct Decimal {
    mantissa: f64,
    exponent: i64,
}

/// Plain storage form of a Decimal: `{"mantissa": f64, "exponent": i64}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecimalParts {
    pub mantissa: f64,
    pub exponent: i64,
}

impl From<DecimalParts> for Decimal {
    fn from(parts: DecimalParts) -> Self {
        Decimal::from_parts(parts.mantissa, parts.exponent)
    }
}

impl From<Decimal> for DecimalParts {
    fn from(value: Decimal) -> Self {
        Self {
            mantissa: value.mantissa,
            exponent: value.exponent,
        }
    }
}

/// Error returned when a string is not a decimal number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal literal: {input:?}")]
pub struct ParseDecimalError {
    input: String,
}

impl ParseDecimalError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0.0,
        exponent: 0,
    };
    pub const ONE: Decimal = Decimal {
        mantissa: 1.0,
        exponent: 0,
    };
    /// Saturated positive value; stands in for `+inf`
    pub const MAX: Decimal = Decimal {
        mantissa: 9.999_999_999_999_998,
        exponent: MAX_EXPONENT,
    };
    /// Saturated negative value; stands in for `-inf`
    pub const MIN: Decimal = Decimal {
        mantissa: -9.999_999_999_999_998,
        exponent: MAX_EXPONENT,
    };

    /// Build from a raw mantissa/exponent pair, normalizing it.
    ///
    /// Non-finite mantissas clamp to [`Decimal::MAX`] / [`Decimal::MIN`] by sign.
    pub fn from_parts(mantissa: f64, exponent: i64) -> Self {
        if !mantissa.is_finite() {
            return Self::saturated(mantissa.is_sign_negative());
        }
        if mantissa == 0.0 {
            return Self::ZERO;
        }

        let shift = mantissa.abs().log10().floor() as i64;
        let mut m = if shift == 0 {
            mantissa
        } else {
            scale(mantissa, -shift)
        };
        let mut e = exponent.saturating_add(shift);

        // log10 can land one step off near exact powers of ten
        if m.abs() >= 10.0 {
            m /= 10.0;
            e = e.saturating_add(1);
        } else if m.abs() < 1.0 {
            m *= 10.0;
            e = e.saturating_sub(1);
        }

        if e > MAX_EXPONENT {
            Self::saturated(m < 0.0)
        } else if e < -MAX_EXPONENT {
            Self::ZERO
        } else {
            Self {
                mantissa: m,
                exponent: e,
            }
        }
    }

    fn saturated(negative: bool) -> Self {
        if negative { Self::MIN } else { Self::MAX }
    }

    /// Build from a base-10 logarithm, e.g. the result of `pow`
    fn from_log10(log: f64, negative: bool) -> Self {
        if log.is_nan() || log >= (MAX_EXPONENT + 1) as f64 {
            return Self::saturated(negative);
        }
        if log < -(MAX_EXPONENT as f64) {
            return Self::ZERO;
        }
        let exponent = log.floor();
        let mantissa = 10f64.powf(log - exponent);
        Self::from_parts(if negative { -mantissa } else { mantissa }, exponent as i64)
    }

    pub fn mantissa(&self) -> f64 {
        self.mantissa
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0.0
    }

    /// Whether the value hit the magnitude ceiling (displayed as infinite)
    pub fn is_saturated(&self) -> bool {
        self.exponent >= MAX_EXPONENT
    }

    pub fn abs(self) -> Self {
        Self {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    /// Raise to a real power.
    ///
    /// `0^p` is zero for every `p != 0` (negative powers follow the
    /// divide-by-zero rule). Negative bases with fractional powers yield zero.
    pub fn pow(self, power: f64) -> Self {
        if power == 0.0 {
            return Self::ONE;
        }
        if self.is_zero() {
            return Self::ZERO;
        }

        let integral = power.fract() == 0.0;
        if self.is_negative() && !integral {
            return Self::ZERO;
        }
        let negative = self.is_negative() && integral && (power % 2.0).abs() == 1.0;
        let base = self.mantissa.abs();

        // Integral powers keep the exponent exact while the mantissa fits
        if integral {
            let mantissa = base.powf(power);
            let exponent = self.exponent as f64 * power;
            if mantissa.is_finite() && mantissa != 0.0 && exponent.abs() <= MAX_EXPONENT as f64 {
                let mantissa = if negative { -mantissa } else { mantissa };
                return Self::from_parts(mantissa, exponent as i64);
            }
        }

        Self::from_log10(power * (base.log10() + self.exponent as f64), negative)
    }

    /// Square root; negative inputs yield zero
    pub fn sqrt(self) -> Self {
        if self.mantissa <= 0.0 {
            return Self::ZERO;
        }
        if self.exponent.rem_euclid(2) == 0 {
            Self::from_parts(self.mantissa.sqrt(), self.exponent / 2)
        } else {
            Self::from_parts((self.mantissa * 10.0).sqrt(), (self.exponent - 1).div_euclid(2))
        }
    }

    /// Base-10 logarithm; non-positive inputs yield [`Decimal::MIN`]
    pub fn log10(self) -> Self {
        if self.mantissa <= 0.0 {
            return Self::MIN;
        }
        Self::from(self.exponent as f64 + self.mantissa.log10())
    }

    /// Natural logarithm; non-positive inputs yield [`Decimal::MIN`]
    pub fn ln(self) -> Self {
        if self.mantissa <= 0.0 {
            return Self::MIN;
        }
        Self::from((self.exponent as f64 + self.mantissa.log10()) * std::f64::consts::LN_10)
    }

    pub fn floor(self) -> Self {
        if self.exponent >= INTEGRAL_EXPONENT || self.is_zero() {
            return self;
        }
        if self.exponent < 0 {
            return if self.is_negative() { -Self::ONE } else { Self::ZERO };
        }
        Self::from(self.exact_number().floor())
    }

    pub fn ceil(self) -> Self {
        if self.exponent >= INTEGRAL_EXPONENT || self.is_zero() {
            return self;
        }
        if self.exponent < 0 {
            return if self.is_negative() { Self::ZERO } else { Self::ONE };
        }
        Self::from(self.exact_number().ceil())
    }

    /// Round half away from zero
    pub fn round(self) -> Self {
        if self.exponent >= INTEGRAL_EXPONENT || self.is_zero() {
            return self;
        }
        Self::from(self.exact_number().round())
    }

    /// Native value for `|exponent| < 16`, parsed from the shortest mantissa
    /// text so integers come back exact. `scale` can land one ulp below an
    /// integer, which `floor` would turn into a whole unit.
    fn exact_number(self) -> f64 {
        format!("{}e{}", self.mantissa, self.exponent)
            .parse()
            .unwrap_or_else(|_| self.to_number())
    }

    /// Lossy conversion for display math (positions, bar widths).
    ///
    /// May return `±inf` or `0.0`; never feed the result back into currency state.
    pub fn to_number(self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        if self.exponent > POW10_MAX {
            return if self.is_negative() {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        scale(self.mantissa, self.exponent)
    }

    /// Storage form, `{"mantissa": .., "exponent": ..}`
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "mantissa": self.mantissa,
            "exponent": self.exponent,
        })
    }

    /// Inverse of [`Decimal::to_json`]; bit-exact for normalized input
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        DecimalParts::deserialize(value).map(Self::from)
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for Decimal {
    fn from(value: f64) -> Self {
        Self::from_parts(value, 0)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Self::from(value as f64)
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Self::from(value as f64)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from(value as f64)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Self::from(value as f64)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Accepts `123.45`, `-1.5e300`, `1e1000000`, long digit strings beyond
    /// f64 range, and `Infinity` / `NaN` (clamped like native inputs).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        match s {
            "Infinity" | "+Infinity" | "inf" | "+inf" | "NaN" => return Ok(Self::MAX),
            "-Infinity" | "-inf" => return Ok(Self::MIN),
            _ => {}
        }

        let (coefficient, exp) = match s.find(['e', 'E']) {
            Some(i) => {
                let exp = s[i + 1..]
                    .parse::<i64>()
                    .map_err(|_| ParseDecimalError::new(input))?;
                (&s[..i], exp)
            }
            None => (s, 0),
        };

        let (negative, digits) = match coefficient.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, coefficient.strip_prefix('+').unwrap_or(coefficient)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError::new(input));
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(ParseDecimalError::new(input));
        }

        let all: Vec<u8> = int_part.bytes().chain(frac_part.bytes()).collect();
        let Some(first) = all.iter().position(|&b| b != b'0') else {
            return Ok(Self::ZERO);
        };

        // Leading significant digits only; the rest is below f64 precision
        let end = (first + MAX_SIGNIFICANT_DIGITS as usize).min(all.len());
        let mut significand = String::with_capacity(end - first + 3);
        significand.push(all[first] as char);
        significand.push('.');
        significand.extend(all[first + 1..end].iter().map(|&b| b as char));
        if end == first + 1 {
            significand.push('0');
        }
        let mantissa: f64 = significand
            .parse()
            .map_err(|_| ParseDecimalError::new(input))?;

        let exponent = (int_part.len() as i64 - first as i64 - 1).saturating_add(exp);
        Ok(Self::from_parts(
            if negative { -mantissa } else { mantissa },
            exponent,
        ))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let sign = |d: &Decimal| {
            if d.mantissa > 0.0 {
                1
            } else if d.mantissa < 0.0 {
                -1
            } else {
                0
            }
        };
        let (a, b) = (sign(self), sign(other));
        if a != b || a == 0 {
            return a.cmp(&b);
        }
        let magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then_with(|| self.mantissa.abs().total_cmp(&other.mantissa.abs()));
        if a > 0 { magnitude } else { magnitude.reverse() }
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        if self.is_zero() {
            return self;
        }
        Decimal {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let gap = big.exponent - small.exponent;
        if gap > MAX_SIGNIFICANT_DIGITS {
            return big;
        }
        Decimal::from_parts(big.mantissa + scale(small.mantissa, -gap), big.exponent)
    }
}

impl Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        self + (-rhs)
    }
}

impl Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal::from_parts(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }
}

impl Div for Decimal {
    type Output = Decimal;

    /// Division by zero yields zero so per-tick rate math never has to branch.
    fn div(self, rhs: Decimal) -> Decimal {
        if rhs.is_zero() {
            return Decimal::ZERO;
        }
        Decimal::from_parts(
            self.mantissa / rhs.mantissa,
            self.exponent.saturating_sub(rhs.exponent),
        )
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        *self = *self + rhs;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        *self = *self - rhs;
    }
}

impl MulAssign for Decimal {
    fn mul_assign(&mut self, rhs: Decimal) {
        *self = *self * rhs;
    }
}

impl DivAssign for Decimal {
    fn div_assign(&mut self, rhs: Decimal) {
        *self = *self / rhs;
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::ZERO, |acc, value| acc + value)
    }
}
