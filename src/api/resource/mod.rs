// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resource quantities.
//!
//! A [`Quantity`] is a fixed-point number kept as a signed count of nano-units.
//! That is enough to represent every suffix the API accepts (`n` through `E`,
//! `Ki` through `Ei`, and `e<exp>` notation) exactly, so comparisons and the
//! ratio arithmetic done by admission plugins never go through floating point.
//!
//! Two quantities are equal when their values are equal; the serialization
//! [`Format`] only affects how a quantity is printed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Nano-units per whole unit.
const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Nano-units per milli-unit.
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Longest digit run accepted before the mantissa could overflow an `i128`.
const MAX_MANTISSA_DIGITS: usize = 36;

/// Binary suffixes, indexed by power of 1024.
const BINARY_SUFFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Format is the notation a quantity was written in, and is printed back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Powers of ten with SI suffixes, e.g. `500m`, `5G`.
    #[default]
    DecimalSI,
    /// Powers of two with IEC suffixes, e.g. `512Mi`.
    BinarySI,
    /// Powers of ten written as exponents, e.g. `12e6`.
    DecimalExponent,
}

/// QuantityError is returned when a quantity string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// The string does not have the shape `<sign><number><suffix>`.
    #[error("quantity {0:?} must match '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'")]
    InvalidFormat(String),

    /// The suffix is not one of the known SI, IEC or exponent suffixes.
    #[error("unable to parse quantity's suffix {suffix:?} in {quantity:?}")]
    UnknownSuffix { quantity: String, suffix: String },

    /// The value does not fit the fixed-point representation.
    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
}

/// Quantity is an exact, fixed-point representation of a resource amount.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: Format,
}

enum Scale {
    Decimal(i32),
    Binary(u32),
}

impl Quantity {
    /// Create a quantity of `value` whole units, saturating at the bounds of
    /// the fixed-point representation.
    pub fn new(value: i128, format: Format) -> Self {
        Self {
            nanos: value.saturating_mul(NANOS_PER_UNIT),
            format,
        }
    }

    /// Create a quantity of `value` thousandths of a unit, saturating like
    /// [`Quantity::new`].
    pub fn new_milli(value: i128, format: Format) -> Self {
        Self {
            nanos: value.saturating_mul(NANOS_PER_MILLI),
            format,
        }
    }

    /// The notation this quantity is printed in.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns true if the quantity is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// The value in whole units, rounded up.
    pub fn value(&self) -> i128 {
        ceil_div(self.nanos, NANOS_PER_UNIT)
    }

    /// The value in milli-units, rounded up.
    pub fn milli_value(&self) -> i128 {
        ceil_div(self.nanos, NANOS_PER_MILLI)
    }

    fn from_parts(negative: bool, mantissa: i128, scale: Scale, frac_digits: i32) -> Option<i128> {
        // value = mantissa * multiplier * 10^(exp - frac_digits), stored in nanos.
        let (multiplier, exp) = match scale {
            Scale::Decimal(exp) => (1i128, exp),
            Scale::Binary(power) => (1024i128.checked_pow(power)?, 0),
        };
        let numerator = mantissa.checked_mul(multiplier)?;
        let shift = exp.checked_add(9)?.checked_sub(frac_digits)?;

        let magnitude = if shift >= 0 {
            numerator.checked_mul(10i128.checked_pow(shift as u32)?)?
        } else {
            match 10i128.checked_pow(shift.unsigned_abs()) {
                Some(divisor) => ceil_div(numerator, divisor),
                // Anything this small rounds up to a single nano-unit.
                None if numerator == 0 => 0,
                None => 1,
            }
        };
        Some(if negative { -magnitude } else { magnitude })
    }
}

fn ceil_div(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    if numerator % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

fn parse_suffix(quantity: &str, suffix: &str) -> Result<(Scale, Format), QuantityError> {
    let decimal = |exp: i32| -> Result<(Scale, Format), QuantityError> {
        Ok((Scale::Decimal(exp), Format::DecimalSI))
    };
    match suffix {
        "" => decimal(0),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        "k" => decimal(3),
        "M" => decimal(6),
        "G" => decimal(9),
        "T" => decimal(12),
        "P" => decimal(15),
        "E" => decimal(18),
        _ => {
            if let Some(power) = BINARY_SUFFIXES.iter().skip(1).position(|s| *s == suffix) {
                return Ok((Scale::Binary(power as u32 + 1), Format::BinarySI));
            }
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .and_then(|exp| exp.parse::<i32>().ok());
            match exponent {
                Some(exp) => Ok((Scale::Decimal(exp), Format::DecimalExponent)),
                None => Err(QuantityError::UnknownSuffix {
                    quantity: quantity.to_string(),
                    suffix: suffix.to_string(),
                }),
            }
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || QuantityError::InvalidFormat(s.to_string());

        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(invalid()),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid());
        }

        let digits = format!("{}{}", whole, fraction);
        let digits = digits.trim_start_matches('0');
        if digits.len() > MAX_MANTISSA_DIGITS {
            return Err(QuantityError::OutOfRange(s.to_string()));
        }
        let mantissa = if digits.is_empty() {
            0
        } else {
            digits.parse::<i128>().map_err(|_| invalid())?
        };

        let (scale, format) = parse_suffix(s, suffix)?;
        let nanos = Self::from_parts(negative, mantissa, scale, fraction.len() as i32)
            .ok_or_else(|| QuantityError::OutOfRange(s.to_string()))?;

        Ok(Self { nanos, format })
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return write!(f, "0");
        }
        let sign = if self.nanos < 0 { "-" } else { "" };
        let magnitude = self.nanos.unsigned_abs();

        if self.format == Format::BinarySI && magnitude % NANOS_PER_UNIT as u128 == 0 {
            let mut units = magnitude / NANOS_PER_UNIT as u128;
            let mut power = 0;
            while power < BINARY_SUFFIXES.len() - 1 && units % 1024 == 0 {
                units /= 1024;
                power += 1;
            }
            return write!(f, "{}{}{}", sign, units, BINARY_SUFFIXES[power]);
        }

        // Largest power of ten (in steps of three, between n and E) that divides evenly.
        let mut exp: i32 = -9;
        let mut scaled = magnitude;
        while exp < 18 && scaled % 1000 == 0 {
            scaled /= 1000;
            exp += 3;
        }

        if self.format == Format::DecimalExponent {
            return match exp {
                0 => write!(f, "{}{}", sign, scaled),
                _ => write!(f, "{}{}e{}", sign, scaled, exp),
            };
        }

        let suffix = match exp {
            -9 => "n",
            -6 => "u",
            -3 => "m",
            0 => "",
            3 => "k",
            6 => "M",
            9 => "G",
            12 => "T",
            15 => "P",
            _ => "E",
        };
        write!(f, "{}{}{}", sign, scaled, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_decimal_suffixes() {
        assert_eq!(q("500m").milli_value(), 500);
        assert_eq!(q("1").milli_value(), 1000);
        assert_eq!(q("2.5").milli_value(), 2500);
        assert_eq!(q("10567m").milli_value(), 10567);
        assert_eq!(q("1k").value(), 1000);
        assert_eq!(q("5G").value(), 5_000_000_000);
        assert_eq!(q("100u").milli_value(), 1);
        assert_eq!(q("1e3").value(), 1000);
        assert_eq!(q("1E3").value(), 1000);
        assert_eq!(q("1E").value(), 1_000_000_000_000_000_000);
        assert_eq!(q("+7").value(), 7);
        assert_eq!(q("-7").value(), -7);
        assert_eq!(q(".5").milli_value(), 500);
    }

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(q("1Ki").value(), 1024);
        assert_eq!(q("1Mi").value(), 1024 * 1024);
        assert_eq!(q("1Gi").value(), 1 << 30);
        assert_eq!(q("1Ti").value(), 1 << 40);
        assert_eq!(q("456Gi").value(), 456 * (1 << 30));
        assert_eq!(q("1Gi").format(), Format::BinarySI);
        assert_eq!(q("1G").format(), Format::DecimalSI);
        assert_eq!(q("1e9").format(), Format::DecimalExponent);
    }

    #[test]
    fn test_fractional_values_round_up() {
        // 1.024Mi is 1073741.824 bytes.
        assert_eq!(q("1.024Mi").value(), 1_073_742);
        assert_eq!(q("0.5m").milli_value(), 1);
        assert_eq!(q("1n").value(), 1);
        assert_eq!(q("-1.5").value(), -1);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(q_err(""), QuantityError::InvalidFormat(String::new()));
        assert!(matches!(q_err("Mi"), QuantityError::InvalidFormat(_)));
        assert!(matches!(q_err("1.2.3"), QuantityError::InvalidFormat(_)));
        assert!(matches!(q_err("asdfasdfasdF"), QuantityError::InvalidFormat(_)));
        assert!(matches!(q_err("1Xi"), QuantityError::UnknownSuffix { .. }));
        assert!(matches!(q_err("1 Gi"), QuantityError::UnknownSuffix { .. }));
        assert!(matches!(q_err("1e400"), QuantityError::OutOfRange(_)));
        assert!(matches!(
            q_err("1234567890123456789012345678901234567890"),
            QuantityError::OutOfRange(_)
        ));
    }

    fn q_err(s: &str) -> QuantityError {
        s.parse::<Quantity>().unwrap_err()
    }

    #[test]
    fn test_equality_ignores_format() {
        assert_eq!(q("1"), q("1000m"));
        assert_eq!(q("1Ki"), q("1024"));
        assert_eq!(q("2.5"), Quantity::new_milli(2500, Format::DecimalSI));
        assert_ne!(q("1Mi"), q("1M"));
        assert!(q("678m") > q("567m"));
        assert!(q("456Gi") < q("700Gi"));
    }

    #[test]
    fn test_display() {
        assert_eq!(q("1Gi").to_string(), "1Gi");
        assert_eq!(q("1024Mi").to_string(), "1Gi");
        assert_eq!(q("307Mi").to_string(), "307Mi");
        assert_eq!(q("1000m").to_string(), "1");
        assert_eq!(q("2.5").to_string(), "2500m");
        assert_eq!(q("1500").to_string(), "1500");
        assert_eq!(q("5000").to_string(), "5k");
        assert_eq!(q("0").to_string(), "0");
        assert_eq!(q("-250m").to_string(), "-250m");
        assert_eq!(q("12e6").to_string(), "12e6");
        assert_eq!(Quantity::new(1536, Format::BinarySI).to_string(), "1536");
        assert_eq!(Quantity::new(1 << 20, Format::BinarySI).to_string(), "1Mi");
    }

    #[test]
    fn test_display_parses_back_to_same_value() {
        for s in ["1.024Mi", "10567m", "1Ti", "3e-3", "0.1"] {
            let original = q(s);
            assert_eq!(q(&original.to_string()), original, "{}", s);
        }
    }

    #[test]
    fn test_accessors_do_not_narrow() {
        let huge = q("100E");
        assert_eq!(huge.value(), 100_000_000_000_000_000_000);
        assert_eq!(huge.milli_value(), 100_000_000_000_000_000_000_000);
        assert_eq!(q("100Ei").value(), 100 * (1i128 << 60));
        assert!(q("0").is_zero());
        assert!(!q("1n").is_zero());
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Quantity::new(50 * (1i128 << 60), Format::BinarySI), q("50Ei"));
        assert_eq!(Quantity::new(50 * (1i128 << 60), Format::BinarySI).to_string(), "50Ei");
        assert_eq!(Quantity::new_milli(-1500, Format::DecimalSI), q("-1.5"));

        let saturated = Quantity::new(i128::MAX, Format::DecimalSI);
        assert_eq!(saturated.value(), i128::MAX / 1_000_000_000 + 1);
    }
}
