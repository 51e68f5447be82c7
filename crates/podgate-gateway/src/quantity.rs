//! Orchestrator resource quantities.
//!
//! `k8s_openapi` carries quantities as opaque strings, so a malformed value
//! would only surface when the API server rejects the whole pod. This module
//! checks the quantity grammar up front:
//!
//! ```text
//! <quantity>        ::= <signedNumber><suffix>
//! <signedNumber>    ::= <number> | <sign><number>
//! <number>          ::= <digits> | <digits>.<digits> | <digits>. | .<digits>
//! <suffix>          ::= <binarySI> | <decimalExponent> | <decimalSI>
//! <binarySI>        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! <decimalSI>       ::= m | "" | k | M | G | T | P | E
//! <decimalExponent> ::= "e" <signedNumber> | "E" <signedNumber>
//! ```

use std::fmt;
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

const BINARY_SI: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SI: [&str; 8] = ["", "m", "k", "M", "G", "T", "P", "E"];

/// Reasons a string is not a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Nothing to parse.
    #[error("quantity is empty")]
    Empty,

    /// No digits before the suffix.
    #[error("expected a number")]
    MissingNumber,

    /// The suffix is not a known unit or exponent.
    #[error("unknown suffix '{0}'")]
    InvalidSuffix(String),
}

/// A syntactically valid resource quantity such as `500m` or `256Mi`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuantity {
    raw: String,
    negative: bool,
    zero: bool,
}

impl ResourceQuantity {
    /// The quantity exactly as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the value carries a minus sign and a non-zero magnitude.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative && !self.zero
    }

    /// Whether the numeric part is zero, whatever the unit.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.zero
    }
}

impl FromStr for ResourceQuantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, unsigned) = split_sign(s);
        let (digits, suffix) = split_number(unsigned);
        if !digits.bytes().any(|b| b.is_ascii_digit()) {
            return Err(QuantityError::MissingNumber);
        }
        if !is_valid_suffix(suffix) {
            return Err(QuantityError::InvalidSuffix(suffix.to_string()));
        }

        Ok(Self {
            raw: s.to_string(),
            negative,
            zero: digits.bytes().all(|b| b == b'0' || b == b'.'),
        })
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<ResourceQuantity> for Quantity {
    fn from(q: ResourceQuantity) -> Self {
        Quantity(q.raw)
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s))
    }
}

/// Split `<number><suffix>`, allowing at most one decimal point.
fn split_number(s: &str) -> (&str, &str) {
    let mut seen_dot = false;
    let end = s
        .char_indices()
        .find(|&(_, c)| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                false
            } else {
                !c.is_ascii_digit()
            }
        })
        .map_or(s.len(), |(i, _)| i);
    s.split_at(end)
}

fn is_valid_suffix(suffix: &str) -> bool {
    if BINARY_SI.contains(&suffix) || DECIMAL_SI.contains(&suffix) {
        return true;
    }
    // Exponent form; a bare "E" was already accepted as exa above.
    suffix
        .strip_prefix(['e', 'E'])
        .map(|exp| split_sign(exp).1)
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<ResourceQuantity, QuantityError> {
        s.parse()
    }

    #[test]
    fn accepts_common_quantities() {
        for q in [
            "500m", "1", "0.5", "2.", ".25", "256Mi", "1Gi", "128974848", "129e6", "129M",
            "1E", "1e-3", "+3k", "1Ei",
        ] {
            assert!(parse(q).is_ok(), "{q} should parse");
        }
    }

    #[test]
    fn rejects_malformed_quantities() {
        assert_eq!(parse(""), Err(QuantityError::Empty));
        assert_eq!(parse("bogus"), Err(QuantityError::MissingNumber));
        assert_eq!(parse("Mi"), Err(QuantityError::MissingNumber));
        assert_eq!(parse("."), Err(QuantityError::MissingNumber));
        assert_eq!(
            parse("256MB"),
            Err(QuantityError::InvalidSuffix("MB".to_string()))
        );
        assert_eq!(
            parse("1.2.3"),
            Err(QuantityError::InvalidSuffix(".3".to_string()))
        );
    }

    #[test]
    fn bare_lowercase_exponent_rejected() {
        // "e" alone is neither a decimal SI unit nor a complete exponent.
        assert_eq!(parse("1e"), Err(QuantityError::InvalidSuffix("e".to_string())));
    }

    #[test]
    fn zero_and_sign() {
        assert!(parse("0").unwrap().is_zero());
        assert!(parse("0.0Mi").unwrap().is_zero());
        assert!(!parse("0.1").unwrap().is_zero());

        assert!(parse("-1").unwrap().is_negative());
        assert!(!parse("-0").unwrap().is_negative());
        assert!(!parse("+1").unwrap().is_negative());
    }

    #[test]
    fn converts_to_k8s_quantity() {
        let q: Quantity = parse("256Mi").unwrap().into();
        assert_eq!(q, Quantity("256Mi".to_string()));
    }
}
