//! Operand bit codec
//!
//! An operand is a 16-bit field split into named bit ranges. Each range holds
//! one operand argument, optionally transformed by a [`Formula`] before it is
//! stored and optionally restricted to a set of valid raw values.

use crate::formula::Formula;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits in an operand
pub const OPERAND_BITS: u8 = 16;

/// An inclusive bit range `[lo, hi]` inside a 16-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; 2]", into = "[u8; 2]")]
pub struct BitRange {
    lo: u8,
    hi: u8,
}

impl BitRange {
    /// Create a bit range, rejecting ranges outside the operand or with `lo > hi`
    pub fn new(lo: u8, hi: u8) -> Result<Self, String> {
        if lo > hi {
            return Err(format!("bit range [{}, {}] has lo > hi", lo, hi));
        }
        if hi >= OPERAND_BITS {
            return Err(format!(
                "bit range [{}, {}] exceeds the {}-bit operand",
                lo, hi, OPERAND_BITS
            ));
        }
        Ok(Self { lo, hi })
    }

    /// Lowest bit (inclusive)
    pub fn lo(&self) -> u8 {
        self.lo
    }

    /// Highest bit (inclusive)
    pub fn hi(&self) -> u8 {
        self.hi
    }

    /// Number of bits covered
    pub fn width(&self) -> u8 {
        self.hi - self.lo + 1
    }

    /// Largest value the range can store
    pub fn max_value(&self) -> u32 {
        (1u32 << self.width()) - 1
    }

    /// Mask of the range positioned inside the operand
    pub fn mask(&self) -> u32 {
        self.max_value() << self.lo
    }

    /// Whether two ranges share at least one bit
    pub fn overlaps(&self, other: &BitRange) -> bool {
        self.mask() & other.mask() != 0
    }
}

impl TryFrom<[u8; 2]> for BitRange {
    type Error = String;

    fn try_from(value: [u8; 2]) -> Result<Self, Self::Error> {
        BitRange::new(value[0], value[1])
    }
}

impl From<BitRange> for [u8; 2] {
    fn from(range: BitRange) -> Self {
        [range.lo, range.hi]
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

/// An inclusive `[min, max]` range of accepted raw argument values.
///
/// Serialized as `[v]` for a single value or `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct ValidRange {
    /// Smallest accepted value
    pub min: u32,
    /// Largest accepted value
    pub max: u32,
}

impl ValidRange {
    /// Whether `value` lies inside the range
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

impl TryFrom<Vec<u32>> for ValidRange {
    type Error = String;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [single] => Ok(ValidRange {
                min: *single,
                max: *single,
            }),
            [min, max] if min <= max => Ok(ValidRange {
                min: *min,
                max: *max,
            }),
            [min, max] => Err(format!("valid range [{}, {}] has min > max", min, max)),
            _ => Err(format!(
                "valid range must have 1 or 2 elements, found {}",
                value.len()
            )),
        }
    }
}

impl From<ValidRange> for Vec<u32> {
    fn from(range: ValidRange) -> Self {
        if range.min == range.max {
            vec![range.min]
        } else {
            vec![range.min, range.max]
        }
    }
}

/// Extract the bits covered by `range` from an operand.
pub fn extract_bits(value: u16, range: BitRange) -> u32 {
    (u32::from(value) & range.mask()) >> range.lo
}

/// One argument to be packed into an operand.
#[derive(Debug, Clone, Copy)]
pub struct PackItem<'a> {
    /// Raw argument value as written by the user
    pub value: u32,
    /// Destination bits
    pub range: BitRange,
    /// Transformation applied to the raw value before storing
    pub formula: Option<&'a Formula>,
    /// Accepted raw values; `None` accepts everything
    pub valid: Option<&'a [ValidRange]>,
}

impl PackItem<'_> {
    fn stored_value(&self) -> Option<u32> {
        if let Some(valid) = self.valid {
            if !valid.iter().any(|range| range.contains(self.value)) {
                return None;
            }
        }
        let stored = match self.formula {
            // Raw values are limited to the field width so `invert` can find them
            Some(_) if self.value > self.range.max_value() => return None,
            Some(formula) => formula.eval(i64::from(self.value)).ok()?,
            None => i64::from(self.value),
        };
        if stored < 0 || stored > i64::from(self.range.max_value()) {
            return None;
        }
        u32::try_from(stored).ok()
    }
}

/// Pack arguments into an operand.
///
/// On failure returns the indices of every item that was rejected, either
/// by its valid ranges or because its stored value does not fit its bits.
pub fn pack_bits(items: &[PackItem<'_>]) -> Result<u16, Vec<usize>> {
    let mut operand = 0u32;
    let mut offending = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match item.stored_value() {
            Some(stored) => operand |= stored << item.range.lo,
            None => offending.push(index),
        }
    }

    if offending.is_empty() {
        // Ranges never exceed bit 15 so the value always fits.
        Ok(operand as u16)
    } else {
        Err(offending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(lo: u8, hi: u8) -> BitRange {
        BitRange::new(lo, hi).unwrap()
    }

    #[test]
    fn test_bit_range_bounds() {
        assert!(BitRange::new(0, 15).is_ok());
        assert!(BitRange::new(4, 3).is_err());
        assert!(BitRange::new(8, 16).is_err());
        assert_eq!(range(4, 7).width(), 4);
        assert_eq!(range(4, 7).mask(), 0xF0);
        assert!(range(0, 3).overlaps(&range(3, 5)));
        assert!(!range(0, 3).overlaps(&range(4, 5)));
    }

    #[test]
    fn test_extract_bits() {
        assert_eq!(extract_bits(0xABCD, range(0, 3)), 0xD);
        assert_eq!(extract_bits(0xABCD, range(4, 7)), 0xC);
        assert_eq!(extract_bits(0xABCD, range(8, 15)), 0xAB);
        assert_eq!(extract_bits(0xFFFF, range(0, 15)), 0xFFFF);
    }

    #[test]
    fn test_pack_bits() {
        let items = [
            PackItem {
                value: 2,
                range: range(0, 3),
                formula: None,
                valid: None,
            },
            PackItem {
                value: 5,
                range: range(4, 7),
                formula: None,
                valid: None,
            },
        ];
        assert_eq!(pack_bits(&items), Ok(0x52));
    }

    #[test]
    fn test_pack_bits_reports_every_offender() {
        let valid = [ValidRange { min: 2, max: 255 }];
        let items = [
            PackItem {
                value: 1,
                range: range(0, 7),
                formula: None,
                valid: Some(&valid),
            },
            PackItem {
                value: 3,
                range: range(8, 9),
                formula: None,
                valid: None,
            },
            PackItem {
                value: 4,
                range: range(10, 11),
                formula: None,
                valid: None,
            },
        ];
        assert_eq!(pack_bits(&items), Err(vec![0, 2]));
    }

    #[test]
    fn test_pack_bits_applies_formula() {
        let formula = Formula::parse("arg - 1").unwrap();
        let item = PackItem {
            value: 4,
            range: range(12, 15),
            formula: Some(&formula),
            valid: None,
        };
        assert_eq!(pack_bits(&[item]), Ok(3 << 12));

        let negative = PackItem { value: 0, ..item };
        assert_eq!(pack_bits(&[negative]), Err(vec![0]));
    }

    #[test]
    fn test_pack_bits_formula_raw_value_fits_field() {
        let formula = Formula::parse("arg - 1").unwrap();
        let item = PackItem {
            value: 16,
            range: range(0, 3),
            formula: Some(&formula),
            valid: None,
        };
        // 16 - 1 fits in 4 bits but could never be recovered from them
        assert_eq!(pack_bits(&[item]), Err(vec![0]));
        assert_eq!(pack_bits(&[PackItem { value: 15, ..item }]), Ok(14));
    }

    #[test]
    fn test_valid_range_serde() {
        let single: ValidRange = serde_json::from_str("[3]").unwrap();
        assert_eq!(single, ValidRange { min: 3, max: 3 });
        let pair: ValidRange = serde_json::from_str("[1, 9]").unwrap();
        assert!(pair.contains(9) && !pair.contains(10));
        assert!(serde_json::from_str::<ValidRange>("[9, 1]").is_err());
        assert!(serde_json::from_str::<BitRange>("[0, 16]").is_err());
    }
}
