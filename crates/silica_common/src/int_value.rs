//! Arbitrary-width two's-complement integers.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer constant of a fixed bit width.
///
/// The value is stored as the unsigned residue modulo `2^width`; signed
/// operations reinterpret the bits as two's complement. All arithmetic
/// wraps on overflow, matching hardware semantics.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntValue {
    width: u32,
    value: BigUint,
}

impl IntValue {
    /// Creates a value of the given width from an unsigned big integer,
    /// truncating to the width.
    pub fn from_biguint(width: u32, value: BigUint) -> Self {
        Self {
            width,
            value: value % (BigUint::one() << width),
        }
    }

    /// Creates a value of the given width from a signed big integer,
    /// wrapping into the two's-complement range.
    pub fn from_bigint(width: u32, value: BigInt) -> Self {
        let modulus = BigInt::one() << width;
        let wrapped = ((value % &modulus) + &modulus) % &modulus;
        let (_, mag) = wrapped.into_parts();
        Self { width, value: mag }
    }

    /// Creates a value of the given width from an `i64`.
    pub fn from_i64(width: u32, value: i64) -> Self {
        Self::from_bigint(width, BigInt::from(value))
    }

    /// Creates the all-zero value of the given width.
    pub fn zero(width: u32) -> Self {
        Self {
            width,
            value: BigUint::zero(),
        }
    }

    /// Creates the value 1 of the given width.
    pub fn one(width: u32) -> Self {
        Self::from_biguint(width, BigUint::one())
    }

    /// Creates the all-ones value of the given width.
    pub fn all_ones(width: u32) -> Self {
        Self {
            width,
            value: (BigUint::one() << width) - BigUint::one(),
        }
    }

    /// Returns the bit width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the unsigned interpretation of the bits.
    pub fn to_biguint(&self) -> &BigUint {
        &self.value
    }

    /// Returns the signed two's-complement interpretation of the bits.
    pub fn to_bigint(&self) -> BigInt {
        if self.width > 0 && self.value.bit((self.width - 1) as u64) {
            BigInt::from_biguint(Sign::Plus, self.value.clone()) - (BigInt::one() << self.width)
        } else {
            BigInt::from_biguint(Sign::Plus, self.value.clone())
        }
    }

    /// Returns the value as `u64` if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.value).ok()
    }

    /// Returns `true` if all bits are zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns `true` if the value is 1.
    pub fn is_one(&self) -> bool {
        self.value.is_one()
    }

    fn wrap(&self, value: BigUint) -> Self {
        Self::from_biguint(self.width, value)
    }

    fn wrap_signed(&self, value: BigInt) -> Self {
        Self::from_bigint(self.width, value)
    }

    /// Wrapping addition.
    pub fn add(&self, rhs: &Self) -> Self {
        self.wrap(&self.value + &rhs.value)
    }

    /// Wrapping subtraction.
    pub fn sub(&self, rhs: &Self) -> Self {
        self.wrap_signed(self.to_bigint() - rhs.to_bigint())
    }

    /// Wrapping multiplication.
    pub fn mul(&self, rhs: &Self) -> Self {
        self.wrap(&self.value * &rhs.value)
    }

    /// Unsigned division. Returns `None` on division by zero.
    pub fn udiv(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(self.wrap(&self.value / &rhs.value))
    }

    /// Signed division, truncating toward zero. Returns `None` on
    /// division by zero.
    pub fn sdiv(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(self.wrap_signed(self.to_bigint() / rhs.to_bigint()))
    }

    /// Unsigned remainder. Returns `None` on division by zero.
    pub fn urem(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(self.wrap(&self.value % &rhs.value))
    }

    /// Signed remainder with the sign of the dividend. Returns `None` on
    /// division by zero.
    pub fn srem(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(self.wrap_signed(self.to_bigint() % rhs.to_bigint()))
    }

    /// Bitwise AND.
    pub fn and(&self, rhs: &Self) -> Self {
        self.wrap(&self.value & &rhs.value)
    }

    /// Bitwise OR.
    pub fn or(&self, rhs: &Self) -> Self {
        self.wrap(&self.value | &rhs.value)
    }

    /// Bitwise XOR.
    pub fn xor(&self, rhs: &Self) -> Self {
        self.wrap(&self.value ^ &rhs.value)
    }

    /// Bitwise NOT.
    pub fn not(&self) -> Self {
        self.wrap(Self::all_ones(self.width).value ^ &self.value)
    }

    /// Left shift. The amount is taken modulo the width.
    pub fn shl(&self, amount: u64) -> Self {
        let amount = amount % u64::from(self.width.max(1));
        self.wrap(&self.value << amount)
    }

    /// Logical right shift. The amount is taken modulo the width.
    pub fn lshr(&self, amount: u64) -> Self {
        let amount = amount % u64::from(self.width.max(1));
        self.wrap(&self.value >> amount)
    }

    /// Arithmetic right shift. The amount is taken modulo the width.
    pub fn ashr(&self, amount: u64) -> Self {
        let amount = amount % u64::from(self.width.max(1));
        self.wrap_signed(self.to_bigint() >> amount)
    }

    /// Unsigned comparison.
    pub fn ucmp(&self, rhs: &Self) -> std::cmp::Ordering {
        self.value.cmp(&rhs.value)
    }

    /// Signed comparison.
    pub fn scmp(&self, rhs: &Self) -> std::cmp::Ordering {
        self.to_bigint().cmp(&rhs.to_bigint())
    }

    /// Extracts the bit slice `[offset, offset + length)` as a new value
    /// of width `length`.
    pub fn slice(&self, offset: u32, length: u32) -> Self {
        Self::from_biguint(length, &self.value >> offset)
    }

    /// Returns a copy with the bit slice starting at `offset` replaced by
    /// `bits`.
    pub fn splice(&self, offset: u32, bits: &Self) -> Self {
        let mask = ((BigUint::one() << bits.width) - BigUint::one()) << offset;
        let keep = Self::all_ones(self.width).value ^ mask;
        self.wrap((&self.value & keep) | (&bits.value << offset))
    }
}

/// Values display as unsigned decimal, matching the assembly surface.
impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}({})", self.width, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn construction_truncates() {
        let v = IntValue::from_biguint(8, BigUint::from(0x1ffu32));
        assert_eq!(v.to_u64(), Some(0xff));
    }

    #[test]
    fn negative_wraps_to_twos_complement() {
        let v = IntValue::from_i64(8, -1);
        assert_eq!(v.to_u64(), Some(0xff));
        assert_eq!(v.to_bigint(), BigInt::from(-1));
        let v = IntValue::from_i64(8, -128);
        assert_eq!(v.to_u64(), Some(0x80));
        assert_eq!(v.to_bigint(), BigInt::from(-128));
    }

    #[test]
    fn add_wraps() {
        let a = IntValue::from_i64(8, 200);
        let b = IntValue::from_i64(8, 100);
        assert_eq!(a.add(&b).to_u64(), Some(44));
    }

    #[test]
    fn sub_wraps() {
        let a = IntValue::from_i64(8, 5);
        let b = IntValue::from_i64(8, 10);
        assert_eq!(a.sub(&b).to_u64(), Some(0xfb)); // -5
    }

    #[test]
    fn mul_wraps() {
        let a = IntValue::from_i64(4, 5);
        let b = IntValue::from_i64(4, 7);
        assert_eq!(a.mul(&b).to_u64(), Some(35 % 16));
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        let a = IntValue::from_i64(8, -7);
        let b = IntValue::from_i64(8, 2);
        assert_eq!(a.sdiv(&b).unwrap().to_bigint(), BigInt::from(-3));
        assert_eq!(a.srem(&b).unwrap().to_bigint(), BigInt::from(-1));
    }

    #[test]
    fn unsigned_division() {
        let a = IntValue::from_i64(8, 200);
        let b = IntValue::from_i64(8, 3);
        assert_eq!(a.udiv(&b).unwrap().to_u64(), Some(66));
        assert_eq!(a.urem(&b).unwrap().to_u64(), Some(2));
    }

    #[test]
    fn division_by_zero_is_none() {
        let a = IntValue::from_i64(8, 1);
        let z = IntValue::zero(8);
        assert!(a.udiv(&z).is_none());
        assert!(a.sdiv(&z).is_none());
        assert!(a.urem(&z).is_none());
        assert!(a.srem(&z).is_none());
    }

    #[test]
    fn bitwise() {
        let a = IntValue::from_i64(4, 0b0011);
        let b = IntValue::from_i64(4, 0b0101);
        assert_eq!(a.and(&b).to_u64(), Some(0b0001));
        assert_eq!(a.or(&b).to_u64(), Some(0b0111));
        assert_eq!(a.xor(&b).to_u64(), Some(0b0110));
        assert_eq!(a.not().to_u64(), Some(0b1100));
    }

    #[test]
    fn shifts_mod_width() {
        let a = IntValue::from_i64(8, 0b1000_0001);
        assert_eq!(a.shl(1).to_u64(), Some(0b0000_0010));
        assert_eq!(a.lshr(1).to_u64(), Some(0b0100_0000));
        assert_eq!(a.ashr(1).to_u64(), Some(0b1100_0000));
        // Amount 8 wraps to 0 for width 8.
        assert_eq!(a.shl(8).to_u64(), Some(0b1000_0001));
    }

    #[test]
    fn comparisons() {
        let a = IntValue::from_i64(8, -1); // 0xff
        let b = IntValue::from_i64(8, 1);
        assert_eq!(a.ucmp(&b), Ordering::Greater);
        assert_eq!(a.scmp(&b), Ordering::Less);
    }

    #[test]
    fn slice_and_splice() {
        let a = IntValue::from_i64(8, 0b1011_0110);
        assert_eq!(a.slice(2, 4).to_u64(), Some(0b1101));
        let patch = IntValue::from_i64(4, 0b0000);
        assert_eq!(a.splice(2, &patch).to_u64(), Some(0b1000_0010));
    }

    #[test]
    fn wide_values() {
        let a = IntValue::all_ones(128);
        let b = IntValue::one(128);
        assert!(a.add(&b).is_zero());
    }

    #[test]
    fn display_unsigned_decimal() {
        assert_eq!(format!("{}", IntValue::from_i64(8, -1)), "255");
        assert_eq!(format!("{}", IntValue::from_i64(32, 42)), "42");
    }

    #[test]
    fn serde_roundtrip() {
        let v = IntValue::from_i64(16, 12345);
        let json = serde_json::to_string(&v).unwrap();
        let back: IntValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
