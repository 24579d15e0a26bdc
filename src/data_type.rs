//! `DataType`: the (kind, data, width) triple every IR value and stack slot
//! is annotated with.
//!
//! This plays the role `cranelift_codegen::ir::types` plays in the teacher
//! crate, but keeps the triple the spec describes instead of a flat
//! enumeration of concrete type constants: `Int` widths are arbitrary
//! (1..=2048 bits, rounded up to a byte above 64), `Float` is fixed to
//! `f32`/`f64`, and `width` is the log2 of a SIMD lane count.

use core::fmt;

/// Discriminant of a [`DataType`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Integer of `data` bits.
    Int,
    /// IEEE-754 binary32 or binary64, selected by `data` (32 or 64).
    Float,
    /// A machine pointer; `data` is unused (always the target's pointer width).
    Pointer,
    /// The empty type; used for `Ret` with no value and for statement-like nodes.
    Void,
}

/// A value type: `(kind, data, width)`.
///
/// `width` is `log2(lanes)`; `0` means scalar. Two `DataType`s are equal iff
/// all three fields match, so `i32x4` and `i32` are distinct types even
/// though they share a `kind`/`data` pair.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct DataType {
    kind: Kind,
    data: u16,
    width: u8,
}

/// Maximum integer bit-width this crate will represent. The spec allows
/// arbitrary precision above 64 bits; we cap it generously rather than
/// model true bignums, since no lowering hook needs more than a handful of
/// machine-word multiples.
pub const MAX_INT_BITS: u16 = 2048;

impl DataType {
    /// Construct an integer type of `bits` width (1..=2048).
    pub fn int(bits: u16) -> Self {
        assert!(
            bits >= 1 && bits <= MAX_INT_BITS,
            "integer width {} out of range 1..={}",
            bits,
            MAX_INT_BITS
        );
        DataType {
            kind: Kind::Int,
            data: bits,
            width: 0,
        }
    }

    /// The canonical boolean representation: `i1`.
    pub const fn bool_() -> Self {
        DataType {
            kind: Kind::Int,
            data: 1,
            width: 0,
        }
    }

    /// 32-bit IEEE-754 float.
    pub const fn f32() -> Self {
        DataType {
            kind: Kind::Float,
            data: 32,
            width: 0,
        }
    }

    /// 64-bit IEEE-754 float.
    pub const fn f64() -> Self {
        DataType {
            kind: Kind::Float,
            data: 64,
            width: 0,
        }
    }

    /// A machine pointer.
    pub const fn pointer() -> Self {
        DataType {
            kind: Kind::Pointer,
            data: 0,
            width: 0,
        }
    }

    /// The void type, used on `Ret` nodes with no return value.
    pub const fn void() -> Self {
        DataType {
            kind: Kind::Void,
            data: 0,
            width: 0,
        }
    }

    /// Convenience alias used throughout the test scenarios.
    pub fn i32() -> Self {
        DataType::int(32)
    }

    /// Convenience alias used throughout the test scenarios.
    pub fn i64() -> Self {
        DataType::int(64)
    }

    /// Widen this type to a SIMD vector of `2^log2_lanes` lanes.
    pub fn by(self, log2_lanes: u8) -> Self {
        DataType {
            width: log2_lanes,
            ..self
        }
    }

    /// This type's [`Kind`].
    pub fn kind(self) -> Kind {
        self.kind
    }

    /// `true` for `Kind::Int`.
    pub fn is_int(self) -> bool {
        self.kind == Kind::Int
    }

    /// `true` for `Kind::Float`.
    pub fn is_float(self) -> bool {
        self.kind == Kind::Float
    }

    /// `true` for `Kind::Pointer`.
    pub fn is_pointer(self) -> bool {
        self.kind == Kind::Pointer
    }

    /// Bit-width for `Int`, 32/64 for `Float`, undefined for other kinds.
    pub fn bits(self) -> u16 {
        self.data
    }

    /// `log2` of the SIMD lane count; `0` is scalar.
    pub fn log2_lanes(self) -> u8 {
        self.width
    }

    /// Number of SIMD lanes (always >= 1).
    pub fn lanes(self) -> u32 {
        1u32 << self.width
    }

    /// Size in bytes of a single lane, target-pointer-width aware for
    /// `Pointer` (always assumed 8 on our supported 64-bit targets).
    fn scalar_size(self) -> u32 {
        match self.kind {
            Kind::Int => (u32::from(self.data) + 7) / 8,
            Kind::Float => u32::from(self.data) / 8,
            Kind::Pointer => 8,
            Kind::Void => 0,
        }
    }

    /// Total size in bytes of this (possibly vector) type.
    pub fn size(self) -> u32 {
        self.scalar_size() * self.lanes()
    }

    /// Natural alignment in bytes: the size, capped at the machine word (8)
    /// for scalars and at 16/32/64 for the vector widths we support, never
    /// less than 1.
    pub fn align(self) -> u32 {
        let size = self.size().max(1);
        // Natural alignment is the largest power of two <= size, capped at
        // 64 bytes (AVX-512 register width) so degenerate huge integers
        // don't demand implausible stack alignment.
        let mut align = 1u32;
        while align * 2 <= size && align < 64 {
            align *= 2;
        }
        align
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Int if self.data == 1 => write!(f, "b1")?,
            Kind::Int => write!(f, "i{}", self.data)?,
            Kind::Float => write!(f, "f{}", self.data)?,
            Kind::Pointer => write!(f, "ptr")?,
            Kind::Void => write!(f, "void")?,
        }
        if self.width > 0 {
            write!(f, "x{}", self.lanes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_sizes_round_up_to_byte() {
        assert_eq!(DataType::int(1).size(), 1);
        assert_eq!(DataType::int(7).size(), 1);
        assert_eq!(DataType::int(8).size(), 1);
        assert_eq!(DataType::int(9).size(), 2);
        assert_eq!(DataType::int(33).size(), 5);
        assert_eq!(DataType::i32().size(), 4);
        assert_eq!(DataType::i64().size(), 8);
    }

    #[test]
    fn float_and_pointer_sizes() {
        assert_eq!(DataType::f32().size(), 4);
        assert_eq!(DataType::f64().size(), 8);
        assert_eq!(DataType::pointer().size(), 8);
        assert_eq!(DataType::void().size(), 0);
    }

    #[test]
    fn vector_widths_multiply_lane_size() {
        let v4xi32 = DataType::i32().by(2); // log2(4) = 2
        assert_eq!(v4xi32.lanes(), 4);
        assert_eq!(v4xi32.size(), 16);
        assert_eq!(v4xi32.align(), 16);
    }

    #[test]
    fn align_never_exceeds_size_power_of_two() {
        assert_eq!(DataType::int(1).align(), 1);
        assert_eq!(DataType::i32().align(), 4);
        assert_eq!(DataType::i64().align(), 8);
    }

    #[test]
    fn display_matches_textual_ir_spelling() {
        assert_eq!(DataType::i32().to_string(), "i32");
        assert_eq!(DataType::bool_().to_string(), "b1");
        assert_eq!(DataType::f64().to_string(), "f64");
        assert_eq!(DataType::pointer().to_string(), "ptr");
        assert_eq!(DataType::i32().by(2).to_string(), "i32x4");
    }
}
