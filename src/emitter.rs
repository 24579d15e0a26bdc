//! Growable machine-code buffer (§2 item 1).
//!
//! Every backend writes through this instead of touching a `Vec<u8>`
//! directly so that relocation fixups — "patch 4 bytes at a position I
//! already wrote" — have one obviously-correct implementation. Grounded on
//! the shape of `cranelift-codegen`'s `binemit::CodeSink` trait, simplified
//! to a concrete buffer since this crate has exactly one sink (the
//! per-thread code region), not a pluggable trait object.

/// Accumulates bytes for one function body (or, at the module level, one
/// thread's code region) and supports patching already-written positions.
#[derive(Debug, Default, Clone)]
pub struct Emitter {
    buf: Vec<u8>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Emitter { buf: Vec::with_capacity(cap) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn bytes(&mut self, bs: &[u8]) {
        self.buf.extend_from_slice(bs);
    }

    pub fn u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32_le(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i64_le(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Reserve 4 bytes at the current position for a later rel32 patch,
    /// returning the position of the reserved field.
    pub fn reserve_rel32(&mut self) -> u32 {
        let pos = self.len() as u32;
        self.u32_le(0);
        pos
    }

    /// Patch a previously-reserved rel32 field at `field_pos` so it
    /// encodes `target - (field_pos + 4)`, the standard x86 rel32
    /// convention (displacement relative to the end of the field).
    pub fn patch_rel32(&mut self, field_pos: u32, target: u32) {
        let disp = target as i64 - (field_pos as i64 + 4);
        let bytes = (disp as i32).to_le_bytes();
        self.buf[field_pos as usize..field_pos as usize + 4].copy_from_slice(&bytes);
    }

    /// Append `bytes` in place of a previously-written span, used when the
    /// prologue is prepended after the body's length is already final:
    /// shifts every already-recorded position by `bytes.len()`.
    pub fn prepend(&mut self, bytes: &[u8]) {
        let mut out = Vec::with_capacity(bytes.len() + self.buf.len());
        out.extend_from_slice(bytes);
        out.extend_from_slice(&self.buf);
        self.buf = out;
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel32_patch_encodes_displacement_from_end_of_field() {
        let mut e = Emitter::new();
        e.u8(0xe8); // call rel32
        let field = e.reserve_rel32();
        e.u8(0x90); // nop, stands in for the next instruction
        let target = e.len() as u32;
        e.patch_rel32(field, target);
        let disp = i32::from_le_bytes(e.as_slice()[1..5].try_into().unwrap());
        assert_eq!(disp, 1); // one byte (the nop) between field end and target
    }

    #[test]
    fn prepend_shifts_content_forward() {
        let mut e = Emitter::new();
        e.bytes(&[0xaa, 0xbb]);
        e.prepend(&[0x11, 0x22, 0x33]);
        assert_eq!(e.as_slice(), &[0x11, 0x22, 0x33, 0xaa, 0xbb]);
    }
}
