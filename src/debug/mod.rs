//! Debug-info consumed-interface types (§6 "CodeView interface consumed").
//!
//! A function output exposes a line table and a stack-slot table; this
//! module turns those into the record groups a CodeView (or DWARF)
//! emitter would write, without emitting any actual container bytes —
//! that belongs to the out-of-scope "concrete debug emitter" the spec
//! names as an external collaborator (§1 "Out of scope"). What lives here
//! is the part that *is* in scope: building the records from a function's
//! `line_table`/`stack_slot_table` and the module's file table, plus the
//! MD5 file-checksum table §6 calls out explicitly.

use std::path::Path;

use crate::data_type::DataType;
use crate::error::CodegenError;

/// One `S_REGREL32`-shaped record: a named local/spill at a frame-pointer-
/// relative offset, typed for the debugger.
#[derive(Debug, Clone)]
pub struct RegRel32 {
    pub name: String,
    pub frame_offset: i32,
    pub debug_type: DataType,
}

/// The record group for one function: a `S_GPROC32_ID`/`S_FRAMEPROC`
/// header, a `S_REGREL32` per stack slot, and a closing `S_PROC_ID_END`,
/// plus the two `.text`-relative relocations (SECREL + SECTION) the
/// container format must patch in once the function's final offset is
/// known.
#[derive(Debug, Clone)]
pub struct ProcRecord {
    pub symbol_name: String,
    pub frame_size: u32,
    pub locals: Vec<RegRel32>,
    /// `(file_id, line, code_offset)`, copied verbatim from
    /// `FunctionOutput::line_table`.
    pub lines: Vec<(u32, u32, u32)>,
}

impl ProcRecord {
    pub fn from_output(symbol_name: impl Into<String>, output: &crate::ir::function::FunctionOutput) -> ProcRecord {
        ProcRecord {
            symbol_name: symbol_name.into(),
            frame_size: output.stack_usage,
            locals: output
                .stack_slot_table
                .iter()
                .map(|(name, offset, ty)| RegRel32 {
                    name: name.clone(),
                    frame_offset: *offset,
                    debug_type: *ty,
                })
                .collect(),
            lines: output.line_table.clone(),
        }
    }
}

/// One entry in the file checksum table: a module file-table id, its
/// path, and an MD5 digest of its contents.
#[derive(Debug, Clone)]
pub struct FileChecksum {
    pub file_id: u32,
    pub path: std::path::PathBuf,
    pub md5: [u8; 16],
}

/// Build the file checksum table for every path the module's file table
/// recorded. Reading a source file is the one place in this library that
/// touches the filesystem, and the only source of `CodegenError::Io`
/// (§7 `IOError`, "abort (debug-only)" — callers that can't tolerate a
/// missing source file should not ask for debug info).
pub fn build_file_checksums(files: &[std::path::PathBuf]) -> Result<Vec<FileChecksum>, CodegenError> {
    files
        .iter()
        .enumerate()
        .map(|(id, path)| {
            let bytes = std::fs::read(path).map_err(|source| CodegenError::Io { path: path.clone(), source })?;
            Ok(FileChecksum { file_id: id as u32, path: path.clone(), md5: md5(&bytes) })
        })
        .collect()
}

/// Minimal MD5 implementation. CodeView's file checksum table asks for
/// MD5 specifically (not a cryptographic-strength requirement here, just
/// container-format compatibility), so pulling in a dedicated hashing
/// crate for one digest isn't worth the dependency — unlike the ISA
/// encoders, emitter and register allocator, this genuinely has no
/// counterpart in the teacher's own stack to imitate.
fn md5(data: &[u8]) -> [u8; 16] {
    const S: [u32; 64] = [
        7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9,
        14, 20, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15,
        21, 6, 10, 15, 21,
    ];
    const K: [u32; 64] = [
        0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501, 0x698098d8,
        0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821, 0xf61e2562, 0xc040b340,
        0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8, 0x21e1cde6, 0xc33707d6, 0xf4d50d87,
        0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a, 0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c,
        0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70, 0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039,
        0xe6db99e5, 0x1fa27cf8, 0xc4ac5665, 0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92,
        0xffeff47d, 0x85845dd1, 0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb,
        0xeb86d391,
    ];

    let mut msg = data.to_vec();
    let orig_len_bits = (data.len() as u64).wrapping_mul(8);
    msg.push(0x80);
    while msg.len() % 64 != 56 {
        msg.push(0);
    }
    msg.extend_from_slice(&orig_len_bits.to_le_bytes());

    let (mut a0, mut b0, mut c0, mut d0) = (0x67452301u32, 0xefcdab89u32, 0x98badcfeu32, 0x10325476u32);

    for chunk in msg.chunks(64) {
        let mut m = [0u32; 16];
        for (i, word) in chunk.chunks(4).enumerate() {
            m[i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }
        let (mut a, mut b, mut c, mut d) = (a0, b0, c0, d0);
        for i in 0..64 {
            let (f, g) = match i {
                0..=15 => ((b & c) | (!b & d), i),
                16..=31 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                32..=47 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let f = f.wrapping_add(a).wrapping_add(K[i]).wrapping_add(m[g]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(f.rotate_left(S[i]));
        }
        a0 = a0.wrapping_add(a);
        b0 = b0.wrapping_add(b);
        c0 = c0.wrapping_add(c);
        d0 = d0.wrapping_add(d);
    }

    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&a0.to_le_bytes());
    out[4..8].copy_from_slice(&b0.to_le_bytes());
    out[8..12].copy_from_slice(&c0.to_le_bytes());
    out[12..16].copy_from_slice(&d0.to_le_bytes());
    out
}

/// Relative path display helper used when logging which file a checksum
/// covers, kept small since the rest of this module has no other use for
/// `Path` beyond `PathBuf` storage.
pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_input_matches_known_digest() {
        assert_eq!(md5(b""), [
            0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8, 0x42, 0x7e,
        ]);
    }

    #[test]
    fn md5_of_abc_matches_known_digest() {
        assert_eq!(md5(b"abc"), [
            0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1, 0x7f, 0x72,
        ]);
    }

    #[test]
    fn proc_record_copies_stack_slot_table_into_regrel32_entries() {
        let output = crate::ir::function::FunctionOutput {
            stack_usage: 32,
            stack_slot_table: vec![("x".to_string(), -8, DataType::i32())],
            ..Default::default()
        };
        let rec = ProcRecord::from_output("f", &output);
        assert_eq!(rec.locals.len(), 1);
        assert_eq!(rec.locals[0].frame_offset, -8);
    }
}
