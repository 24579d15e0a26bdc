//! Module-level patch records (§3 "Patch records", §4.5).
//!
//! [`crate::gad::LocalPatch`] names a position *inside one function's own
//! code*, discovered during that function's lowering, before the module
//! knows where in `.text` the function will finally live. Once
//! `Module::compile_function` has appended the function's bytes to a
//! thread's [`super::CodeRegion`] the patch is "promoted" here by adding
//! the function's identity (`src`) — everything a materializer needs to
//! resolve it once final layout is known stays in one record, so
//! `Module::finalize`/the JIT/object materializers never have to look
//! anything else up.

use crate::ir::entities::{ExternId, FuncId, GlobalId};
use crate::gad::LocalPatch;

/// A direct call site to a module-local function: `E8 rel32`.
#[derive(Debug, Clone, Copy)]
pub struct FunctionPatch {
    /// Function whose code contains the patch site.
    pub src: FuncId,
    /// Function being called.
    pub target: FuncId,
    /// Byte offset of the rel32 field within `src`'s *final* code (i.e.
    /// already shifted by the prologue length — see
    /// [`crate::gad::lower_function`]).
    pub pos: u32,
    /// `true` for a `call rel32` site, `false` for a `movabs` abs64 load.
    pub is_call: bool,
}

/// A direct call site (or address load) referring to an extern symbol.
#[derive(Debug, Clone, Copy)]
pub struct ExternPatch {
    pub src: FuncId,
    pub target: ExternId,
    pub pos: u32,
    /// `true` for a `call rel32` site, `false` for a `movabs` abs64 load.
    pub is_call: bool,
}

/// A `movabs reg, imm64` loading a global's address.
#[derive(Debug, Clone, Copy)]
pub struct GlobalPatch {
    pub src: FuncId,
    pub pos: u32,
    pub target: GlobalId,
}

/// A large immediate or float constant spilled to the module's rdata pool.
/// `rdata_pos` was reserved with a single atomic fetch-add at lowering
/// time (§5), so two threads' constants can never collide even though
/// `finalize` is the first place that actually copies `data` into the
/// rdata buffer.
#[derive(Debug, Clone)]
pub struct ConstPoolPatch {
    pub src: FuncId,
    pub pos: u32,
    pub rdata_pos: u32,
    pub data: Vec<u8>,
}

/// Four patch lists a compiled function can contribute to, sharded per
/// thread by `Module::compile_function` the same way `CodeRegion` is
/// (§5: "what is sharded per thread").
#[derive(Debug, Default)]
pub struct PatchLists {
    pub functions: Vec<FunctionPatch>,
    pub externs: Vec<ExternPatch>,
    pub globals: Vec<GlobalPatch>,
    pub consts: Vec<ConstPoolPatch>,
}

impl PatchLists {
    /// Sort a `LowerFunction`'s local patches into this thread's four
    /// lists, attaching `src` and reserving each const's rdata slot via
    /// `rdata_cursor` (an atomic fetch-add, never a lock).
    pub fn absorb(&mut self, src: FuncId, patches: Vec<LocalPatch>, rdata_cursor: &std::sync::atomic::AtomicU32) {
        use std::sync::atomic::Ordering;
        for p in patches {
            match p {
                LocalPatch::CallRel32 { pos, func } => {
                    self.functions.push(FunctionPatch { src, target: func, pos, is_call: true });
                }
                LocalPatch::ExternCallRel32 { pos, ext } => {
                    self.externs.push(ExternPatch { src, target: ext, pos, is_call: true });
                }
                LocalPatch::FuncAddrAbs64 { pos, func } => {
                    self.functions.push(FunctionPatch { src, target: func, pos, is_call: false });
                }
                LocalPatch::ExternAddrAbs64 { pos, ext } => {
                    self.externs.push(ExternPatch { src, target: ext, pos, is_call: false });
                }
                LocalPatch::GlobalAddrAbs64 { pos, target } => {
                    self.globals.push(GlobalPatch { src, pos, target });
                }
                LocalPatch::ConstAbs64 { pos, data } => {
                    let rdata_pos = rdata_cursor.fetch_add(data.len() as u32, Ordering::Relaxed);
                    self.consts.push(ConstPoolPatch { src, pos, rdata_pos, data });
                }
            }
        }
    }
}
