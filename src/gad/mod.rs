//! Generic Address-Descriptor Code Generator (§4.3): an ISA-parametric
//! lowering skeleton. A backend supplies the hooks declared on
//! [`Backend`]; this module supplies the queue-driven evaluation order,
//! register allocation bookkeeping, PHI resolution and basic-block
//! scheduling that every target shares.
//!
//! Named "GAD" after the spec's own acronym for this component; grounded
//! on `original_source/src/tb/codegen/generic_addrdesc.h`'s `Ctx` struct
//! (`reg_allocator`, `queue`, `flags_bound`, `labels`/`label_patches`,
//! `stack_usage`) and on `cranelift-codegen`'s separation between a
//! generic `regalloc`/`binemit` skeleton and per-ISA `isa::x86`/`isa::arm64`
//! concrete backends.

pub mod eval;
pub mod phi;
pub mod stack_layout;

use std::collections::HashMap;

use crate::analysis::FunctionAnalyses;
use crate::data_type::DataType;
use crate::emitter::Emitter;
use crate::ir::entities::{Label, Reg, StackSlotId};
use crate::ir::function::Function;
use crate::ir::node::IntCc;
use crate::regalloc::flags::FlagsBinding;
use crate::regalloc::queue::ValueQueue;
use crate::regalloc::reg_class::{RegClass, RegClassId};
use crate::regalloc::value::Value;
use crate::regalloc::RegAllocator;

/// A deferred write of a relocation target local to one function's
/// lowering, later promoted to a module-level
/// [`crate::module::patch`] record once the function's final offset
/// inside `.text` is known (§4.5). Positions here are relative to the
/// *body*, before the prologue is prepended.
#[derive(Debug, Clone)]
pub enum LocalPatch {
    /// Direct call to a module-local function: `E8 rel32` at `pos`.
    CallRel32 { pos: u32, func: crate::ir::entities::FuncId },
    /// Direct call to an extern symbol: `E8 rel32` at `pos`.
    ExternCallRel32 { pos: u32, ext: crate::ir::entities::ExternId },
    /// `movabs reg, imm64` loading a function's address, imm64 field at `pos`.
    FuncAddrAbs64 { pos: u32, func: crate::ir::entities::FuncId },
    /// `movabs reg, imm64` loading an extern's address.
    ExternAddrAbs64 { pos: u32, ext: crate::ir::entities::ExternId },
    /// `movabs reg, imm64` loading a global's address.
    GlobalAddrAbs64 { pos: u32, target: crate::ir::entities::GlobalId },
    /// A large immediate or float constant spilled to the rdata pool;
    /// `pos` is the imm64 field that will hold the pool's final address.
    ConstAbs64 { pos: u32, data: Vec<u8> },
}

/// Shared lowering state threaded through every `Backend` hook call.
pub struct LowerCtx<'f> {
    pub func: &'f Function,
    pub analyses: &'f FunctionAnalyses,
    pub emitter: Emitter,
    pub regs: RegAllocator,
    pub queue: ValueQueue,
    pub flags: FlagsBinding,
    /// Code offset of each block's entry, indexed by `Label::index()`,
    /// recorded at block entry (§4.3.4 step 1) and used to patch branches.
    pub label_pos: Vec<u32>,
    /// `(pos, target)` pairs for branches whose target position wasn't
    /// known at emission time; resolved once every block has run.
    pub branch_patches: Vec<(u32, Label)>,
    /// Positions of "jump to epilogue" placeholders emitted by `ret_jmp`.
    pub ret_patches: Vec<u32>,
    /// Running stack-frame size; rounded to 16 only at epilogue emission.
    pub stack_usage: u32,
    /// `Local` stack slots' assigned frame-pointer-relative offsets,
    /// filled in on first visit.
    pub local_slot_disp: HashMap<StackSlotId, i32>,
    /// Module-linkage patches discovered during this function's lowering.
    pub local_patches: Vec<LocalPatch>,
    /// `(file, line, code_offset)` triples for the debug emitter.
    pub line_table: Vec<(u32, u32, u32)>,
    /// `(name, stack_offset, debug_type)` triples for the debug emitter.
    pub stack_slot_table: Vec<(String, i32, DataType)>,
}

impl<'f> LowerCtx<'f> {
    pub fn new(func: &'f Function, analyses: &'f FunctionAnalyses, classes: &[RegClass]) -> Self {
        LowerCtx {
            func,
            analyses,
            emitter: Emitter::new(),
            regs: RegAllocator::new(classes),
            queue: ValueQueue::new(),
            flags: FlagsBinding::new(),
            label_pos: vec![0; func.blocks().len()],
            branch_patches: Vec::new(),
            ret_patches: Vec::new(),
            stack_usage: 0,
            local_slot_disp: HashMap::new(),
            local_patches: Vec::new(),
            line_table: Vec::new(),
            stack_slot_table: Vec::new(),
        }
    }

    /// Code position the emitter is about to write at.
    pub fn code_pos(&self) -> u32 {
        self.emitter.len() as u32
    }

    /// Kill the current flags binding, if any, via the backend's
    /// `cond_to_reg` hook (§4.3.3). Must be called before dispatching any
    /// node that could clobber flags.
    pub fn kill_flags(&mut self, backend: &dyn Backend) {
        if let Some((r, cc)) = self.flags.current() {
            let value = backend.cond_to_reg(self, r, cc);
            self.flags.clear();
            self.queue.set(r, value);
        }
    }
}

/// The hooks a concrete ISA backend plugs into the GAD skeleton.
///
/// Every hook receives `&mut LowerCtx` so it can append to the emitter,
/// touch the register allocator, and record patches; `self` is the
/// backend's own (Send+Sync-free, single-threaded-per-lowering) static
/// configuration.
pub trait Backend {
    /// Register classes this backend defines, in priority order for
    /// `RegClassId` indexing.
    fn register_classes(&self) -> &[RegClass];

    /// Which class a value of this type is allocated from.
    fn class_for_type(&self, ty: DataType) -> RegClassId;

    /// Seed the allocator before lowering starts — typically reserving
    /// the stack/frame pointers as permanently unavailable.
    fn initial_reg_alloc(&self, ctx: &mut LowerCtx);

    /// Bind every `Param` node to its ABI-defined location (register or
    /// incoming stack slot) before the first block runs.
    fn resolve_params(&self, ctx: &mut LowerCtx);

    /// Assign (on first visit) a frame-pointer-relative offset to a
    /// declared stack slot, returning it. Subsequent calls for the same
    /// slot must return the same offset.
    fn resolve_stack_slot(&self, ctx: &mut LowerCtx, slot: StackSlotId) -> i32;

    /// Allocate a fresh spill slot of `size`/`align`, bumping
    /// `ctx.stack_usage`. Used both by the register allocator and by PHI
    /// spill allocation.
    fn make_stack_slot(&self, ctx: &mut LowerCtx, size: u32, align: u32) -> i32;

    /// Instruction-selection entry point: force `r` to a concrete
    /// [`Value`], emitting whatever code that requires. Inputs have
    /// already been resolved by the generic walk in `gad::eval::resolve`;
    /// this hook only needs to combine already-resolved operands. Covers
    /// every block-body node that isn't a terminator — leaves, pure
    /// arithmetic, memory ops (including `Store`, which has no def and
    /// returns `Value::Unresolved`), calls, and the side-effecting
    /// odds and ends (`Trap`, `DebugBreak`, `KeepAlive`).
    fn resolve_value(&self, ctx: &mut LowerCtx, r: Reg) -> Value;

    /// Emit the function's return sequence for `value` (already resolved
    /// if `Some`), not including the jump/fallthrough to the epilogue.
    fn return_(&self, ctx: &mut LowerCtx, value: Option<Reg>);

    /// Emit a jump to the function epilogue, recording its position in
    /// `ctx.ret_patches`. The generic `eval_bb` only calls this when the
    /// current block isn't the last one in source order.
    fn ret_jmp(&self, ctx: &mut LowerCtx);

    /// Emit an unconditional jump to `target`; elided by the caller when
    /// `target == fallthrough`.
    fn jump(&self, ctx: &mut LowerCtx, target: Label);

    /// Emit a conditional branch. `cond` is already flags-bound or
    /// resolved to a boolean register/immediate; `fallthrough` is the
    /// block laid out immediately after this one (its edge needs no jump).
    fn branch_if(&self, ctx: &mut LowerCtx, cond: Reg, fallthrough: Label, if_true: Label, if_false: Label);

    /// Materialize the currently flags-bound condition code into a
    /// general-purpose register, returning its `Value`. `owner` is the
    /// comparator node the flags were originally bound to, so the backend
    /// can register the fresh register's ownership correctly instead of
    /// allocating against a phantom owner.
    fn cond_to_reg(&self, ctx: &mut LowerCtx, owner: Reg, cc: IntCc) -> Value;

    /// Copy `src` into a PHI's stack-resident home at `dst_disp`. If
    /// `src` is still unresolved, the backend forces it onto a register
    /// compatible with the PHI's storage before copying (§4.3.5).
    fn phi_move(&self, ctx: &mut LowerCtx, dst_disp: i32, dst_ty: DataType, src: Reg);

    /// Emit a multi-way dispatch over `value`'s resolved form, jumping to
    /// `default` if none of `cases` match. Left entirely to the backend
    /// since the cheapest encoding (`cmp`/`je` chain vs. a jump table)
    /// is an ISA-specific tradeoff this skeleton has no stake in.
    fn switch_dispatch(&self, ctx: &mut LowerCtx, value: Reg, default: Label, cases: &[(i64, Label)]);

    /// Emit the prologue now that `ctx.stack_usage` is final. Returns the
    /// bytes (the caller prepends them to the body).
    fn prologue(&self, ctx: &mut LowerCtx) -> Vec<u8>;

    /// Emit the epilogue. Returns the bytes (the caller appends them and
    /// back-patches every `ret_patches` entry to jump here). Must finalize
    /// `ctx.stack_usage` (via [`stack_layout::finalize_frame_size`]) before
    /// `prologue`/`epilogue` read it, since both depend on the final,
    /// 16-byte-rounded frame size.
    fn epilogue(&self, ctx: &mut LowerCtx) -> Vec<u8>;
}

/// Output of lowering one function: its [`FunctionOutput`] plus the
/// module-linkage patches discovered along the way, positions already
/// adjusted for the prologue that got prepended after the fact.
pub struct LoweredFunction {
    pub output: crate::ir::function::FunctionOutput,
    pub patches: Vec<LocalPatch>,
}

/// Lower an entire function end to end (§4.3): reserve PHI slots, bind
/// parameters, evaluate every block in source order, then assemble the
/// prologue/body/epilogue into one contiguous buffer.
///
/// This is the one place that knows the body is lowered at offset 0 and
/// the prologue is prepended only afterward — every position recorded
/// during lowering (`branch_patches`, `ret_patches`) is body-relative and
/// stays correct under a uniform shift, since rel32 displacements are
/// invariant to translating both ends by the same amount. Only
/// `local_patches` and `line_table`, which name an absolute offset into
/// the *final* function, need the `+ prologue_len` correction applied
/// here.
pub fn lower_function(func: &Function, analyses: &FunctionAnalyses, backend: &dyn Backend) -> LoweredFunction {
    let classes = backend.register_classes().to_vec();
    let mut ctx = LowerCtx::new(func, analyses, &classes);

    backend.initial_reg_alloc(&mut ctx);
    phi::reserve_phi_slots(&mut ctx);
    backend.resolve_params(&mut ctx);

    for bb in func.blocks().to_vec() {
        eval::eval_bb(&mut ctx, backend, bb);
    }

    for (pos, target) in ctx.branch_patches.clone() {
        let target_pos = ctx.label_pos[target.index()];
        ctx.emitter.patch_rel32(pos, target_pos);
    }
    let epilogue_start = ctx.emitter.len() as u32;
    for pos in ctx.ret_patches.clone() {
        ctx.emitter.patch_rel32(pos, epilogue_start);
    }

    let prologue = backend.prologue(&mut ctx);
    let epilogue = backend.epilogue(&mut ctx);
    let prologue_len = prologue.len() as u32;
    let epilogue_len = epilogue.len() as u32;

    let mut code = prologue;
    code.extend_from_slice(ctx.emitter.as_slice());
    code.extend_from_slice(&epilogue);

    let line_table = ctx
        .line_table
        .iter()
        .map(|&(file, line, off)| (file, line, off + prologue_len))
        .collect();

    let saved_regs_mask = classes
        .iter()
        .fold(0u64, |acc, rc| acc | ctx.regs.callee_saved_used(rc.id));

    let patches = ctx
        .local_patches
        .into_iter()
        .map(|p| shift_patch(p, prologue_len))
        .collect();

    LoweredFunction {
        output: crate::ir::function::FunctionOutput {
            code,
            stack_usage: ctx.stack_usage,
            saved_regs_mask,
            prologue_len,
            epilogue_len,
            line_table,
            stack_slot_table: ctx.stack_slot_table,
        },
        patches,
    }
}

fn shift_patch(p: LocalPatch, shift: u32) -> LocalPatch {
    match p {
        LocalPatch::CallRel32 { pos, func } => LocalPatch::CallRel32 { pos: pos + shift, func },
        LocalPatch::ExternCallRel32 { pos, ext } => LocalPatch::ExternCallRel32 { pos: pos + shift, ext },
        LocalPatch::FuncAddrAbs64 { pos, func } => LocalPatch::FuncAddrAbs64 { pos: pos + shift, func },
        LocalPatch::ExternAddrAbs64 { pos, ext } => LocalPatch::ExternAddrAbs64 { pos: pos + shift, ext },
        LocalPatch::GlobalAddrAbs64 { pos, target } => LocalPatch::GlobalAddrAbs64 { pos: pos + shift, target },
        LocalPatch::ConstAbs64 { pos, data } => LocalPatch::ConstAbs64 { pos: pos + shift, data },
    }
}
