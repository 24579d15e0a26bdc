//! Concrete x86-64 backend (§4.4): wires the GAD skeleton's [`Backend`]
//! hooks to the encoders in [`emit`] and the ABI helpers in [`abi`].
//!
//! Register management here is deliberately simple: every destination gets
//! a freshly allocated physical register (`alloc_gpr`/`alloc_xmm`), nothing
//! is proactively freed when its last use has passed, and pressure is
//! relieved only by spilling under `RegAllocator::pick_spill_victim` when a
//! class runs out of free slots. This trades optimal codegen for a much
//! smaller, easier-to-get-right instruction selector — acceptable for a
//! from-scratch backend whose correctness, not performance, is the point.

pub mod abi;
pub mod emit;
pub mod registers;

use crate::data_type::{DataType, Kind};
use crate::error::{fatal_precondition, fatal_resource};
use crate::gad::stack_layout;
use crate::gad::{Backend, LowerCtx};
use crate::ir::entities::{ExternId, FuncId, Label, Reg, StackSlotId};
use crate::ir::node::{IntCc, NodeKind};
use crate::isa::call_conv::CallConv;
use crate::isa::{Isa, TargetIsa};
use crate::regalloc::reg_class::{PhysReg, RegClass};
use crate::regalloc::value::Value;
use registers::{FLOAT_ARGS, GPR_CLASS, PHYS_RAX, SYSV_INT_ARGS, WIN64_INT_ARGS, XMM_CLASS};

const RBP_HW: u8 = 5;
const RSP_HW: u8 = 4;
const RCX_PHYS: PhysReg = 1;
const RDX_PHYS: PhysReg = 2;

pub struct X86_64Backend {
    pub conv: CallConv,
    classes: [RegClass; 2],
}

impl X86_64Backend {
    pub fn new(conv: CallConv) -> Self {
        X86_64Backend {
            conv,
            classes: [registers::gpr_class(), registers::xmm_class()],
        }
    }
}

impl TargetIsa for X86_64Backend {
    fn isa(&self) -> Isa {
        Isa::X86_64
    }

    fn default_call_conv(&self) -> CallConv {
        self.conv
    }
}

// ---- register plumbing shared by every resolve_value arm ------------------

/// Allocate a fresh GPR for `owner`, spilling the farthest-future-use
/// occupant (excluding `owner`'s own direct inputs) if the class is full.
fn alloc_gpr(ctx: &mut LowerCtx, owner: Reg) -> PhysReg {
    alloc_in_class(ctx, GPR_CLASS, owner)
}

fn alloc_xmm(ctx: &mut LowerCtx, owner: Reg) -> PhysReg {
    alloc_in_class(ctx, XMM_CLASS, owner)
}

fn alloc_in_class(ctx: &mut LowerCtx, class: crate::regalloc::reg_class::RegClassId, owner: Reg) -> PhysReg {
    if let Some(p) = ctx.regs.first_free(class) {
        ctx.regs.allocate(class, p, owner);
        return p;
    }
    let mut inputs = Vec::new();
    ctx.func.node(owner).kind.clone().for_each_input(|i| inputs.push(i));
    let (victim_reg, victim_phys) = ctx
        .regs
        .pick_spill_victim(class, &ctx.analyses.live_intervals, &inputs)
        .unwrap_or_else(|| fatal_resource("no register available to spill"));
    spill_to_fresh_slot(ctx, class, victim_phys, victim_reg);
    ctx.regs.allocate(class, victim_phys, owner);
    victim_phys
}

/// Store `victim_phys`'s current value to a brand-new stack slot and update
/// `victim_reg`'s queue entry to point there, then free the register.
fn spill_to_fresh_slot(ctx: &mut LowerCtx, class: crate::regalloc::reg_class::RegClassId, victim_phys: PhysReg, victim_reg: Reg) {
    let disp = abi::make_stack_slot(ctx, 8, 8);
    if class == GPR_CLASS {
        emit::store_mr(&mut ctx.emitter, RBP_HW, disp, registers::gpr_hw(victim_phys));
    } else {
        emit::movsd_store(&mut ctx.emitter, RBP_HW, disp, victim_phys);
    }
    ctx.regs.free(class, victim_phys);
    ctx.queue.set(victim_reg, Value::StackSlot { disp, is_spill: true });
}

/// A scratch register not tied to any SSA def — freed explicitly by the
/// caller right after use. Owned by `Reg::NULL`, which no queue slot ever
/// looks up again, so leaving it allocated between calls is harmless.
fn scratch_gpr(ctx: &mut LowerCtx) -> PhysReg {
    alloc_in_class(ctx, GPR_CLASS, Reg::NULL)
}
fn scratch_xmm(ctx: &mut LowerCtx) -> PhysReg {
    alloc_in_class(ctx, XMM_CLASS, Reg::NULL)
}
fn free_scratch_gpr(ctx: &mut LowerCtx, p: PhysReg) {
    ctx.regs.free(GPR_CLASS, p);
}
fn free_scratch_xmm(ctx: &mut LowerCtx, p: PhysReg) {
    ctx.regs.free(XMM_CLASS, p);
}

/// Reserve a specific physical register (an ABI-forced slot, or `rax`/`rdx`
/// for `idiv`) for `owner`, spilling whoever currently holds it first.
/// Unlike `RegAllocator::reserve`, this keeps the victim's value alive in
/// memory instead of silently overwriting it.
fn reserve_spilling(ctx: &mut LowerCtx, class: crate::regalloc::reg_class::RegClassId, phys: PhysReg, owner: Reg) {
    if let Some(victim) = ctx.regs.owner_of(class, phys) {
        if victim != owner {
            spill_to_fresh_slot(ctx, class, phys, victim);
        } else {
            ctx.regs.free(class, phys);
        }
    }
    ctx.regs.allocate(class, phys, owner);
}

/// Copy `val` (whatever it currently resolves to) into `dst_hw`.
fn load_into(ctx: &mut LowerCtx, dst_hw: u8, val: Value) {
    match val {
        Value::RegisterInClass(c, p) if c == GPR_CLASS => emit::mov_rr(&mut ctx.emitter, dst_hw, registers::gpr_hw(p)),
        Value::Immediate(imm) => emit::mov_ri64(&mut ctx.emitter, dst_hw, imm),
        Value::StackSlot { disp, .. } => emit::load_rm(&mut ctx.emitter, dst_hw, RBP_HW, disp),
        other => fatal_precondition(format!("{:?} is not gpr-compatible", other)),
    }
}

fn load_xmm_into(ctx: &mut LowerCtx, dst_hw: u8, val: Value) {
    match val {
        Value::RegisterInClass(c, p) if c == XMM_CLASS => emit::movsd_rr(&mut ctx.emitter, dst_hw, p),
        Value::StackSlot { disp, .. } => emit::movsd_load(&mut ctx.emitter, dst_hw, RBP_HW, disp),
        other => fatal_precondition(format!("{:?} is not xmm-compatible", other)),
    }
}

/// Force `val` into a register, allocating a scratch only if it isn't one
/// already. The `Option<PhysReg>` is `Some` when the caller must free it.
fn materialize_gpr(ctx: &mut LowerCtx, val: Value) -> (u8, Option<PhysReg>) {
    match val {
        Value::RegisterInClass(c, p) if c == GPR_CLASS => (registers::gpr_hw(p), None),
        Value::Immediate(imm) => {
            let p = scratch_gpr(ctx);
            emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(p), imm);
            (registers::gpr_hw(p), Some(p))
        }
        Value::StackSlot { disp, .. } => {
            let p = scratch_gpr(ctx);
            emit::load_rm(&mut ctx.emitter, registers::gpr_hw(p), RBP_HW, disp);
            (registers::gpr_hw(p), Some(p))
        }
        other => fatal_precondition(format!("{:?} is not gpr-compatible", other)),
    }
}

fn materialize_xmm(ctx: &mut LowerCtx, val: Value) -> (u8, Option<PhysReg>) {
    match val {
        Value::RegisterInClass(c, p) if c == XMM_CLASS => (p, None),
        Value::StackSlot { disp, .. } => {
            let p = scratch_xmm(ctx);
            emit::movsd_load(&mut ctx.emitter, p, RBP_HW, disp);
            (p, Some(p))
        }
        other => fatal_precondition(format!("{:?} is not xmm-compatible", other)),
    }
}

fn intcc_to_jcc(cc: IntCc) -> u8 {
    use emit::cc::*;
    match cc {
        IntCc::Eq => E,
        IntCc::Ne => NE,
        IntCc::SignedLt => L,
        IntCc::SignedLe => LE,
        IntCc::SignedGt => G,
        IntCc::SignedGe => GE,
        IntCc::UnsignedLt => B,
        IntCc::UnsignedLe => BE,
        IntCc::UnsignedGt => A,
        IntCc::UnsignedGe => AE,
    }
}

fn floatcc_to_jcc(cc: crate::ir::node::FloatCc) -> u8 {
    use crate::ir::node::FloatCc::*;
    use emit::cc::*;
    // ucomisd sets flags the way an unsigned integer compare would.
    match cc {
        Eq => E,
        Ne => NE,
        Lt => B,
        Le => BE,
        Gt => A,
        Ge => AE,
    }
}

// ---- call lowering ----------------------------------------------------

enum CallTarget {
    Local(FuncId),
    Extern(ExternId),
    Indirect(Reg),
}

#[derive(Clone, Copy)]
enum ArgPlacement {
    Gpr(PhysReg),
    Xmm(PhysReg),
    Stack(i32),
}

fn classify_args(conv: CallConv, arg_types: &[DataType]) -> Vec<ArgPlacement> {
    let int_args: &[PhysReg] = match conv {
        CallConv::SystemV => &SYSV_INT_ARGS,
        CallConv::WindowsFastcall => &WIN64_INT_ARGS,
    };
    let mut int_used = 0usize;
    let mut float_used = 0usize;
    let mut overflow = 0i32;
    arg_types
        .iter()
        .map(|ty| {
            if ty.is_float() {
                if float_used < FLOAT_ARGS.len() {
                    let p = FLOAT_ARGS[float_used];
                    float_used += 1;
                    ArgPlacement::Xmm(p)
                } else {
                    let off = overflow * 8;
                    overflow += 1;
                    ArgPlacement::Stack(off)
                }
            } else if int_used < int_args.len() {
                let p = int_args[int_used];
                int_used += 1;
                ArgPlacement::Gpr(p)
            } else {
                let off = overflow * 8;
                overflow += 1;
                ArgPlacement::Stack(off)
            }
        })
        .collect()
}

/// Spill every value currently held in a caller-saved physical register to
/// memory before a call, since the callee (and the argument-passing
/// sequence itself) is free to clobber any of them.
fn spill_caller_saved(ctx: &mut LowerCtx) {
    for &(class, count, callee_saved_mask) in &[
        (GPR_CLASS, 14u8, registers::GPR_CALLEE_SAVED_MASK),
        (XMM_CLASS, 16u8, 0u64),
    ] {
        let owners: Vec<(PhysReg, Reg)> = (0..count)
            .filter_map(|p| ctx.regs.owner_of(class, p).map(|owner| (p, owner)))
            .filter(|&(p, _)| callee_saved_mask & (1 << p) == 0)
            .collect();
        for (p, owner) in owners {
            spill_to_fresh_slot(ctx, class, p, owner);
        }
    }
}

fn emit_call(ctx: &mut LowerCtx, conv: CallConv, r: Reg, target: CallTarget, args: &[Reg]) -> Value {
    let arg_vals: Vec<Value> = args.iter().map(|&a| ctx.queue.get(a)).collect();
    let arg_types: Vec<DataType> = args.iter().map(|&a| ctx.func.node(a).ty).collect();
    let placements = classify_args(conv, &arg_types);

    spill_caller_saved(ctx);

    // Stack-passed arguments first: they don't contend with ABI registers.
    for (i, placement) in placements.iter().enumerate() {
        if let ArgPlacement::Stack(off) = *placement {
            if arg_types[i].is_float() {
                let (hw, scratch) = materialize_xmm(ctx, arg_vals[i]);
                emit::movsd_store(&mut ctx.emitter, RSP_HW, off, hw);
                if let Some(p) = scratch {
                    free_scratch_xmm(ctx, p);
                }
            } else {
                let (hw, scratch) = materialize_gpr(ctx, arg_vals[i]);
                emit::store_mr(&mut ctx.emitter, RSP_HW, off, hw);
                if let Some(p) = scratch {
                    free_scratch_gpr(ctx, p);
                }
            }
        }
    }

    // Register-passed arguments: snapshot every value into a scratch
    // register before touching any ABI slot, so assigning argument N can
    // never clobber argument M's not-yet-read source (a parallel-move
    // hazard when source and destination ABI registers overlap).
    let mut snapshots: Vec<(ArgPlacement, PhysReg)> = Vec::new();
    for (i, placement) in placements.iter().enumerate() {
        match *placement {
            ArgPlacement::Gpr(_) => {
                let s = scratch_gpr(ctx);
                load_into(ctx, registers::gpr_hw(s), arg_vals[i]);
                snapshots.push((*placement, s));
            }
            ArgPlacement::Xmm(_) => {
                let s = scratch_xmm(ctx);
                load_xmm_into(ctx, s, arg_vals[i]);
                snapshots.push((*placement, s));
            }
            ArgPlacement::Stack(_) => {}
        }
    }
    for (placement, scratch) in snapshots {
        match placement {
            ArgPlacement::Gpr(p) => {
                reserve_spilling(ctx, GPR_CLASS, p, r);
                emit::mov_rr(&mut ctx.emitter, registers::gpr_hw(p), registers::gpr_hw(scratch));
                free_scratch_gpr(ctx, scratch);
            }
            ArgPlacement::Xmm(p) => {
                reserve_spilling(ctx, XMM_CLASS, p, r);
                emit::movsd_rr(&mut ctx.emitter, p, scratch);
                free_scratch_xmm(ctx, scratch);
            }
            ArgPlacement::Stack(_) => unreachable!("stack placements never enter snapshots"),
        }
    }

    match target {
        CallTarget::Local(func) => {
            let pos = emit::call_rel32(&mut ctx.emitter);
            ctx.local_patches.push(crate::gad::LocalPatch::CallRel32 { pos, func });
        }
        CallTarget::Extern(ext) => {
            let pos = emit::call_rel32(&mut ctx.emitter);
            ctx.local_patches.push(crate::gad::LocalPatch::ExternCallRel32 { pos, ext });
        }
        CallTarget::Indirect(target_reg) => {
            let val = ctx.queue.get(target_reg);
            let (hw, scratch) = materialize_gpr(ctx, val);
            emit::call_r(&mut ctx.emitter, hw);
            if let Some(p) = scratch {
                free_scratch_gpr(ctx, p);
            }
        }
    }

    for placement in &placements {
        match *placement {
            ArgPlacement::Gpr(p) => ctx.regs.free(GPR_CLASS, p),
            ArgPlacement::Xmm(p) => ctx.regs.free(XMM_CLASS, p),
            ArgPlacement::Stack(_) => {}
        }
    }

    let ret_ty = ctx.func.node(r).ty;
    if ret_ty.kind() == Kind::Void {
        Value::Unresolved
    } else if ret_ty.is_float() {
        reserve_spilling(ctx, XMM_CLASS, 0, r);
        Value::RegisterInClass(XMM_CLASS, 0)
    } else {
        reserve_spilling(ctx, GPR_CLASS, PHYS_RAX, r);
        Value::RegisterInClass(GPR_CLASS, PHYS_RAX)
    }
}

// ---- Backend impl -------------------------------------------------------

impl Backend for X86_64Backend {
    fn register_classes(&self) -> &[RegClass] {
        &self.classes
    }

    fn class_for_type(&self, ty: DataType) -> crate::regalloc::reg_class::RegClassId {
        if ty.is_float() {
            XMM_CLASS
        } else {
            GPR_CLASS
        }
    }

    fn initial_reg_alloc(&self, _ctx: &mut LowerCtx) {
        // rsp/rbp are never part of GPR_CLASS's namespace, so there's
        // nothing to reserve up front.
    }

    fn resolve_params(&self, ctx: &mut LowerCtx) {
        abi::resolve_params(ctx, self.conv);
    }

    fn resolve_stack_slot(&self, ctx: &mut LowerCtx, slot: StackSlotId) -> i32 {
        abi::resolve_stack_slot(ctx, slot)
    }

    fn make_stack_slot(&self, ctx: &mut LowerCtx, size: u32, align: u32) -> i32 {
        abi::make_stack_slot(ctx, size, align)
    }

    fn resolve_value(&self, ctx: &mut LowerCtx, r: Reg) -> Value {
        let kind = ctx.func.node(r).kind.clone();
        match kind {
            NodeKind::Param { .. } => {
                fatal_precondition("Param should already be resolved by resolve_params")
            }
            NodeKind::ParamAddr { index } => {
                let preg = ctx.func.params_cache[index as usize];
                let val = ctx.queue.get(preg);
                let disp = abi::make_stack_slot(ctx, 8, 8);
                match val {
                    Value::RegisterInClass(c, p) if c == GPR_CLASS => {
                        emit::store_mr(&mut ctx.emitter, RBP_HW, disp, registers::gpr_hw(p))
                    }
                    Value::RegisterInClass(c, p) if c == XMM_CLASS => {
                        emit::movsd_store(&mut ctx.emitter, RBP_HW, disp, p)
                    }
                    Value::StackSlot { disp: src, .. } => {
                        let s = scratch_gpr(ctx);
                        emit::load_rm(&mut ctx.emitter, registers::gpr_hw(s), RBP_HW, src);
                        emit::store_mr(&mut ctx.emitter, RBP_HW, disp, registers::gpr_hw(s));
                        free_scratch_gpr(ctx, s);
                    }
                    other => fatal_precondition(format!("param has no home: {:?}", other)),
                }
                let dst = alloc_gpr(ctx, r);
                emit::lea_rm(&mut ctx.emitter, registers::gpr_hw(dst), RBP_HW, disp);
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::Local { slot } => {
                let disp = abi::resolve_stack_slot(ctx, slot);
                let dst = alloc_gpr(ctx, r);
                emit::lea_rm(&mut ctx.emitter, registers::gpr_hw(dst), RBP_HW, disp);
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::IntegerConst { bits } => Value::Immediate(bits),
            NodeKind::FloatConst { bits } => {
                let s = scratch_gpr(ctx);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(s), bits.to_bits() as i64);
                let dst = alloc_xmm(ctx, r);
                emit::movq_g2x(&mut ctx.emitter, dst, registers::gpr_hw(s));
                free_scratch_gpr(ctx, s);
                Value::RegisterInClass(XMM_CLASS, dst)
            }
            NodeKind::StringConst { data } => {
                let dst = alloc_gpr(ctx, r);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(dst), 0);
                let pos = ctx.code_pos() - 8;
                ctx.local_patches.push(crate::gad::LocalPatch::ConstAbs64 { pos, data: data.to_vec() });
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::GlobalAddress { global } => {
                let dst = alloc_gpr(ctx, r);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(dst), 0);
                let pos = ctx.code_pos() - 8;
                ctx.local_patches.push(crate::gad::LocalPatch::GlobalAddrAbs64 { pos, target: global });
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::FuncAddress { func } => {
                let dst = alloc_gpr(ctx, r);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(dst), 0);
                let pos = ctx.code_pos() - 8;
                ctx.local_patches.push(crate::gad::LocalPatch::FuncAddrAbs64 { pos, func });
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::ExternAddress { ext } => {
                let dst = alloc_gpr(ctx, r);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(dst), 0);
                let pos = ctx.code_pos() - 8;
                ctx.local_patches.push(crate::gad::LocalPatch::ExternAddrAbs64 { pos, ext });
                Value::RegisterInClass(GPR_CLASS, dst)
            }

            NodeKind::Add { a, b, .. } => int_binop(ctx, r, a, b, emit::add_rr),
            NodeKind::Sub { a, b, .. } => int_binop(ctx, r, a, b, emit::sub_rr),
            NodeKind::And { a, b } => int_binop(ctx, r, a, b, emit::and_rr),
            NodeKind::Or { a, b } => int_binop(ctx, r, a, b, emit::or_rr),
            NodeKind::Xor { a, b } => int_binop(ctx, r, a, b, emit::xor_rr),
            NodeKind::Mul { a, b, .. } => int_binop(ctx, r, a, b, emit::imul_rr),

            NodeKind::SDiv { a, b } => int_div(ctx, r, a, b, true),
            NodeKind::UDiv { a, b } => int_div(ctx, r, a, b, false),

            NodeKind::Shl { a, b, .. } => int_shift(ctx, r, a, b, emit::shl_cl),
            NodeKind::Shr { a, b } => int_shift(ctx, r, a, b, emit::shr_cl),
            NodeKind::Sar { a, b } => int_shift(ctx, r, a, b, emit::sar_cl),

            NodeKind::Not { a } => int_unop(ctx, r, a, emit::not_r),
            NodeKind::Neg { a } => int_unop(ctx, r, a, emit::neg_r),

            NodeKind::FAdd { a, b } => float_binop(ctx, r, a, b, emit::addsd),
            NodeKind::FSub { a, b } => float_binop(ctx, r, a, b, emit::subsd),
            NodeKind::FMul { a, b } => float_binop(ctx, r, a, b, emit::mulsd),
            NodeKind::FDiv { a, b } => float_binop(ctx, r, a, b, emit::divsd),

            NodeKind::IntCompare { cc, a, b } => {
                let av = ctx.queue.get(a);
                let bv = ctx.queue.get(b);
                let (a_hw, a_scratch) = materialize_gpr(ctx, av);
                let (b_hw, b_scratch) = materialize_gpr(ctx, bv);
                emit::cmp_rr(&mut ctx.emitter, a_hw, b_hw);
                if let Some(p) = a_scratch {
                    free_scratch_gpr(ctx, p);
                }
                if let Some(p) = b_scratch {
                    free_scratch_gpr(ctx, p);
                }
                ctx.flags.set(r, cc);
                Value::Flags(cc)
            }
            NodeKind::FloatCompare { cc, a, b } => {
                let av = ctx.queue.get(a);
                let bv = ctx.queue.get(b);
                let (a_hw, a_scratch) = materialize_xmm(ctx, av);
                let (b_hw, b_scratch) = materialize_xmm(ctx, bv);
                emit::ucomisd(&mut ctx.emitter, a_hw, b_hw);
                if let Some(p) = a_scratch {
                    free_scratch_xmm(ctx, p);
                }
                if let Some(p) = b_scratch {
                    free_scratch_xmm(ctx, p);
                }
                let dst = alloc_gpr(ctx, r);
                emit::setcc_and_zext(&mut ctx.emitter, floatcc_to_jcc(cc), registers::gpr_hw(dst));
                Value::RegisterInClass(GPR_CLASS, dst)
            }

            // No narrow physical views: a GPR always holds the full
            // 64-bit word, so widening/narrowing conversions between
            // integer widths are pure aliasing here.
            NodeKind::SignExt { a, .. }
            | NodeKind::ZeroExt { a, .. }
            | NodeKind::Truncate { a, .. }
            | NodeKind::IntToPtr { a }
            | NodeKind::PtrToInt { a, .. } => ctx.queue.get(a),

            NodeKind::IntToFloat { a, .. } => {
                let av = ctx.queue.get(a);
                let (a_hw, a_scratch) = materialize_gpr(ctx, av);
                let dst = alloc_xmm(ctx, r);
                emit::cvtsi2sd(&mut ctx.emitter, dst, a_hw);
                if let Some(p) = a_scratch {
                    free_scratch_gpr(ctx, p);
                }
                Value::RegisterInClass(XMM_CLASS, dst)
            }
            NodeKind::FloatToInt { a, .. } => {
                let av = ctx.queue.get(a);
                let (a_hw, a_scratch) = materialize_xmm(ctx, av);
                let dst = alloc_gpr(ctx, r);
                emit::cvttsd2si(&mut ctx.emitter, registers::gpr_hw(dst), a_hw);
                if let Some(p) = a_scratch {
                    free_scratch_xmm(ctx, p);
                }
                Value::RegisterInClass(GPR_CLASS, dst)
            }

            NodeKind::Load { addr, ty, .. } => {
                let addr_val = ctx.queue.get(addr);
                let (base_hw, scratch) = materialize_gpr(ctx, addr_val);
                let value = if ty.is_float() {
                    let dst = alloc_xmm(ctx, r);
                    emit::movsd_load(&mut ctx.emitter, dst, base_hw, 0);
                    Value::RegisterInClass(XMM_CLASS, dst)
                } else {
                    let dst = alloc_gpr(ctx, r);
                    emit::load_rm(&mut ctx.emitter, registers::gpr_hw(dst), base_hw, 0);
                    Value::RegisterInClass(GPR_CLASS, dst)
                };
                if let Some(p) = scratch {
                    free_scratch_gpr(ctx, p);
                }
                value
            }
            NodeKind::Store { addr, value, .. } => {
                let addr_val = ctx.queue.get(addr);
                let (base_hw, a_scratch) = materialize_gpr(ctx, addr_val);
                let value_val = ctx.queue.get(value);
                let value_ty = ctx.func.node(value).ty;
                if value_ty.is_float() {
                    let (src_hw, v_scratch) = materialize_xmm(ctx, value_val);
                    emit::movsd_store(&mut ctx.emitter, base_hw, 0, src_hw);
                    if let Some(p) = v_scratch {
                        free_scratch_xmm(ctx, p);
                    }
                } else {
                    let (src_hw, v_scratch) = materialize_gpr(ctx, value_val);
                    emit::store_mr(&mut ctx.emitter, base_hw, 0, src_hw);
                    if let Some(p) = v_scratch {
                        free_scratch_gpr(ctx, p);
                    }
                }
                if let Some(p) = a_scratch {
                    free_scratch_gpr(ctx, p);
                }
                Value::Unresolved
            }
            NodeKind::ArrayAccess { base, index, stride } => {
                let base_val = ctx.queue.get(base);
                let index_val = ctx.queue.get(index);
                let (base_hw, bs) = materialize_gpr(ctx, base_val);
                let (idx_hw, is_) = materialize_gpr(ctx, index_val);
                let dst = alloc_gpr(ctx, r);
                let dst_hw = registers::gpr_hw(dst);
                emit::mov_rr(&mut ctx.emitter, dst_hw, idx_hw);
                let stride_scratch = scratch_gpr(ctx);
                emit::mov_ri64(&mut ctx.emitter, registers::gpr_hw(stride_scratch), stride as i64);
                emit::imul_rr(&mut ctx.emitter, dst_hw, registers::gpr_hw(stride_scratch));
                free_scratch_gpr(ctx, stride_scratch);
                emit::add_rr(&mut ctx.emitter, dst_hw, base_hw);
                if let Some(p) = bs {
                    free_scratch_gpr(ctx, p);
                }
                if let Some(p) = is_ {
                    free_scratch_gpr(ctx, p);
                }
                Value::RegisterInClass(GPR_CLASS, dst)
            }
            NodeKind::MemberAccess { base, offset } => {
                let base_val = ctx.queue.get(base);
                let (base_hw, bs) = materialize_gpr(ctx, base_val);
                let dst = alloc_gpr(ctx, r);
                emit::lea_rm(&mut ctx.emitter, registers::gpr_hw(dst), base_hw, offset as i32);
                if let Some(p) = bs {
                    free_scratch_gpr(ctx, p);
                }
                Value::RegisterInClass(GPR_CLASS, dst)
            }

            NodeKind::MemSet { .. }
            | NodeKind::MemCpy { .. }
            | NodeKind::AtomicLoad { .. }
            | NodeKind::AtomicStore { .. }
            | NodeKind::AtomicRmwAdd { .. }
            | NodeKind::AtomicCas { .. } => {
                fatal_precondition("bulk-memory and atomic ops are not implemented by this backend")
            }

            NodeKind::Call { func, args } => emit_call(ctx, self.conv, r, CallTarget::Local(func), &args),
            NodeKind::ECall { ext, args } => emit_call(ctx, self.conv, r, CallTarget::Extern(ext), &args),
            NodeKind::VCall { target, args, .. } => emit_call(ctx, self.conv, r, CallTarget::Indirect(target), &args),

            NodeKind::Trap => {
                emit::ud2(&mut ctx.emitter);
                Value::Unresolved
            }
            NodeKind::DebugBreak => {
                emit::int3(&mut ctx.emitter);
                Value::Unresolved
            }
            NodeKind::KeepAlive { .. } => Value::Unresolved,

            NodeKind::LineInfo { .. } => unreachable!("dispatched specially by eval_bb"),
            NodeKind::Label { .. }
            | NodeKind::Goto { .. }
            | NodeKind::If { .. }
            | NodeKind::Switch { .. }
            | NodeKind::Ret { .. }
            | NodeKind::Unreachable => unreachable!("{:?} is a terminator, not a resolve_value target", ctx.func.node(r).kind),
            NodeKind::Phi2 { .. } | NodeKind::PhiN { .. } => {
                unreachable!("PHIs are resolved by gad::phi, never via resolve_value")
            }
        }
    }

    fn return_(&self, ctx: &mut LowerCtx, value: Option<Reg>) {
        if let Some(v) = value {
            let val = ctx.queue.get(v);
            let ty = ctx.func.node(v).ty;
            if ty.is_float() {
                reserve_spilling(ctx, XMM_CLASS, 0, v);
                load_xmm_into(ctx, 0, val);
            } else {
                reserve_spilling(ctx, GPR_CLASS, PHYS_RAX, v);
                load_into(ctx, registers::gpr_hw(PHYS_RAX), val);
            }
        }
    }

    fn ret_jmp(&self, ctx: &mut LowerCtx) {
        let pos = emit::jmp_rel32(&mut ctx.emitter);
        ctx.ret_patches.push(pos);
    }

    fn jump(&self, ctx: &mut LowerCtx, target: Label) {
        let pos = emit::jmp_rel32(&mut ctx.emitter);
        ctx.branch_patches.push((pos, target));
    }

    fn branch_if(&self, ctx: &mut LowerCtx, cond: Reg, fallthrough: Label, if_true: Label, if_false: Label) {
        let val = ctx.queue.get(cond);
        let (taken_cc, explicit_target, scratch) = match val {
            Value::Flags(cc) => {
                ctx.flags.clear();
                if fallthrough == if_false {
                    (intcc_to_jcc(cc), if_true, None)
                } else if fallthrough == if_true {
                    (intcc_to_jcc(cc.inverse()), if_false, None)
                } else {
                    let cc_byte = intcc_to_jcc(cc);
                    let pos = emit::jcc_rel32(&mut ctx.emitter, cc_byte);
                    ctx.branch_patches.push((pos, if_true));
                    let pos2 = emit::jmp_rel32(&mut ctx.emitter);
                    ctx.branch_patches.push((pos2, if_false));
                    return;
                }
            }
            other => {
                let (hw, scratch) = materialize_gpr(ctx, other);
                emit::test_rr(&mut ctx.emitter, hw, hw);
                if fallthrough == if_false {
                    (emit::cc::NE, if_true, scratch)
                } else if fallthrough == if_true {
                    (emit::cc::E, if_false, scratch)
                } else {
                    let pos = emit::jcc_rel32(&mut ctx.emitter, emit::cc::NE);
                    ctx.branch_patches.push((pos, if_true));
                    let pos2 = emit::jmp_rel32(&mut ctx.emitter);
                    ctx.branch_patches.push((pos2, if_false));
                    if let Some(p) = scratch {
                        free_scratch_gpr(ctx, p);
                    }
                    return;
                }
            }
        };
        let pos = emit::jcc_rel32(&mut ctx.emitter, taken_cc);
        ctx.branch_patches.push((pos, explicit_target));
        if let Some(p) = scratch {
            free_scratch_gpr(ctx, p);
        }
    }

    fn cond_to_reg(&self, ctx: &mut LowerCtx, owner: Reg, cc: IntCc) -> Value {
        let dst = alloc_gpr(ctx, owner);
        emit::setcc_and_zext(&mut ctx.emitter, intcc_to_jcc(cc), registers::gpr_hw(dst));
        Value::RegisterInClass(GPR_CLASS, dst)
    }

    fn phi_move(&self, ctx: &mut LowerCtx, dst_disp: i32, dst_ty: DataType, src: Reg) {
        let val = ctx.queue.get(src);
        if dst_ty.is_float() {
            let (hw, scratch) = materialize_xmm(ctx, val);
            emit::movsd_store(&mut ctx.emitter, RBP_HW, dst_disp, hw);
            if let Some(p) = scratch {
                free_scratch_xmm(ctx, p);
            }
        } else {
            let (hw, scratch) = materialize_gpr(ctx, val);
            emit::store_mr(&mut ctx.emitter, RBP_HW, dst_disp, hw);
            if let Some(p) = scratch {
                free_scratch_gpr(ctx, p);
            }
        }
    }

    fn switch_dispatch(&self, ctx: &mut LowerCtx, value: Reg, default: Label, cases: &[(i64, Label)]) {
        let val = ctx.queue.get(value);
        let (hw, scratch) = materialize_gpr(ctx, val);
        for &(case_val, target) in cases {
            emit::cmp_ri(&mut ctx.emitter, hw, case_val as i32);
            let pos = emit::jcc_rel32(&mut ctx.emitter, emit::cc::E);
            ctx.branch_patches.push((pos, target));
        }
        if let Some(p) = scratch {
            free_scratch_gpr(ctx, p);
        }
        let pos = emit::jmp_rel32(&mut ctx.emitter);
        ctx.branch_patches.push((pos, default));
    }

    fn prologue(&self, ctx: &mut LowerCtx) -> Vec<u8> {
        let int_reg_budget = match self.conv {
            CallConv::SystemV => SYSV_INT_ARGS.len() as u32,
            CallConv::WindowsFastcall => WIN64_INT_ARGS.len() as u32,
        };
        // Conservative upper bound: the budget pass doesn't track
        // int/float split per call, so assume the worst case (every
        // overflowing argument is integer, the smaller register budget).
        let outgoing = stack_layout::round_up_16(
            ctx.analyses.budget.max_call_params.saturating_sub(int_reg_budget) * 8,
        );
        abi::prologue(ctx, outgoing)
    }

    fn epilogue(&self, ctx: &mut LowerCtx) -> Vec<u8> {
        abi::epilogue(ctx)
    }
}

fn int_binop(ctx: &mut LowerCtx, r: Reg, a: Reg, b: Reg, op: fn(&mut crate::emitter::Emitter, u8, u8)) -> Value {
    let av = ctx.queue.get(a);
    let bv = ctx.queue.get(b);
    let dst = alloc_gpr(ctx, r);
    let dst_hw = registers::gpr_hw(dst);
    load_into(ctx, dst_hw, av);
    let (b_hw, scratch) = materialize_gpr(ctx, bv);
    op(&mut ctx.emitter, dst_hw, b_hw);
    if let Some(p) = scratch {
        free_scratch_gpr(ctx, p);
    }
    Value::RegisterInClass(GPR_CLASS, dst)
}

fn int_unop(ctx: &mut LowerCtx, r: Reg, a: Reg, op: fn(&mut crate::emitter::Emitter, u8)) -> Value {
    let av = ctx.queue.get(a);
    let dst = alloc_gpr(ctx, r);
    let dst_hw = registers::gpr_hw(dst);
    load_into(ctx, dst_hw, av);
    op(&mut ctx.emitter, dst_hw);
    Value::RegisterInClass(GPR_CLASS, dst)
}

fn int_shift(ctx: &mut LowerCtx, r: Reg, a: Reg, b: Reg, op: fn(&mut crate::emitter::Emitter, u8)) -> Value {
    let av = ctx.queue.get(a);
    let bv = ctx.queue.get(b);
    // Claim `cl` first so the destination allocation never lands there.
    reserve_spilling(ctx, GPR_CLASS, RCX_PHYS, r);
    load_into(ctx, registers::gpr_hw(RCX_PHYS), bv);
    let dst = alloc_gpr(ctx, r);
    let dst_hw = registers::gpr_hw(dst);
    load_into(ctx, dst_hw, av);
    op(&mut ctx.emitter, dst_hw);
    ctx.regs.free(GPR_CLASS, RCX_PHYS);
    Value::RegisterInClass(GPR_CLASS, dst)
}

fn int_div(ctx: &mut LowerCtx, r: Reg, a: Reg, b: Reg, signed: bool) -> Value {
    let av = ctx.queue.get(a);
    let bv = ctx.queue.get(b);
    let divisor = gpr_excluding(ctx, r, &[registers::gpr_hw(PHYS_RAX), registers::gpr_hw(RDX_PHYS)]);
    let divisor_hw = registers::gpr_hw(divisor);
    load_into(ctx, divisor_hw, bv);
    reserve_spilling(ctx, GPR_CLASS, PHYS_RAX, r);
    load_into(ctx, registers::gpr_hw(PHYS_RAX), av);
    reserve_spilling(ctx, GPR_CLASS, RDX_PHYS, r);
    if signed {
        emit::cqo(&mut ctx.emitter);
        emit::idiv_r(&mut ctx.emitter, divisor_hw);
    } else {
        emit::xor_rr(&mut ctx.emitter, registers::gpr_hw(RDX_PHYS), registers::gpr_hw(RDX_PHYS));
        emit::div_r(&mut ctx.emitter, divisor_hw);
    }
    ctx.regs.free(GPR_CLASS, RDX_PHYS);
    ctx.regs.free(GPR_CLASS, divisor);
    Value::RegisterInClass(GPR_CLASS, PHYS_RAX)
}

/// Like `alloc_gpr`, but never returns a register whose hardware encoding
/// is in `exclude` (used to keep `idiv`'s divisor out of `rax`/`rdx`).
fn gpr_excluding(ctx: &mut LowerCtx, owner: Reg, exclude_hw: &[u8]) -> PhysReg {
    for &p in registers::GPR_PRIORITY.iter() {
        if exclude_hw.contains(&registers::gpr_hw(p)) {
            continue;
        }
        if ctx.regs.owner_of(GPR_CLASS, p).is_none() {
            ctx.regs.allocate(GPR_CLASS, p, owner);
            return p;
        }
    }
    for &p in registers::GPR_PRIORITY.iter() {
        if exclude_hw.contains(&registers::gpr_hw(p)) {
            continue;
        }
        if let Some(victim) = ctx.regs.owner_of(GPR_CLASS, p) {
            spill_to_fresh_slot(ctx, GPR_CLASS, p, victim);
            ctx.regs.allocate(GPR_CLASS, p, owner);
            return p;
        }
    }
    fatal_resource("no gpr available excluding rax/rdx for idiv")
}

fn float_binop(ctx: &mut LowerCtx, r: Reg, a: Reg, b: Reg, op: fn(&mut crate::emitter::Emitter, u8, u8)) -> Value {
    let av = ctx.queue.get(a);
    let bv = ctx.queue.get(b);
    let dst = alloc_xmm(ctx, r);
    load_xmm_into(ctx, dst, av);
    let (b_hw, scratch) = materialize_xmm(ctx, bv);
    op(&mut ctx.emitter, dst, b_hw);
    if let Some(p) = scratch {
        free_scratch_xmm(ctx, p);
    }
    Value::RegisterInClass(XMM_CLASS, dst)
}
