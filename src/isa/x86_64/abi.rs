//! SysV/Win64 parameter binding and prologue/epilogue emission (§4.3.6,
//! §4.4). Both conventions pass the first handful of integer/float
//! arguments in registers and spill the rest to the caller's stack;
//! they differ in which registers and how many.

use crate::data_type::DataType;
use crate::gad::LowerCtx;
use crate::gad::stack_layout::finalize_frame_size;
use crate::ir::entities::StackSlotId;
use crate::isa::call_conv::CallConv;
use crate::isa::x86_64::emit;
use crate::isa::x86_64::registers::{
    self, FLOAT_ARGS, GPR_CLASS, SYSV_INT_ARGS, WIN64_INT_ARGS, XMM_CLASS,
};
use crate::regalloc::value::Value;

/// Bind every `Param` node to its ABI location before the first block
/// runs, per `conv`'s register assignment order. Overflow parameters
/// (past the register budget) land at a positive, caller-stack offset:
/// `+16` clears the return address and saved `rbp`.
pub fn resolve_params(ctx: &mut LowerCtx, conv: CallConv) {
    let int_args: &[u8] = match conv {
        CallConv::SystemV => &SYSV_INT_ARGS,
        CallConv::WindowsFastcall => &WIN64_INT_ARGS,
    };
    let mut int_used = 0usize;
    let mut float_used = 0usize;
    let mut stack_overflow_slots = 0i32;

    let params = ctx.func.params_cache.clone();
    for (index, &preg) in params.iter().enumerate() {
        let ty = ctx.func.prototype.params[index];
        ctx.queue.enqueue(preg);
        if ty.is_float() {
            if float_used < FLOAT_ARGS.len() {
                let phys = FLOAT_ARGS[float_used];
                float_used += 1;
                ctx.regs.allocate(XMM_CLASS, phys, preg);
                ctx.queue.set(preg, Value::RegisterInClass(XMM_CLASS, phys));
            } else {
                let disp = 16 + stack_overflow_slots * 8;
                stack_overflow_slots += 1;
                ctx.queue.set(preg, Value::StackSlot { disp, is_spill: false });
            }
        } else if int_used < int_args.len() {
            let phys = int_args[int_used];
            int_used += 1;
            ctx.regs.allocate(GPR_CLASS, phys, preg);
            ctx.queue.set(preg, Value::RegisterInClass(GPR_CLASS, phys));
        } else {
            let disp = 16 + stack_overflow_slots * 8;
            stack_overflow_slots += 1;
            ctx.queue.set(preg, Value::StackSlot { disp, is_spill: false });
        }
    }
}

/// Assign (on first visit) a frame-pointer-relative offset for a declared
/// local, growing the frame downward from `rbp`.
pub fn resolve_stack_slot(ctx: &mut LowerCtx, slot: StackSlotId) -> i32 {
    if let Some(&disp) = ctx.local_slot_disp.get(&slot) {
        return disp;
    }
    let data = ctx.func.stack_slot(slot);
    let disp = make_stack_slot(ctx, data.size, data.align);
    ctx.local_slot_disp.insert(slot, disp);
    ctx.stack_slot_table.push((format!("{}", slot), disp, DataType::int((data.size.max(1) * 8) as u16)));
    disp
}

/// Bump the frame downward by `size` (rounded up to `align`), returning
/// the new slot's `rbp`-relative displacement (always negative).
pub fn make_stack_slot(ctx: &mut LowerCtx, size: u32, align: u32) -> i32 {
    let align = align.max(1);
    ctx.stack_usage = (ctx.stack_usage + align - 1) & !(align - 1);
    ctx.stack_usage += size.max(1);
    -(ctx.stack_usage as i32)
}

/// `push rbp; mov rbp, rsp; sub rsp, N; push` every callee-saved register
/// this function ended up using.
pub fn prologue(ctx: &mut LowerCtx, outgoing_args_bytes: u32) -> Vec<u8> {
    let saved: Vec<u8> = registers::GPR_PRIORITY
        .iter()
        .copied()
        .filter(|&p| ctx.regs.callee_saved_used(GPR_CLASS) & (1 << p) != 0)
        .collect();
    ctx.stack_usage = finalize_frame_size(ctx.stack_usage + 8 * saved.len() as u32, outgoing_args_bytes)
        - 8 * saved.len() as u32;

    let mut e = crate::emitter::Emitter::new();
    emit::push_r(&mut e, 5); // push rbp
    emit::mov_rr(&mut e, 5, 4); // mov rbp, rsp
    for &phys in &saved {
        emit::push_r(&mut e, registers::gpr_hw(phys));
    }
    if ctx.stack_usage > 0 {
        emit::sub_rsp_imm(&mut e, ctx.stack_usage as i32);
    }
    e.into_vec()
}

/// `add rsp, N`, pop every saved callee-saved register in reverse, `pop
/// rbp; ret`.
pub fn epilogue(ctx: &mut LowerCtx) -> Vec<u8> {
    let saved: Vec<u8> = registers::GPR_PRIORITY
        .iter()
        .copied()
        .filter(|&p| ctx.regs.callee_saved_used(GPR_CLASS) & (1 << p) != 0)
        .collect();
    let mut e = crate::emitter::Emitter::new();
    if ctx.stack_usage > 0 {
        emit::add_rsp_imm(&mut e, ctx.stack_usage as i32);
    }
    for &phys in saved.iter().rev() {
        emit::pop_r(&mut e, registers::gpr_hw(phys));
    }
    emit::pop_r(&mut e, 5); // pop rbp
    emit::ret(&mut e);
    e.into_vec()
}
