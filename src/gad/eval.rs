//! The value-forcing walk and per-block evaluation loop (§4.3.1, §4.3.4).

use crate::gad::{Backend, LowerCtx};
use crate::ir::entities::Reg;
use crate::ir::function::BasicBlock;
use crate::ir::node::NodeKind;
use crate::regalloc::value::Value;

/// Force `r` to a concrete [`Value`], recursively resolving its inputs
/// first (§4.3.1). PHI nodes are a barrier: a PHI's location is assigned
/// by `gad::phi`, not by walking its edges here, so we never recurse into
/// `Phi2`/`PhiN` operands.
///
/// Idempotent: if `r`'s queue slot already holds something other than
/// `Unresolved`, it's returned unchanged without re-emitting code.
pub fn resolve(ctx: &mut LowerCtx, backend: &dyn Backend, r: Reg) -> Value {
    let current = ctx.queue.get(r);
    if !current.is_unresolved() {
        return current;
    }
    let kind = ctx.func.node(r).kind.clone();
    if !kind.is_phi() {
        let mut inputs = Vec::new();
        kind.for_each_input(|input| inputs.push(input));
        for input in inputs {
            if ctx.queue.has_slot(input) {
                resolve(ctx, backend, input);
            }
        }
    }
    let value = backend.resolve_value(ctx, r);
    if ctx.queue.has_slot(r) {
        ctx.queue.set(r, value);
    }
    value
}

/// Evaluate one basic block (§4.3.4): record its entry position, enqueue
/// or eagerly dispatch each body node, resolve outgoing PHI edges, emit
/// the terminator, then roll the queue back to this block's entry mark.
pub fn eval_bb(ctx: &mut LowerCtx, backend: &dyn Backend, bb: BasicBlock) {
    let label = ctx.func.block_label(bb);
    ctx.label_pos[label.index()] = ctx.code_pos();
    let mark = ctx.queue.len();

    for r in ctx.func.block_body(bb) {
        let kind = ctx.func.node(r).kind.clone();
        match kind {
            NodeKind::LineInfo { file, line } => {
                ctx.line_table.push((file, line, ctx.code_pos()));
            }
            _ if kind.has_side_effects() => {
                ctx.kill_flags(backend);
                ctx.queue.enqueue(r);
                resolve(ctx, backend, r);
            }
            _ => {
                ctx.queue.enqueue(r);
            }
        }
    }

    eval_terminator(ctx, backend, bb);

    ctx.queue.truncate_to(mark);
}

fn eval_terminator(ctx: &mut LowerCtx, backend: &dyn Backend, bb: BasicBlock) {
    let kind = ctx.func.node(bb.end).kind.clone();
    let own_label = ctx.func.block_label(bb);
    let fallthrough = next_block_label(ctx, own_label);
    match kind {
        NodeKind::Ret { value } => {
            if let Some(v) = value {
                resolve(ctx, backend, v);
            }
            ctx.kill_flags(backend);
            backend.return_(ctx, value);
            if Some(own_label) != last_block_label(ctx) {
                backend.ret_jmp(ctx);
            }
        }
        NodeKind::Goto { target } => {
            crate::gad::phi::resolve_edge(ctx, backend, own_label, target);
            if Some(target) != fallthrough {
                backend.jump(ctx, target);
            }
        }
        NodeKind::If { cond, if_true, if_false } => {
            resolve(ctx, backend, cond);
            crate::gad::phi::resolve_edge(ctx, backend, own_label, if_true);
            crate::gad::phi::resolve_edge(ctx, backend, own_label, if_false);
            let ft = fallthrough.unwrap_or(if_false);
            backend.branch_if(ctx, cond, ft, if_true, if_false);
        }
        NodeKind::Switch { value, default, cases } => {
            resolve(ctx, backend, value);
            crate::gad::phi::resolve_edge(ctx, backend, own_label, default);
            for (_, target) in &cases {
                crate::gad::phi::resolve_edge(ctx, backend, own_label, *target);
            }
            backend.switch_dispatch(ctx, value, default, &cases);
        }
        NodeKind::Unreachable => {}
        other => unreachable!("{:?} is not a terminator", other),
    }
}

fn next_block_label(ctx: &LowerCtx, label: crate::ir::entities::Label) -> Option<crate::ir::entities::Label> {
    let blocks = ctx.func.blocks();
    let pos = blocks.iter().position(|bb| ctx.func.block_label(*bb) == label)?;
    blocks.get(pos + 1).map(|bb| ctx.func.block_label(*bb))
}

fn last_block_label(ctx: &LowerCtx) -> Option<crate::ir::entities::Label> {
    ctx.func.blocks().last().map(|bb| ctx.func.block_label(*bb))
}
