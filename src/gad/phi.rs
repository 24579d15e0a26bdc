//! PHI resolution (§4.3.5): SSA deconstruction at control-flow joins.
//!
//! A PHI's value never lives in a queue-resolved register the way an
//! ordinary def does — it lives in a fixed stack slot, written on every
//! incoming edge and read like a `Local` by whatever consumes it inside
//! the join block. This trades a register for simplicity: a PHI's home
//! doesn't depend on which predecessor control arrived from, so the join
//! block itself needs no merge logic, only a load.

use crate::gad::{Backend, LowerCtx};
use crate::ir::entities::Label;
use crate::ir::node::{NodeKind, PhiEdge};

/// Reserve a persistent stack-backed queue slot for every PHI in the
/// function, before any block is evaluated (§4.3.1: PHI slots sit outside
/// every block's rollback window).
pub fn reserve_phi_slots(ctx: &mut LowerCtx) {
    for bb in ctx.func.blocks() {
        for r in ctx.func.block_body(*bb) {
            if ctx.func.node(r).kind.is_phi() {
                ctx.queue.reserve_phi_slot(r);
            }
        }
    }
}

/// Process every PHI in the block labeled `to` whose source edge is
/// `from`, copying that edge's value into the PHI's stack home. Called
/// once per outgoing edge of a block's terminator, before the jump/branch
/// itself is emitted.
pub fn resolve_edge(ctx: &mut LowerCtx, backend: &dyn Backend, from: Label, to: Label) {
    let target_bb = match ctx.func.blocks().iter().find(|bb| ctx.func.block_label(**bb) == to) {
        Some(bb) => *bb,
        None => return,
    };
    let phis: Vec<_> = ctx
        .func
        .block_body(target_bb)
        .filter(|r| ctx.func.node(*r).kind.is_phi())
        .collect();

    for phi_reg in phis {
        let (ty, edge) = match &ctx.func.node(phi_reg).kind {
            NodeKind::Phi2 { a, b, ty } => (*ty, pick_edge(from, a, b)),
            NodeKind::PhiN { edges, ty } => (*ty, edges.iter().find(|e| e.label == from).copied()),
            _ => unreachable!("filtered to phi nodes above"),
        };
        let edge = match edge {
            Some(e) => e,
            None => continue, // this block isn't actually a predecessor of `to`
        };

        let disp = phi_disp(ctx, backend, phi_reg, ty);
        crate::gad::eval::resolve(ctx, backend, edge.value);
        backend.phi_move(ctx, disp, ty, edge.value);
    }
}

fn pick_edge(from: Label, a: &PhiEdge, b: &PhiEdge) -> Option<PhiEdge> {
    if a.label == from {
        Some(*a)
    } else if b.label == from {
        Some(*b)
    } else {
        None
    }
}

/// The PHI's assigned stack offset, allocating it on first touch. Every
/// later edge (and every in-block read of the PHI as a value) sees the
/// same offset because the queue slot, once set, is never `Unresolved`
/// again within this function's lowering.
fn phi_disp(ctx: &mut LowerCtx, backend: &dyn Backend, phi_reg: crate::ir::entities::Reg, ty: crate::data_type::DataType) -> i32 {
    match ctx.queue.get(phi_reg) {
        crate::regalloc::value::Value::StackSlot { disp, .. } => disp,
        crate::regalloc::value::Value::Unresolved => {
            let disp = backend.make_stack_slot(ctx, ty.size(), ty.align());
            ctx.queue.set(phi_reg, crate::regalloc::value::Value::StackSlot { disp, is_spill: true });
            ctx.stack_slot_table.push((format!("%{}", phi_reg), disp, ty));
            disp
        }
        other => crate::error::fatal_precondition(format!(
            "phi {} already resolved to non-stack value {:?}",
            phi_reg, other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_edge_matches_by_label() {
        let l0 = Label::from_u32(0);
        let l1 = Label::from_u32(1);
        let a = PhiEdge { label: l0, value: crate::ir::entities::Reg::new(2) };
        let b = PhiEdge { label: l1, value: crate::ir::entities::Reg::new(3) };
        assert_eq!(pick_edge(l0, &a, &b).map(|e| e.value), Some(a.value));
        assert_eq!(pick_edge(l1, &a, &b).map(|e| e.value), Some(b.value));
        let l2 = Label::from_u32(2);
        assert!(pick_edge(l2, &a, &b).is_none());
    }
}
