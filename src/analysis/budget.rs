//! Call-param high-water mark (§4.2) and the per-function scratch tally
//! supplemented from `original_source/src/tb/codegen/generic_addrdesc.h`'s
//! `tally_memory_usage_simple`.
//!
//! The original sizes every per-function scratch buffer (label table,
//! label patches, return patches) from static node counts before lowering
//! starts, rather than growing `Vec`s as it goes. We keep the idea as a
//! cheap pre-pass that sizes the per-function `bumpalo` arena allocation
//! once (`Budget::scratch_bytes`), purely as a throughput optimization —
//! nothing observable depends on it.

use crate::ir::function::Function;
use crate::ir::node::NodeKind;

/// Sizing information computed once per function before lowering begins.
#[derive(Debug, Default, Clone, Copy)]
pub struct Budget {
    /// Maximum parameter count across every `Call`/`VCall`/`ECall` node;
    /// determines the stack area reserved for outgoing arguments.
    pub max_call_params: u32,
    /// `Local` node count, used to pre-size the stack-slot table.
    pub locals_count: u32,
    /// `If` contributes 2 label patches, `Goto` 1, `Switch` `1 + arms`.
    pub label_patch_count: u32,
    /// `LineInfo` node count, to pre-size the line table.
    pub line_info_count: u32,
}

impl Budget {
    pub fn compute(f: &Function) -> Self {
        let mut budget = Budget::default();
        for bb in f.blocks() {
            for r in f.block_body(*bb).chain(std::iter::once(bb.end)) {
                match &f.node(r).kind {
                    NodeKind::Local { .. } => budget.locals_count += 1,
                    NodeKind::LineInfo { .. } => budget.line_info_count += 1,
                    NodeKind::Call { args, .. } | NodeKind::ECall { args, .. } => {
                        budget.max_call_params = budget.max_call_params.max(args.len() as u32);
                    }
                    NodeKind::VCall { args, .. } => {
                        budget.max_call_params = budget.max_call_params.max(args.len() as u32);
                    }
                    NodeKind::Goto { .. } => budget.label_patch_count += 1,
                    NodeKind::If { .. } => budget.label_patch_count += 2,
                    NodeKind::Switch { cases, .. } => {
                        budget.label_patch_count += 1 + cases.len() as u32
                    }
                    _ => {}
                }
            }
        }
        // Parameters are locals too, for stack-table sizing purposes.
        budget.locals_count += f.prototype.param_count() as u32;
        budget
    }

    /// Rough scratch-buffer size in bytes to pre-reserve from the
    /// per-thread arena for this function's lowering (label table +
    /// label-patch list + line table), matching the spirit of the
    /// original's `tally_memory_usage_simple`.
    pub fn scratch_bytes(&self) -> usize {
        let label_table = 8 * 16; // generous fixed label-count guess, refined by the caller
        let label_patches = self.label_patch_count as usize * 12;
        let line_table = self.line_info_count as usize * 12;
        label_table + label_patches + line_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::ir::entities::{ExternId, FuncId};
    use crate::ir::function::{Linkage, Prototype};
    use crate::ir::node::InputList;
    use crate::ir::FunctionBuilder;
    use crate::isa::CallConv;

    #[test]
    fn max_call_params_tracks_largest_call() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let id = b.new_label_id();
            b.label(id);
            let a = b.iconst(DataType::i32(), 1);
            let mut args: InputList = Default::default();
            args.push(a);
            args.push(a);
            args.push(a);
            let call = b.call(DataType::i32(), FuncId::from_u32(0), args);
            let args2: InputList = Default::default();
            let _ = b.ecall(DataType::i32(), ExternId::from_u32(0), args2);
            b.ret(Some(call));
        }
        let budget = Budget::compute(&f);
        assert_eq!(budget.max_call_params, 3);
    }

    #[test]
    fn label_patch_count_matches_terminator_shape() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let l0 = b.new_label_id();
            let l1 = b.new_label_id();
            b.label(l0);
            let c = b.iconst(DataType::bool_(), 1);
            b.if_(c, l1, l1);
            b.label(l1);
            b.ret(None);
        }
        let budget = Budget::compute(&f);
        assert_eq!(budget.label_patch_count, 2);
    }
}
