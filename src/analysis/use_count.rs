//! Use-count analysis (§4.2): for each non-leaf node, every input
//! increments its definition's counter. The allocator consults this to
//! decide when a register is free — once the last use has been consumed,
//! its register can be recycled without waiting for a later pass.

use crate::ir::entities::Reg;
use crate::ir::function::Function;

/// Dense use-count table, indexed by `Reg::index()`.
#[derive(Debug, Default)]
pub struct UseCounts {
    counts: Vec<u32>,
}

impl UseCounts {
    /// Testable property 2: for every function, `use_count(r)` equals the
    /// number of node-input occurrences of `r`, found here by exhaustive
    /// traversal of every node's inputs.
    pub fn compute(f: &Function) -> Self {
        let mut counts = vec![0u32; f.node_count()];
        for bb in f.blocks() {
            for r in f.block_body(*bb).chain(std::iter::once(bb.end)) {
                f.node(r).kind.for_each_input(|input| {
                    counts[input.index()] += 1;
                });
            }
        }
        UseCounts { counts }
    }

    pub fn get(&self, r: Reg) -> u32 {
        self.counts.get(r.index()).copied().unwrap_or(0)
    }

    /// `true` if nothing in the function reads `r`.
    pub fn is_dead(&self, r: Reg) -> bool {
        self.get(r) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::ir::function::{Linkage, Prototype};
    use crate::ir::node::WrapFlags;
    use crate::ir::FunctionBuilder;
    use crate::isa::CallConv;

    #[test]
    fn matches_exhaustive_traversal() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        let (c1, sum);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let id = b.new_label_id();
            b.label(id);
            c1 = b.iconst(DataType::i32(), 1);
            let c2 = b.iconst(DataType::i32(), 2);
            sum = b.add(DataType::i32(), c1, c1, WrapFlags::empty());
            let _ = c2;
            b.ret(Some(sum));
        }
        let counts = UseCounts::compute(&f);
        // c1 is read twice by `add` and the never-referenced c2 is dead.
        assert_eq!(counts.get(c1), 2);
        assert_eq!(counts.get(sum), 1);
        let c2 = Reg::new((c1.index() + 1) as u32);
        assert!(counts.is_dead(c2));
    }
}
