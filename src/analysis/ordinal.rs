//! Ordinal analysis (§4.2): a monotonically-increasing integer assigned to
//! every node in source order, used to cheaply compare relative positions
//! after an optimizer has reshuffled `Reg` numbering (new nodes get higher
//! `Reg`s than old ones regardless of where they're spliced in).

use crate::ir::entities::Reg;
use crate::ir::function::Function;

/// Dense ordinal table, indexed by `Reg::index()`.
#[derive(Debug, Default)]
pub struct Ordinals {
    ordinal: Vec<u32>,
}

impl Ordinals {
    pub fn compute(f: &Function) -> Self {
        let mut ordinal = vec![0u32; f.node_count()];
        let mut next = 1u32;
        for bb in f.blocks() {
            ordinal[bb.start.index()] = next;
            next += 1;
            for r in f.block_body(*bb) {
                ordinal[r.index()] = next;
                next += 1;
            }
            ordinal[bb.end.index()] = next;
            next += 1;
        }
        Ordinals { ordinal }
    }

    pub fn get(&self, r: Reg) -> u32 {
        self.ordinal.get(r.index()).copied().unwrap_or(0)
    }

    /// `true` if `a` comes before `b` in source order.
    pub fn precedes(&self, a: Reg, b: Reg) -> bool {
        self.get(a) < self.get(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::ir::function::{Linkage, Prototype};
    use crate::ir::FunctionBuilder;
    use crate::isa::CallConv;

    #[test]
    fn ordinals_increase_monotonically_in_source_order() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        let (c1, c2);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let id = b.new_label_id();
            b.label(id);
            c1 = b.iconst(DataType::i32(), 1);
            c2 = b.iconst(DataType::i32(), 2);
            b.ret(Some(c2));
        }
        let ordinals = Ordinals::compute(&f);
        assert!(ordinals.precedes(c1, c2));
        let bb = f.blocks()[0];
        assert!(ordinals.precedes(bb.start, c1));
        assert!(ordinals.precedes(c2, bb.end));
    }
}
