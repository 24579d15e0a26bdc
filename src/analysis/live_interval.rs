//! Live-interval analysis (§4.2): for each `Reg`, the largest source-order
//! index at which it is read. A single linear pass in source order records
//! `last_use[input] = max(last_use[input], current)`. A `Reg` whose
//! last-use is `0` is dead (the 0th node is the reserved null slot, never
//! a real definition, so `0` can double as "never observed").

use crate::analysis::ordinal::Ordinals;
use crate::ir::entities::Reg;
use crate::ir::function::Function;

/// Dense last-use table, indexed by `Reg::index()`.
#[derive(Debug, Default)]
pub struct LiveIntervals {
    last_use: Vec<u32>,
}

impl LiveIntervals {
    /// Testable property 3: for every `r`, `last_use(r) >= def_pos(r)` and
    /// `last_use(r) == 0 <=> r has no uses`. The pass walks nodes in
    /// source order via `Ordinals` and records the max ordinal at which
    /// each input is read.
    pub fn compute(f: &Function, ordinals: &Ordinals) -> Self {
        let mut last_use = vec![0u32; f.node_count()];
        for bb in f.blocks() {
            for r in f.block_body(*bb).chain(std::iter::once(bb.end)) {
                let current = ordinals.get(r);
                f.node(r).kind.for_each_input(|input| {
                    let slot = &mut last_use[input.index()];
                    *slot = (*slot).max(current);
                });
            }
        }
        LiveIntervals { last_use }
    }

    pub fn last_use(&self, r: Reg) -> u32 {
        self.last_use.get(r.index()).copied().unwrap_or(0)
    }

    pub fn record_use(&mut self, r: Reg, at: u32) {
        if self.last_use.len() <= r.index() {
            self.last_use.resize(r.index() + 1, 0);
        }
        let slot = &mut self.last_use[r.index()];
        *slot = (*slot).max(at);
    }

    pub fn is_dead(&self, r: Reg) -> bool {
        self.last_use(r) == 0
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
    fn last_use_is_monotone_and_zero_means_dead() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        let (c1, c2, sum);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let id = b.new_label_id();
            b.label(id);
            c1 = b.iconst(DataType::i32(), 1);
            c2 = b.iconst(DataType::i32(), 2);
            sum = b.add(DataType::i32(), c1, c2, WrapFlags::empty());
            b.ret(Some(sum));
        }
        let ordinals = Ordinals::compute(&f);
        let intervals = LiveIntervals::compute(&f, &ordinals);

        assert!(intervals.last_use(c1) >= ordinals.get(c1));
        assert!(intervals.last_use(c2) >= ordinals.get(c2));
        assert!(!intervals.is_dead(c1));
        assert!(!intervals.is_dead(sum));

        let never_used = Reg::new(0);
        assert!(intervals.is_dead(never_used));
    }
}
