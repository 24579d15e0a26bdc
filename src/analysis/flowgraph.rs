//! Control-flow graph: predecessor/successor `Label` sets, computed from
//! each block's terminator. This underlies testable property 4 (PHI
//! well-formedness): the set of source labels of a PHI must equal the set
//! of predecessor labels of its containing block.
//!
//! Adapted from the teacher's `flowgraph::ControlFlowGraph`, but keyed
//! directly by `Label` (our blocks don't have a separate "last
//! instruction" identity the way EBB-based CFGs track branch sites) and
//! rebuilt eagerly from a whole function rather than incrementally
//! maintained across edits, since the GAD only ever needs it once per
//! lowering.

use std::collections::{HashMap, HashSet};

use crate::ir::entities::Label;
use crate::ir::function::Function;
use crate::ir::node::NodeKind;

/// Maps each block (by its `Label`) to its predecessor and successor
/// labels.
#[derive(Debug, Default)]
pub struct ControlFlowGraph {
    predecessors: HashMap<Label, HashSet<Label>>,
    successors: HashMap<Label, HashSet<Label>>,
}

impl ControlFlowGraph {
    pub fn compute(f: &Function) -> Self {
        let mut cfg = ControlFlowGraph::default();
        for bb in f.blocks() {
            let from = f.block_label(*bb);
            cfg.predecessors.entry(from).or_default();
            cfg.successors.entry(from).or_default();
            for to in successors_of_terminator(&f.node(bb.end).kind) {
                cfg.successors.entry(from).or_default().insert(to);
                cfg.predecessors.entry(to).or_default().insert(from);
            }
        }
        cfg
    }

    pub fn predecessors(&self, label: Label) -> HashSet<Label> {
        self.predecessors.get(&label).cloned().unwrap_or_default()
    }

    pub fn successors(&self, label: Label) -> HashSet<Label> {
        self.successors.get(&label).cloned().unwrap_or_default()
    }
}

fn successors_of_terminator(kind: &NodeKind) -> Vec<Label> {
    match kind {
        NodeKind::Goto { target } => vec![*target],
        NodeKind::If { if_true, if_false, .. } => vec![*if_true, *if_false],
        NodeKind::Switch { default, cases, .. } => {
            let mut out = vec![*default];
            out.extend(cases.iter().map(|(_, l)| *l));
            out
        }
        NodeKind::Ret { .. } | NodeKind::Unreachable => vec![],
        other => unreachable!("{:?} is not a terminator", other),
    }
}

/// Testable property 4: for every PHI `p` in block `label`, the set of
/// source labels in `p` equals the set of predecessor labels of `label`.
pub fn phi_sources_match_predecessors(f: &Function, cfg: &ControlFlowGraph) -> Result<(), String> {
    for bb in f.blocks() {
        let label = f.block_label(*bb);
        let preds = cfg.predecessors(label);
        for r in f.block_body(*bb) {
            let sources: Option<HashSet<Label>> = match &f.node(r).kind {
                NodeKind::Phi2 { a, b, .. } => Some([a.label, b.label].into_iter().copied().collect()),
                NodeKind::PhiN { edges, .. } => Some(edges.iter().map(|e| e.label).collect()),
                _ => None,
            };
            if let Some(sources) = sources {
                if sources != preds {
                    return Err(format!(
                        "{} in {}: phi sources {:?} != predecessors {:?}",
                        r, label, sources, preds
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::ir::function::{Linkage, Prototype};
    use crate::ir::node::PhiEdge;
    use crate::ir::FunctionBuilder;
    use crate::isa::CallConv;

    fn diamond_with_phi(well_formed: bool) -> Function {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), true);
        let mut f = Function::new("f", Linkage::Export, proto);
        let mut b = FunctionBuilder::new(&mut f);
        let entry = b.new_label_id();
        let left = b.new_label_id();
        let right = b.new_label_id();
        let join = b.new_label_id();

        b.label(entry);
        let cond = b.iconst(DataType::bool_(), 1);
        b.if_(cond, left, right);

        b.label(left);
        let lv = b.iconst(DataType::i32(), 1);
        b.goto(join);

        b.label(right);
        let rv = b.iconst(DataType::i32(), 2);
        b.goto(join);

        b.label(join);
        let edges = if well_formed {
            vec![PhiEdge { label: left, value: lv }, PhiEdge { label: right, value: rv }]
        } else {
            // Wrong: claims both edges come from `left`.
            vec![PhiEdge { label: left, value: lv }, PhiEdge { label: left, value: rv }]
        };
        let phi = b.phi(DataType::i32(), edges);
        b.ret(Some(phi));
        drop(b);
        f
    }

    #[test]
    fn well_formed_phi_matches_predecessors() {
        let f = diamond_with_phi(true);
        let cfg = ControlFlowGraph::compute(&f);
        assert!(phi_sources_match_predecessors(&f, &cfg).is_ok());
    }

    #[test]
    fn malformed_phi_is_detected() {
        let f = diamond_with_phi(false);
        let cfg = ControlFlowGraph::compute(&f);
        assert!(phi_sources_match_predecessors(&f, &cfg).is_err());
    }
}
