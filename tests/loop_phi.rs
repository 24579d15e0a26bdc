//! `sum(n) { s=0; for(i=0;i<n;i++) s+=i; return s; }`, exercising PHI
//! resolution at a loop header (spec §8 "Loop with PHI").

use forge_codegen::ir::entities::{Label, Reg};
use forge_codegen::ir::function::{Function, Linkage, Prototype};
use forge_codegen::ir::node::{IntCc, NodeKind, PhiEdge, WrapFlags};
use forge_codegen::ir::FunctionBuilder;
use forge_codegen::isa::CallConv;
use forge_codegen::{DataType, IselMode, Module};
use target_lexicon::triple;

/// Back-patch a `Phi2` node's edge coming from `from_label` once the
/// value flowing in on that edge has actually been built. The builder has
/// no forward-reference mechanism, so loop headers create their PHIs with
/// a placeholder edge value and fix it up after the loop body is built.
fn patch_phi_edge(f: &mut Function, phi: Reg, from_label: Label, value: Reg) {
    if let NodeKind::Phi2 { a, b, .. } = &mut f.node_mut(phi).kind {
        for edge in [a, b] {
            if edge.label == from_label {
                edge.value = value;
            }
        }
    } else {
        unreachable!("expected a Phi2 node");
    }
}

#[test]
fn sums_zero_through_n_minus_one() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let mut proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
    proto.add_param(DataType::i32());
    let id = module.declare_function("sum", Linkage::Export, proto.clone());

    module.with_function_mut(id, |f| {
        f.set_prototype(proto);
        let mut b = FunctionBuilder::new(f);
        let preheader = b.new_label_id();
        let header = b.new_label_id();
        let body = b.new_label_id();
        let exit = b.new_label_id();

        b.label(preheader);
        let n = b.param(0);
        let zero = b.iconst(DataType::i32(), 0);
        b.goto(header);

        b.label(header);
        let s_phi = b.phi(
            DataType::i32(),
            vec![
                PhiEdge { label: preheader, value: zero },
                PhiEdge { label: body, value: Reg::NULL }, // patched below
            ],
        );
        let i_phi = b.phi(
            DataType::i32(),
            vec![
                PhiEdge { label: preheader, value: zero },
                PhiEdge { label: body, value: Reg::NULL }, // patched below
            ],
        );
        let cond = b.icmp(IntCc::SignedLt, i_phi, n);
        b.if_(cond, body, exit);

        b.label(body);
        let one = b.iconst(DataType::i32(), 1);
        let s_next = b.add(DataType::i32(), s_phi, i_phi, WrapFlags::empty());
        let i_next = b.add(DataType::i32(), i_phi, one, WrapFlags::empty());
        // Back-patch the PHI edges coming from `body` now that its values exist.
        patch_phi_edge(b.func, s_phi, body, s_next);
        patch_phi_edge(b.func, i_phi, body, i_next);
        b.goto(header);

        b.label(exit);
        b.ret(Some(s_phi));
    });

    module.compile_function(id, IselMode::Fast);
    let jit = module.export_jit();
    let ptr = jit.get_jit_func(id);
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(ptr) };
    assert_eq!(f(10), 45);
}
