//! `if (x == 0) return 1; else return 2;` — the comparator's flags must
//! be consumed directly by the branch, with no redundant SETcc/MOVZX
//! materialization in between (spec §8 "Branch with flags reuse").

use forge_codegen::ir::function::{Linkage, Prototype};
use forge_codegen::ir::node::IntCc;
use forge_codegen::ir::FunctionBuilder;
use forge_codegen::isa::CallConv;
use forge_codegen::{DataType, IselMode, Module};
use target_lexicon::triple;

fn build(module: &Module) -> forge_codegen::ir::entities::FuncId {
    let mut proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
    proto.add_param(DataType::i32());
    let id = module.declare_function("f", Linkage::Export, proto.clone());
    module.with_function_mut(id, |f| {
        f.set_prototype(proto);
        let mut b = FunctionBuilder::new(f);
        let entry = b.new_label_id();
        let then_blk = b.new_label_id();
        let else_blk = b.new_label_id();

        b.label(entry);
        let x = b.param(0);
        let zero = b.iconst(DataType::i32(), 0);
        let eq = b.icmp(IntCc::Eq, x, zero);
        b.if_(eq, then_blk, else_blk);

        b.label(then_blk);
        let one = b.iconst(DataType::i32(), 1);
        b.ret(Some(one));

        b.label(else_blk);
        let two = b.iconst(DataType::i32(), 2);
        b.ret(Some(two));
    });
    id
}

/// Count occurrences of `CMP r/m32, imm32` (`81 /7`) in a byte stream.
fn count_cmp_ri(code: &[u8]) -> usize {
    code.windows(2).filter(|w| w[0] == 0x81 && w[1] >= 0xf8).count()
}

/// Count occurrences of `Jcc rel32` (`0F 8x`).
fn count_jcc(code: &[u8]) -> usize {
    code.windows(2).filter(|w| w[0] == 0x0f && (0x80..=0x8f).contains(&w[1])).count()
}

/// Count occurrences of `SETcc r8` (`0F 9x`).
fn count_setcc(code: &[u8]) -> usize {
    code.windows(2).filter(|w| w[0] == 0x0f && (0x90..=0x9f).contains(&w[1])).count()
}

#[test]
fn flags_are_consumed_directly_by_the_branch() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let id = build(&module);
    module.compile_function(id, IselMode::Fast);

    let code = module.with_function(id, |f| f.compiled_output.as_ref().unwrap().code.clone());
    assert_eq!(count_cmp_ri(&code), 1, "exactly one CMP expected");
    assert_eq!(count_jcc(&code), 1, "exactly one Jcc expected");
    assert_eq!(count_setcc(&code), 0, "flags should be consumed without materializing a boolean");

    let jit = module.export_jit();
    let ptr = jit.get_jit_func(id);
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(ptr) };
    assert_eq!(f(0), 1);
    assert_eq!(f(5), 2);
}
