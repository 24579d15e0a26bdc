//! Recursive fib, JIT-compiled and invoked (spec §8 "Recursive fib").

use forge_codegen::ir::entities::FuncId;
use forge_codegen::ir::function::{Linkage, Prototype};
use forge_codegen::ir::node::{IntCc, WrapFlags};
use forge_codegen::ir::FunctionBuilder;
use forge_codegen::isa::CallConv;
use forge_codegen::{DataType, IselMode, Module};
use target_lexicon::triple;

fn build_fib(module: &Module) -> FuncId {
    let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
    let id = module.declare_function("fib", Linkage::Export, proto.clone());
    module.with_function_mut(id, |f| {
        f.set_prototype({
            let mut p = proto;
            p.add_param(DataType::i32());
            p
        });
        let mut b = FunctionBuilder::new(f);
        let entry = b.new_label_id();
        let base_case = b.new_label_id();
        let recurse = b.new_label_id();

        b.label(entry);
        let n = b.param(0);
        let two = b.iconst(DataType::i32(), 2);
        let is_small = b.icmp(IntCc::SignedLt, n, two);
        b.if_(is_small, base_case, recurse);

        b.label(base_case);
        b.ret(Some(n));

        b.label(recurse);
        let one = b.iconst(DataType::i32(), 1);
        let n_minus_1 = b.sub(DataType::i32(), n, one, WrapFlags::empty());
        let n_minus_2 = b.sub(DataType::i32(), n, two, WrapFlags::empty());
        let mut args1 = forge_codegen::ir::node::InputList::default();
        args1.push(n_minus_1);
        let fib1 = b.call(DataType::i32(), id, args1);
        let mut args2 = forge_codegen::ir::node::InputList::default();
        args2.push(n_minus_2);
        let fib2 = b.call(DataType::i32(), id, args2);
        let sum = b.add(DataType::i32(), fib1, fib2, WrapFlags::empty());
        b.ret(Some(sum));
    });
    id
}

#[test]
fn fib_of_35_is_9227465() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let id = build_fib(&module);
    module.compile_function(id, IselMode::Fast);

    let jit = module.export_jit();
    let ptr = jit.get_jit_func(id);
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(ptr) };
    assert_eq!(f(35), 9227465);
}
