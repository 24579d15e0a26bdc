//! Load/store of a local, and the stack-layout invariant that goes with
//! it (spec §8 "Load/store of a local").

use forge_codegen::ir::function::{Linkage, Prototype};
use forge_codegen::ir::FunctionBuilder;
use forge_codegen::isa::CallConv;
use forge_codegen::{DataType, IselMode, Module};
use target_lexicon::triple;

#[test]
fn stores_then_loads_a_local_and_stack_usage_is_aligned() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
    let id = module.declare_function("f", Linkage::Export, proto);

    module.with_function_mut(id, |f| {
        let mut b = FunctionBuilder::new(f);
        let entry = b.new_label_id();
        b.label(entry);
        let slot = b.local(4, 4);
        let forty_two = b.iconst(DataType::i32(), 42);
        b.store(slot, forty_two, false);
        let x = b.load(DataType::i32(), slot, false);
        b.ret(Some(x));
    });

    module.compile_function(id, IselMode::Fast);

    let stack_usage = module.with_function(id, |f| f.compiled_output.as_ref().unwrap().stack_usage);
    assert!(stack_usage >= 8);
    assert_eq!(stack_usage % 16, 0);

    let jit = module.export_jit();
    let ptr = jit.get_jit_func(id);
    let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(ptr) };
    assert_eq!(f(), 42);
}
