//! `(a + b) * (a - b)`, including the `INT32_MIN` wrap-around case
//! (spec §8 "Straight-line arithmetic").

use forge_codegen::ir::entities::FuncId;
use forge_codegen::ir::function::{Linkage, Prototype};
use forge_codegen::ir::node::WrapFlags;
use forge_codegen::ir::FunctionBuilder;
use forge_codegen::isa::CallConv;
use forge_codegen::{DataType, IselMode, Module};
use target_lexicon::triple;

fn build(module: &Module) -> FuncId {
    let mut proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
    proto.add_param(DataType::i32());
    proto.add_param(DataType::i32());
    let id = module.declare_function("f", Linkage::Export, proto.clone());
    module.with_function_mut(id, |f| {
        f.set_prototype(proto);
        let mut b = FunctionBuilder::new(f);
        let entry = b.new_label_id();
        b.label(entry);
        let a = b.param(0);
        let c = b.param(1);
        let sum = b.add(DataType::i32(), a, c, WrapFlags::empty());
        let diff = b.sub(DataType::i32(), a, c, WrapFlags::empty());
        let prod = b.mul(DataType::i32(), sum, diff, WrapFlags::empty());
        b.ret(Some(prod));
    });
    id
}

fn jit_fn(module: &Module, id: FuncId) -> extern "C" fn(i32, i32) -> i32 {
    module.compile_function(id, IselMode::Fast);
    let jit = module.export_jit();
    let ptr = jit.get_jit_func(id);
    unsafe { std::mem::transmute(ptr) }
}

#[test]
fn computes_difference_of_squares() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let id = build(&module);
    let f = jit_fn(&module, id);
    assert_eq!(f(7, 3), 40);
}

#[test]
fn zero_inputs_yield_zero() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let id = build(&module);
    let f = jit_fn(&module, id);
    assert_eq!(f(0, 0), 0);
}

#[test]
fn int_min_wraps_on_addition() {
    let module = Module::create(&triple!("x86_64-unknown-linux-gnu"), true);
    let id = build(&module);
    let f = jit_fn(&module, id);
    assert_eq!(f(i32::MIN, 1), -i32::MAX - 1);
}
