//! IR builder (§4.1): operations that allocate and link nodes at a
//! caller-chosen insertion point.
//!
//! The builder keeps an implicit "current label" cursor — convenience
//! constructors append after it and advance the previous tail's `next`.
//! Unlike `cranelift-frontend`'s `FunctionBuilder`, which tracks position
//! as an `(Ebb, basic_block)` pair into a separately-laid-out instruction
//! list, our nodes thread themselves (`Node::next`), so the builder only
//! needs to remember the tail `Reg` to splice after.

use crate::data_type::DataType;
use crate::ir::entities::{AttrId, ExternId, FuncId, GlobalId, Label, Reg, StackSlotId};
use crate::ir::function::{Attribute, BasicBlock, Function};
use crate::ir::node::{FloatCc, InputList, IntCc, Node, NodeKind, PhiEdge, WrapFlags};
use crate::error::fatal_precondition;

/// Builds a single [`Function`]'s body. Create one per function; it
/// borrows the function mutably for its lifetime.
pub struct FunctionBuilder<'f> {
    pub func: &'f mut Function,
    /// Tail of the thread built so far; the next node appended is linked
    /// after this one.
    cursor: Reg,
    /// Start (`Label` node) of the block currently being built, if one is
    /// open.
    current_block_start: Option<Reg>,
    next_label_ordinal: u32,
}

impl<'f> FunctionBuilder<'f> {
    /// Begin building `func`'s body. The cursor starts at the function's
    /// synthetic entry anchor (`Reg::ENTRY`); the first call should be
    /// `label(new_label_id())` to open block 0.
    pub fn new(func: &'f mut Function) -> Self {
        FunctionBuilder {
            func,
            cursor: Reg::ENTRY,
            current_block_start: None,
            next_label_ordinal: 0,
        }
    }

    /// Reserve a dense `Label` ordinal without materializing its node yet
    /// (needed so forward branches can reference a not-yet-built block).
    pub fn new_label_id(&mut self) -> Label {
        let id = Label::from_u32(self.next_label_ordinal);
        self.next_label_ordinal += 1;
        id
    }

    /// Append the `Reg` to the current thread and advance the cursor.
    fn splice(&mut self, node: Node) -> Reg {
        let r = self.func.push_node(node);
        self.func.node_mut(self.cursor).next = r;
        self.cursor = r;
        r
    }

    /// Materialize a `Label` node at the cursor, opening a new block. It
    /// is a precondition violation to open a block while another is still
    /// open (the previous one must have been closed with a terminator).
    pub fn label(&mut self, id: Label) -> Reg {
        if self.current_block_start.is_some() {
            fatal_precondition("label() called without terminating the previous block");
        }
        let r = self.splice(Node::new(
            NodeKind::Label {
                id,
                terminator: Reg::NULL,
            },
            DataType::void(),
        ));
        self.current_block_start = Some(r);
        r
    }

    /// Append a non-terminator, non-PHI node after the cursor.
    fn push(&mut self, kind: NodeKind, ty: DataType) -> Reg {
        if self.current_block_start.is_none() {
            fatal_precondition("instruction built outside any block (call label() first)");
        }
        self.splice(Node::new(kind, ty))
    }

    fn close_block(&mut self, terminator: Reg) {
        let start = self
            .current_block_start
            .take()
            .unwrap_or_else(|| fatal_precondition("terminator built outside any block"));
        match &mut self.func.node_mut(start).kind {
            NodeKind::Label { terminator: t, .. } => *t = terminator,
            _ => unreachable!(),
        }
        self.func.push_block(BasicBlock {
            start,
            end: terminator,
        });
    }

    // ---- leaves ----------------------------------------------------------

    pub fn iconst(&mut self, ty: DataType, bits: i64) -> Reg {
        self.push(NodeKind::IntegerConst { bits }, ty)
    }

    pub fn fconst(&mut self, ty: DataType, bits: f64) -> Reg {
        self.push(NodeKind::FloatConst { bits }, ty)
    }

    pub fn local(&mut self, size: u32, align: u32) -> Reg {
        let slot = self.func.create_stack_slot(size, align);
        self.push(NodeKind::Local { slot }, DataType::pointer())
    }

    pub fn string_const(&mut self, data: std::sync::Arc<[u8]>) -> Reg {
        self.push(NodeKind::StringConst { data }, DataType::pointer())
    }

    /// Take the address of a declared parameter, spilling it to the stack
    /// on first use (see `isa::x86_64::X86_64Backend::resolve_value`).
    pub fn param_addr(&mut self, index: usize) -> Reg {
        self.push(NodeKind::ParamAddr { index: index as u32 }, DataType::pointer())
    }

    pub fn global_address(&mut self, global: GlobalId) -> Reg {
        self.push(NodeKind::GlobalAddress { global }, DataType::pointer())
    }

    pub fn func_address(&mut self, func: FuncId) -> Reg {
        self.push(NodeKind::FuncAddress { func }, DataType::pointer())
    }

    pub fn extern_address(&mut self, ext: ExternId) -> Reg {
        self.push(NodeKind::ExternAddress { ext }, DataType::pointer())
    }

    /// Access a declared parameter's value register (already materialized
    /// by `Function::set_prototype`).
    pub fn param(&self, index: usize) -> Reg {
        self.func.params_cache[index]
    }

    // ---- arithmetic --------------------------------------------------------

    pub fn add(&mut self, ty: DataType, a: Reg, b: Reg, flags: WrapFlags) -> Reg {
        self.push(NodeKind::Add { a, b, flags }, ty)
    }

    pub fn sub(&mut self, ty: DataType, a: Reg, b: Reg, flags: WrapFlags) -> Reg {
        self.push(NodeKind::Sub { a, b, flags }, ty)
    }

    pub fn mul(&mut self, ty: DataType, a: Reg, b: Reg, flags: WrapFlags) -> Reg {
        self.push(NodeKind::Mul { a, b, flags }, ty)
    }

    pub fn sdiv(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::SDiv { a, b }, ty)
    }

    pub fn udiv(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::UDiv { a, b }, ty)
    }

    pub fn and(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::And { a, b }, ty)
    }

    pub fn or(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::Or { a, b }, ty)
    }

    pub fn xor(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::Xor { a, b }, ty)
    }

    pub fn not(&mut self, ty: DataType, a: Reg) -> Reg {
        self.push(NodeKind::Not { a }, ty)
    }

    pub fn neg(&mut self, ty: DataType, a: Reg) -> Reg {
        self.push(NodeKind::Neg { a }, ty)
    }

    pub fn shl(&mut self, ty: DataType, a: Reg, b: Reg, flags: WrapFlags) -> Reg {
        self.push(NodeKind::Shl { a, b, flags }, ty)
    }

    pub fn shr(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::Shr { a, b }, ty)
    }

    pub fn sar(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::Sar { a, b }, ty)
    }

    pub fn fadd(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::FAdd { a, b }, ty)
    }

    pub fn fsub(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::FSub { a, b }, ty)
    }

    pub fn fmul(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::FMul { a, b }, ty)
    }

    pub fn fdiv(&mut self, ty: DataType, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::FDiv { a, b }, ty)
    }

    pub fn icmp(&mut self, cc: IntCc, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::IntCompare { cc, a, b }, DataType::bool_())
    }

    pub fn fcmp(&mut self, cc: FloatCc, a: Reg, b: Reg) -> Reg {
        self.push(NodeKind::FloatCompare { cc, a, b }, DataType::bool_())
    }

    pub fn sext(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::SignExt { a, to }, to)
    }

    pub fn zext(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::ZeroExt { a, to }, to)
    }

    pub fn truncate(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::Truncate { a, to }, to)
    }

    pub fn int_to_float(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::IntToFloat { a, to }, to)
    }

    pub fn float_to_int(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::FloatToInt { a, to }, to)
    }

    pub fn int_to_ptr(&mut self, a: Reg) -> Reg {
        self.push(NodeKind::IntToPtr { a }, DataType::pointer())
    }

    pub fn ptr_to_int(&mut self, to: DataType, a: Reg) -> Reg {
        self.push(NodeKind::PtrToInt { a, to }, to)
    }

    // ---- memory --------------------------------------------------------

    pub fn load(&mut self, ty: DataType, addr: Reg, volatile: bool) -> Reg {
        self.push(NodeKind::Load { addr, ty, volatile }, ty)
    }

    pub fn store(&mut self, addr: Reg, value: Reg, volatile: bool) -> Reg {
        self.push(NodeKind::Store { addr, value, volatile }, DataType::void())
    }

    pub fn array_access(&mut self, base: Reg, index: Reg, stride: u32) -> Reg {
        self.push(NodeKind::ArrayAccess { base, index, stride }, DataType::pointer())
    }

    pub fn member_access(&mut self, base: Reg, offset: u32) -> Reg {
        self.push(NodeKind::MemberAccess { base, offset }, DataType::pointer())
    }

    // ---- control flow ----------------------------------------------------

    pub fn goto(&mut self, target: Label) -> Reg {
        let r = self.push_terminator(NodeKind::Goto { target });
        self.close_block(r);
        r
    }

    pub fn if_(&mut self, cond: Reg, if_true: Label, if_false: Label) -> Reg {
        let r = self.push_terminator(NodeKind::If {
            cond,
            if_true,
            if_false,
        });
        self.close_block(r);
        r
    }

    pub fn switch(&mut self, value: Reg, default: Label, cases: Vec<(i64, Label)>) -> Reg {
        let r = self.push_terminator(NodeKind::Switch {
            value,
            default,
            cases,
        });
        self.close_block(r);
        r
    }

    pub fn ret(&mut self, value: Option<Reg>) -> Reg {
        let r = self.push_terminator(NodeKind::Ret { value });
        self.close_block(r);
        r
    }

    pub fn unreachable(&mut self) -> Reg {
        let r = self.push_terminator(NodeKind::Unreachable);
        self.close_block(r);
        r
    }

    fn push_terminator(&mut self, kind: NodeKind) -> Reg {
        if self.current_block_start.is_none() {
            fatal_precondition("terminator built outside any block");
        }
        self.splice(Node::new(kind, DataType::void()))
    }

    // ---- calls --------------------------------------------------------------

    pub fn call(&mut self, ty: DataType, func: FuncId, args: InputList) -> Reg {
        self.push(NodeKind::Call { func, args }, ty)
    }

    pub fn ecall(&mut self, ty: DataType, ext: ExternId, args: InputList) -> Reg {
        self.push(NodeKind::ECall { ext, args }, ty)
    }

    pub fn vcall(&mut self, ty: DataType, target: Reg, args: InputList) -> Reg {
        self.push(NodeKind::VCall { target, args, ret: ty }, ty)
    }

    pub fn line_info(&mut self, file: u32, line: u32) -> Reg {
        self.push(NodeKind::LineInfo { file, line }, DataType::void())
    }

    pub fn trap(&mut self) -> Reg {
        self.push(NodeKind::Trap, DataType::void())
    }

    pub fn debug_break(&mut self) -> Reg {
        self.push(NodeKind::DebugBreak, DataType::void())
    }

    pub fn keep_alive(&mut self, value: Reg) -> Reg {
        self.push(NodeKind::KeepAlive { value }, DataType::void())
    }

    // ---- PHIs --------------------------------------------------------------

    /// Build a PHI from `{label, value}` pairs: exactly two pairs produce a
    /// `Phi2`, any other count a `PhiN`. Per §4.1, the core does not verify
    /// here that the pairs' labels match the containing block's actual
    /// predecessors — that invariant is checked by the GAD at lowering
    /// time (and by `analysis::flowgraph` in tests).
    pub fn phi(&mut self, ty: DataType, edges: Vec<PhiEdge>) -> Reg {
        if edges.len() < 2 {
            fatal_precondition("a PHI must have at least two incoming edges");
        }
        let kind = if edges.len() == 2 {
            NodeKind::Phi2 {
                a: edges[0],
                b: edges[1],
                ty,
            }
        } else {
            NodeKind::PhiN { edges, ty }
        };
        self.push(kind, ty)
    }

    // ---- attributes --------------------------------------------------------

    pub fn no_alias(&mut self, a: Reg, b: Reg) -> AttrId {
        self.func.push_attribute(Attribute::NoAlias { a, b })
    }

    pub fn non_null(&mut self) -> AttrId {
        self.func.push_attribute(Attribute::NonNull)
    }

    pub fn set_attr(&mut self, r: Reg, attr: AttrId) {
        self.func.node_mut(r).attr = Some(attr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::CallConv;
    use crate::ir::function::{Linkage, Prototype};

    fn straight_line_fn() -> Function {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let id = b.new_label_id();
            b.label(id);
            let c1 = b.iconst(DataType::i32(), 1);
            let c2 = b.iconst(DataType::i32(), 2);
            let sum = b.add(DataType::i32(), c1, c2, WrapFlags::empty());
            b.ret(Some(sum));
        }
        f
    }

    #[test]
    fn single_block_has_matching_start_and_terminator() {
        let f = straight_line_fn();
        assert_eq!(f.blocks().len(), 1);
        let bb = f.blocks()[0];
        assert!(matches!(f.node(bb.end).kind, NodeKind::Ret { .. }));
        match f.node(bb.start).kind {
            NodeKind::Label { terminator, .. } => assert_eq!(terminator, bb.end),
            _ => panic!("expected Label"),
        }
    }

    #[test]
    fn body_iterates_middle_nodes_only() {
        let f = straight_line_fn();
        let bb = f.blocks()[0];
        let body: Vec<_> = f.block_body(bb).collect();
        // iconst, iconst, add: the terminator is excluded.
        assert_eq!(body.len(), 3);
    }

    #[test]
    #[should_panic]
    fn label_without_closing_previous_block_panics() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        let mut b = FunctionBuilder::new(&mut f);
        let l0 = b.new_label_id();
        let l1 = b.new_label_id();
        b.label(l0);
        b.label(l1);
    }

    #[test]
    #[should_panic]
    fn instruction_outside_block_panics() {
        let proto = Prototype::new(CallConv::SystemV, DataType::i32(), false);
        let mut f = Function::new("f", Linkage::Export, proto);
        let mut b = FunctionBuilder::new(&mut f);
        b.iconst(DataType::i32(), 0);
    }
}
