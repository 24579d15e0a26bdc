//! `Function`, `BasicBlock`, `Prototype` and `Attribute`: the rest of the
//! per-procedure data model (§3).
//!
//! A `Function` owns its node vector and basic-block table; iteration over
//! a function's nodes uses the `next` thread stored on each `Node`, not
//! vector indices, so insertion/deletion stays O(1) (see
//! [`crate::ir::cursor`]).

use std::fmt;

use crate::data_type::DataType;
use crate::ir::entities::{Label, Reg, StackSlotId};
use crate::ir::node::Node;
use crate::isa::call_conv::CallConv;

/// A function's compiled output, produced by the GAD lowering pipeline
/// (§4.3) and consumed by the module's patch resolution (§4.5) and the
/// debug emitter (§6).
#[derive(Debug, Clone, Default)]
pub struct FunctionOutput {
    /// Raw machine code for this function, prologue and epilogue included.
    pub code: Vec<u8>,
    /// Final, 16-byte-rounded stack frame size.
    pub stack_usage: u32,
    /// Bitmask of which callee-saved registers this function's prologue
    /// pushes (and its epilogue pops).
    pub saved_regs_mask: u64,
    /// Length in bytes of the prologue (0 if elided).
    pub prologue_len: u32,
    /// Length in bytes of the epilogue.
    pub epilogue_len: u32,
    /// `(file_id, line, code_offset)` triples, source-order, consumed by
    /// the debug emitter.
    pub line_table: Vec<(u32, u32, u32)>,
    /// `(name, stack_offset, debug_type)` triples for locals and spills,
    /// consumed by the debug emitter.
    pub stack_slot_table: Vec<(String, i32, DataType)>,
}

impl FunctionOutput {
    /// Testable property 7: `code_size == prologue + body + epilogue`,
    /// and all three are accounted for in `code.len()`.
    pub fn code_size(&self) -> u32 {
        self.code.len() as u32
    }
}

/// A `(start, end)` span of `Reg`s: `start` is this block's `Label` node,
/// `end` is its terminator.
#[derive(Debug, Clone, Copy)]
pub struct BasicBlock {
    pub start: Reg,
    pub end: Reg,
}

/// A stack-resident local's declared shape.
#[derive(Debug, Clone, Copy)]
pub struct StackSlotData {
    pub size: u32,
    pub align: u32,
}

/// A side-table entry attached to a `Reg` or pair of `Reg`s — e.g. a
/// `restrict` no-alias annotation between two pointer parameters. Index 0
/// is reserved (never handed out by `attrib_pool`) so `Option<AttrId>` has
/// an unambiguous "none".
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Reserved slot; never attached to a node.
    None,
    /// `a` and `b` are known not to alias.
    NoAlias { a: Reg, b: Reg },
    /// This parameter is never null.
    NonNull,
}

/// A function's calling-convention/signature, immutable once attached to a
/// `Function` via `Function::set_prototype`. Allocated out of the
/// module-wide prototype arena (see [`crate::module`]).
#[derive(Debug, Clone)]
pub struct Prototype {
    pub conv: CallConv,
    pub ret: DataType,
    pub params: Vec<DataType>,
    pub has_varargs: bool,
}

impl Prototype {
    pub fn new(conv: CallConv, ret: DataType, has_varargs: bool) -> Self {
        Prototype {
            conv,
            ret,
            params: Vec::new(),
            has_varargs,
        }
    }

    /// Declare the next parameter's type. Builder-time only; see
    /// `PrecondititionViolation` if called after the prototype has been
    /// attached and its param count relied upon elsewhere.
    pub fn add_param(&mut self, ty: DataType) {
        self.params.push(ty);
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Linkage of a function/global within the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Visible to other modules/the linker.
    Export,
    /// Local to this module.
    Local,
    /// Declared here, defined elsewhere (no body).
    Import,
}

/// A function: its IR body plus everything the lowering pipeline attaches
/// once compiled.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub prototype: Prototype,
    /// Dense node storage, indexed by `Reg::index()`. `nodes[0]` and
    /// `nodes[1]` are the reserved null slot and entry anchor.
    pub(crate) nodes: Vec<Node>,
    /// One entry per `Param`, in declaration order, for fast access by the
    /// builder and by ABI lowering.
    pub params_cache: Vec<Reg>,
    /// Side-table of attributes; index 0 reserved.
    pub(crate) attrib_pool: Vec<Attribute>,
    /// Declared stack slots, indexed by `StackSlotId`.
    pub(crate) stack_slots: Vec<StackSlotData>,
    /// Basic blocks in source order, keyed by `Label::index()`.
    pub(crate) blocks: Vec<BasicBlock>,
    /// Set once `Module::compile_function` has lowered this function.
    pub compiled_output: Option<FunctionOutput>,
}

impl Function {
    pub fn new(name: impl Into<String>, linkage: Linkage, prototype: Prototype) -> Self {
        let mut f = Function {
            name: name.into(),
            linkage,
            prototype,
            nodes: Vec::new(),
            params_cache: Vec::new(),
            attrib_pool: vec![Attribute::None],
            stack_slots: Vec::new(),
            blocks: Vec::new(),
            compiled_output: None,
        };
        // Node 0: null slot. Node 1: synthetic entry anchor.
        f.nodes.push(Node::new(
            crate::ir::node::NodeKind::Unreachable,
            DataType::void(),
        ));
        // Node 1: the synthetic entry anchor. It carries no meaning of its
        // own beyond being the thread head a builder's cursor starts at;
        // the first real `Label` (block 0) is linked in right after it.
        f.nodes.push(Node::new(
            crate::ir::node::NodeKind::Unreachable,
            DataType::void(),
        ));
        f
    }

    /// Allocate the `Param` placeholder nodes and the `params_cache`
    /// acceleration vector for `prototype`. Re-seating (calling this twice)
    /// replaces `params_cache` without invalidating any other node: old
    /// `Param` nodes simply become orphaned (dead) registers.
    pub fn set_prototype(&mut self, prototype: Prototype) {
        self.prototype = prototype;
        self.params_cache.clear();
        for (index, &ty) in self.prototype.params.clone().iter().enumerate() {
            let r = self.push_node(Node::new(
                crate::ir::node::NodeKind::Param {
                    index: index as u32,
                },
                ty,
            ));
            self.params_cache.push(r);
        }
    }

    /// Append a fresh node, returning its `Reg`. Does not link it into any
    /// block's source-order thread; callers go through
    /// [`crate::ir::builder::FunctionBuilder`] for that.
    pub(crate) fn push_node(&mut self, node: Node) -> Reg {
        let r = Reg::new(self.nodes.len() as u32);
        self.nodes.push(node);
        r
    }

    pub fn node(&self, r: Reg) -> &Node {
        &self.nodes[r.index()]
    }

    pub fn node_mut(&mut self, r: Reg) -> &mut Node {
        &mut self.nodes[r.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declare a new stack slot of `size`/`align`, returning its id. Used
    /// both directly by the builder (`Local` nodes) and by the GAD's PHI
    /// spill allocator.
    pub fn create_stack_slot(&mut self, size: u32, align: u32) -> StackSlotId {
        let id = StackSlotId::from_u32(self.stack_slots.len() as u32);
        self.stack_slots.push(StackSlotData { size, align });
        id
    }

    pub fn stack_slot(&self, id: StackSlotId) -> StackSlotData {
        self.stack_slots[id.as_u32() as usize]
    }

    /// Attach `attr` to the pool, returning its id (never `0`, the
    /// reserved "none" slot).
    pub fn push_attribute(&mut self, attr: Attribute) -> crate::ir::entities::AttrId {
        let id = crate::ir::entities::AttrId::from_u32(self.attrib_pool.len() as u32);
        self.attrib_pool.push(attr);
        id
    }

    pub fn attribute(&self, id: crate::ir::entities::AttrId) -> &Attribute {
        &self.attrib_pool[id.as_u32() as usize]
    }

    /// Basic blocks in source order.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub(crate) fn push_block(&mut self, bb: BasicBlock) {
        self.blocks.push(bb);
    }

    /// Iterate a block's body in source order, from its `Label`'s `next`
    /// up to but not including its terminator.
    pub fn block_body(&self, bb: BasicBlock) -> impl Iterator<Item = Reg> + '_ {
        let mut cur = self.node(bb.start).next;
        let end = bb.end;
        std::iter::from_fn(move || {
            if cur == end || cur == Reg::NULL {
                None
            } else {
                let r = cur;
                cur = self.node(r).next;
                Some(r)
            }
        })
    }

    /// Every non-null, non-entry-anchor node in source order, by walking
    /// each block's thread in turn. Used by the round-trip test and by
    /// whole-function analyses.
    pub fn all_nodes_in_source_order(&self) -> Vec<Reg> {
        let mut out = Vec::new();
        for bb in &self.blocks {
            out.push(bb.start);
            out.extend(self.block_body(*bb));
            if bb.end != bb.start {
                out.push(bb.end);
            }
        }
        out
    }

    /// Label ordinal of a block's `Label` node.
    pub fn block_label(&self, bb: BasicBlock) -> Label {
        match self.node(bb.start).kind {
            crate::ir::node::NodeKind::Label { id, .. } => id,
            _ => unreachable!("basic block start is not a Label node"),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "function {} {} -> {} {{",
            self.name, self.prototype.conv, self.prototype.ret
        )?;
        for bb in &self.blocks {
            writeln!(f, "{}:", self.block_label(*bb))?;
            for r in self.block_body(*bb) {
                writeln!(f, "    {} = {:?}", r, self.node(r).kind)?;
            }
            writeln!(f, "    {:?}", self.node(bb.end).kind)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CallConv::SystemV => "sysv",
                CallConv::WindowsFastcall => "win64",
            }
        )
    }
}
