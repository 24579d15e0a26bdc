//! `Node`: the tagged SSA instruction record.
//!
//! Every node is identified by its [`Reg`] (also its SSA name). Nodes are
//! threaded in source order via `next`, not stored in a separately-indexed
//! list, so inserting or removing a node is O(1) once you have a cursor
//! (see [`crate::ir::cursor`]).

use smallvec::SmallVec;

use crate::data_type::DataType;
use crate::ir::entities::{AttrId, ExternId, FuncId, GlobalId, Label, Reg, StackSlotId};

/// Inline input-list capacity before a node's operands spill to the heap.
/// Four covers every node this crate defines except `PhiN`, `Switch` and
/// `Call`, which carry their own out-of-line storage.
pub type InputList = SmallVec<[Reg; 4]>;

bitflags::bitflags! {
    /// "Assume no wrap" flags on arithmetic ops, analogous to LLVM's
    /// `nuw`/`nsw`. Purely advisory: the core never relies on them for
    /// correctness, only a later optimizer would.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WrapFlags: u8 {
        /// No unsigned wrap.
        const NUW = 0b01;
        /// No signed wrap.
        const NSW = 0b10;
    }
}

/// Integer comparison predicates used by comparator nodes and by the
/// backend's flags binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IntCc {
    Eq,
    Ne,
    SignedLt,
    SignedLe,
    SignedGt,
    SignedGe,
    UnsignedLt,
    UnsignedLe,
    UnsignedGt,
    UnsignedGe,
}

impl IntCc {
    /// The predicate that holds exactly when `self` does not.
    pub fn inverse(self) -> IntCc {
        use IntCc::*;
        match self {
            Eq => Ne,
            Ne => Eq,
            SignedLt => SignedGe,
            SignedLe => SignedGt,
            SignedGt => SignedLe,
            SignedGe => SignedLt,
            UnsignedLt => UnsignedGe,
            UnsignedLe => UnsignedGt,
            UnsignedGt => UnsignedLe,
            UnsignedGe => UnsignedLt,
        }
    }
}

/// Floating-point comparison predicates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FloatCc {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single `{label, value}` pair feeding a PHI.
#[derive(Debug, Clone, Copy)]
pub struct PhiEdge {
    /// The predecessor block this value flows in from.
    pub label: Label,
    /// The value on that edge.
    pub value: Reg,
}

/// Everything after the node's tag discriminant: operands, immediates,
/// side tables.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // ---- Leaves --------------------------------------------------------
    /// The `n`-th formal parameter, materialized as a value.
    Param { index: u32 },
    /// The address of the `n`-th formal parameter (for `&param` in a
    /// front-end that passes aggregates by reference).
    ParamAddr { index: u32 },
    /// A stack-resident local; `slot` indexes the function's stack-slot
    /// table, which records its declared size/align.
    Local { slot: StackSlotId },
    /// A constant that fits a machine word.
    IntegerConst { bits: i64 },
    /// A floating-point constant.
    FloatConst { bits: f64 },
    /// A reference to a string held in the function's rdata contribution.
    StringConst { data: std::sync::Arc<[u8]> },
    /// The address of a module-level global.
    GlobalAddress { global: GlobalId },
    /// The address of a module-level function, for indirect calls/function pointers.
    FuncAddress { func: FuncId },
    /// The address of a module-level extern.
    ExternAddress { ext: ExternId },

    // ---- Pure arithmetic / bitwise -------------------------------------
    Add { a: Reg, b: Reg, flags: WrapFlags },
    Sub { a: Reg, b: Reg, flags: WrapFlags },
    Mul { a: Reg, b: Reg, flags: WrapFlags },
    SDiv { a: Reg, b: Reg },
    UDiv { a: Reg, b: Reg },
    Shl { a: Reg, b: Reg, flags: WrapFlags },
    Shr { a: Reg, b: Reg },
    Sar { a: Reg, b: Reg },
    And { a: Reg, b: Reg },
    Or { a: Reg, b: Reg },
    Xor { a: Reg, b: Reg },
    Not { a: Reg },
    Neg { a: Reg },
    FAdd { a: Reg, b: Reg },
    FSub { a: Reg, b: Reg },
    FMul { a: Reg, b: Reg },
    FDiv { a: Reg, b: Reg },
    /// Integer comparison; lowers to a flags binding when possible.
    IntCompare { cc: IntCc, a: Reg, b: Reg },
    /// Float comparison; lowers to a flags binding when possible.
    FloatCompare { cc: FloatCc, a: Reg, b: Reg },
    SignExt { a: Reg, to: DataType },
    ZeroExt { a: Reg, to: DataType },
    Truncate { a: Reg, to: DataType },
    IntToFloat { a: Reg, to: DataType },
    FloatToInt { a: Reg, to: DataType },
    IntToPtr { a: Reg },
    PtrToInt { a: Reg, to: DataType },

    // ---- Memory ---------------------------------------------------------
    Load { addr: Reg, ty: DataType, volatile: bool },
    Store { addr: Reg, value: Reg, volatile: bool },
    ArrayAccess { base: Reg, index: Reg, stride: u32 },
    MemberAccess { base: Reg, offset: u32 },
    MemSet { addr: Reg, value: Reg, len: Reg },
    MemCpy { dst: Reg, src: Reg, len: Reg },
    AtomicLoad { addr: Reg, ty: DataType },
    AtomicStore { addr: Reg, value: Reg },
    AtomicRmwAdd { addr: Reg, value: Reg },
    AtomicCas { addr: Reg, expected: Reg, replacement: Reg },

    // ---- Control ----------------------------------------------------------
    /// Block entry. `id` is this block's dense [`Label`] ordinal; `terminator`
    /// is back-patched once the block's terminator node is built.
    Label { id: Label, terminator: Reg },
    Goto { target: Label },
    If { cond: Reg, if_true: Label, if_false: Label },
    Switch { value: Reg, default: Label, cases: Vec<(i64, Label)> },
    Ret { value: Option<Reg> },
    /// Direct call to a module-local function.
    Call { func: FuncId, args: InputList },
    /// Indirect call through a function-pointer value.
    VCall { target: Reg, args: InputList, ret: DataType },
    /// Call to a module-level extern symbol.
    ECall { ext: ExternId, args: InputList },
    Unreachable,
    Trap,
    DebugBreak,
    /// Pins `value` so a dead-code pass can't remove it even though no
    /// node reads it (e.g. a store whose address escapes).
    KeepAlive { value: Reg },
    /// Source-location marker consumed into the function's line table.
    LineInfo { file: u32, line: u32 },

    // ---- Data-flow joins ----------------------------------------------------
    Phi2 { a: PhiEdge, b: PhiEdge, ty: DataType },
    PhiN { edges: Vec<PhiEdge>, ty: DataType },
}

impl NodeKind {
    /// `true` for the leaf tags (no register operands of their own).
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            NodeKind::Param { .. }
                | NodeKind::ParamAddr { .. }
                | NodeKind::Local { .. }
                | NodeKind::IntegerConst { .. }
                | NodeKind::FloatConst { .. }
                | NodeKind::StringConst { .. }
                | NodeKind::GlobalAddress { .. }
                | NodeKind::FuncAddress { .. }
                | NodeKind::ExternAddress { .. }
        )
    }

    /// `true` for nodes that terminate a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            NodeKind::Ret { .. }
                | NodeKind::Goto { .. }
                | NodeKind::If { .. }
                | NodeKind::Switch { .. }
                | NodeKind::Unreachable
        )
    }

    /// `true` for a PHI variant.
    pub fn is_phi(&self) -> bool {
        matches!(self, NodeKind::Phi2 { .. } | NodeKind::PhiN { .. })
    }

    /// `true` for nodes whose evaluation must happen immediately rather
    /// than being deferred onto the value queue (§4.3.4 step 2).
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            NodeKind::Store { .. }
                | NodeKind::Load { volatile: true, .. }
                | NodeKind::AtomicLoad { .. }
                | NodeKind::AtomicStore { .. }
                | NodeKind::AtomicRmwAdd { .. }
                | NodeKind::AtomicCas { .. }
                | NodeKind::MemCpy { .. }
                | NodeKind::MemSet { .. }
                | NodeKind::Call { .. }
                | NodeKind::VCall { .. }
                | NodeKind::ECall { .. }
                | NodeKind::LineInfo { .. }
                | NodeKind::DebugBreak
                | NodeKind::Trap
                | NodeKind::KeepAlive { .. }
        )
    }

    /// Visit every register operand this node reads (not including PHI
    /// edges, which analyses treat specially — see `inputs_excluding_phi`).
    pub fn for_each_input(&self, mut f: impl FnMut(Reg)) {
        use NodeKind::*;
        match self {
            Param { .. } | ParamAddr { .. } | Local { .. } | IntegerConst { .. }
            | FloatConst { .. } | StringConst { .. } | GlobalAddress { .. }
            | FuncAddress { .. } | ExternAddress { .. } | Unreachable | Trap | DebugBreak
            | LineInfo { .. } | Goto { .. } => {}
            Add { a, b, .. } | Sub { a, b, .. } | Mul { a, b, .. } | SDiv { a, b }
            | UDiv { a, b } | Shl { a, b, .. } | Shr { a, b } | Sar { a, b } | And { a, b }
            | Or { a, b } | Xor { a, b } | FAdd { a, b } | FSub { a, b } | FMul { a, b }
            | FDiv { a, b } | IntCompare { a, b, .. } | FloatCompare { a, b, .. } => {
                f(*a);
                f(*b);
            }
            Not { a } | Neg { a } | SignExt { a, .. } | ZeroExt { a, .. }
            | Truncate { a, .. } | IntToFloat { a, .. } | FloatToInt { a, .. }
            | IntToPtr { a } | PtrToInt { a, .. } => f(*a),
            Load { addr, .. } | AtomicLoad { addr, .. } => f(*addr),
            Store { addr, value, .. } | AtomicStore { addr, value } => {
                f(*addr);
                f(*value);
            }
            ArrayAccess { base, index, .. } => {
                f(*base);
                f(*index);
            }
            MemberAccess { base, .. } => f(*base),
            MemSet { addr, value, len } => {
                f(*addr);
                f(*value);
                f(*len);
            }
            MemCpy { dst, src, len } => {
                f(*dst);
                f(*src);
                f(*len);
            }
            AtomicRmwAdd { addr, value } => {
                f(*addr);
                f(*value);
            }
            AtomicCas {
                addr,
                expected,
                replacement,
            } => {
                f(*addr);
                f(*expected);
                f(*replacement);
            }
            If { cond, .. } => f(*cond),
            Switch { value, .. } => f(*value),
            Ret { value } => {
                if let Some(v) = value {
                    f(*v);
                }
            }
            Call { args, .. } | ECall { args, .. } => {
                for a in args {
                    f(*a);
                }
            }
            VCall { target, args, .. } => {
                f(*target);
                for a in args {
                    f(*a);
                }
            }
            KeepAlive { value } => f(*value),
            Label { .. } => {}
            Phi2 { a, b, .. } => {
                f(a.value);
                f(b.value);
            }
            PhiN { edges, .. } => {
                for e in edges {
                    f(e.value);
                }
            }
        }
    }
}

/// A node: tag-carrying payload plus the source-order thread and the
/// resolved data type of the value it defines (void for statements).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: DataType,
    /// Source-order successor; `Reg::NULL` for the last node.
    pub next: Reg,
    /// Attached side-table attribute, if any (e.g. `restrict` no-alias).
    pub attr: Option<AttrId>,
}

impl Node {
    pub fn new(kind: NodeKind, ty: DataType) -> Self {
        Node {
            kind,
            ty,
            next: Reg::NULL,
            attr: None,
        }
    }
}
