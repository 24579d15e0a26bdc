//! `Value`: the tagged union a queue slot resolves to (§4.3.1 / GLOSSARY).

use crate::ir::node::IntCc;
use crate::regalloc::reg_class::{PhysReg, RegClassId};

/// Where a lowered SSA def currently lives. The tag dictates how
/// consumers encode operands referencing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Not yet materialized; still sitting in the queue.
    Unresolved,
    /// A condition code held in the ISA flags register after a
    /// comparator, not yet copied into a general-purpose register.
    Flags(IntCc),
    /// A physical register in the given class.
    RegisterInClass(RegClassId, PhysReg),
    /// A frame-pointer-relative stack location. `is_spill` distinguishes a
    /// register-allocator spill slot from a PHI's stack-resident home from
    /// a user `Local`.
    StackSlot { disp: i32, is_spill: bool },
    /// An immediate that fits inline at the consuming instruction.
    Immediate(i64),
}

impl Value {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Value::Unresolved)
    }

    pub fn is_flags(&self) -> bool {
        matches!(self, Value::Flags(_))
    }

    pub fn as_register(&self) -> Option<(RegClassId, PhysReg)> {
        match *self {
            Value::RegisterInClass(c, r) => Some((c, r)),
            _ => None,
        }
    }
}
