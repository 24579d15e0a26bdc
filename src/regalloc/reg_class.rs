//! Register-class description: the static table a target backend supplies
//! to the GAD (§4.3.2). Unlike the teacher's `RegUnit`/`RegBank` model
//! (which tracks sub-register aliasing for ISAs with overlapping register
//! files), the spec's allocator only ever needs one flat namespace per
//! class — GPRs don't alias XMMs here, and we don't model AL/AX/EAX/RAX
//! sub-registers, so a class is just "N physical slots plus a priority
//! order to scan them in".

use core::fmt;

/// Identifies one of a backend's register classes (GPR, XMM, ...), by
/// index into `Backend::register_classes()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RegClassId(pub u8);

/// A physical register, identified by its index within its class.
pub type PhysReg = u8;

/// Static description of one register class: how many physical registers
/// it has and the priority order in which the allocator should try them
/// (caller-saved and argument-passing registers first, so the common case
/// never touches a callee-saved register the prologue would have to
/// spill).
#[derive(Debug, Clone, Copy)]
pub struct RegClass {
    pub name: &'static str,
    pub id: RegClassId,
    /// Total physical registers in this class.
    pub count: u8,
    /// Scan order for allocation; `priority[0]` is tried first.
    pub priority: &'static [PhysReg],
    /// Bitmask (bit `i` = register `i`) of registers the calling
    /// convention requires the prologue to save before clobbering.
    pub callee_saved_mask: u64,
}

impl RegClass {
    pub fn is_callee_saved(&self, reg: PhysReg) -> bool {
        self.callee_saved_mask & (1 << reg) != 0
    }
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
