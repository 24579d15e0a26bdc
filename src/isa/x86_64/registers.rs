//! x86-64 register tables: the flat allocatable namespace the GAD's
//! [`RegClass`](crate::regalloc::reg_class::RegClass) model needs, plus the
//! hardware encodings [`emit`](super::emit) consumes.
//!
//! RSP and RBP are deliberately absent from the GPR class — they're the
//! stack/frame pointers, never allocator-owned, so excluding them outright
//! is simpler than reserving-and-never-freeing a slot the allocator would
//! otherwise think it could hand out.

use crate::regalloc::reg_class::{PhysReg, RegClass, RegClassId};

pub const GPR_CLASS: RegClassId = RegClassId(0);
pub const XMM_CLASS: RegClassId = RegClassId(1);

/// `phys` -> hardware register number (the 4-bit field ModRM/REX encode),
/// in allocation-priority order: argument/caller-saved registers first so
/// the common case never touches a register the prologue has to save.
const GPR_HW: [u8; 14] = [
    0,  // rax
    1,  // rcx
    2,  // rdx
    6,  // rsi
    7,  // rdi
    8,  // r8
    9,  // r9
    10, // r10
    11, // r11
    3,  // rbx   (callee-saved from here down)
    12, // r12
    13, // r13
    14, // r14
    15, // r15
];

const GPR_NAMES: [&str; 14] = [
    "rax", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "rbx", "r12", "r13", "r14", "r15",
];

pub const GPR_PRIORITY: [PhysReg; 14] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

/// `rbx`, `r12`..`r15`: the SysV/Win64-common callee-saved GPR set.
pub const GPR_CALLEE_SAVED_MASK: u64 = 0b11111 << 9;

/// Allocator-phys index of `rax`, used as the integer return register and
/// as the implicit dividend/quotient register for `idiv`.
pub const PHYS_RAX: PhysReg = 0;

pub fn gpr_class() -> RegClass {
    RegClass {
        name: "gpr",
        id: GPR_CLASS,
        count: GPR_HW.len() as u8,
        priority: &GPR_PRIORITY,
        callee_saved_mask: GPR_CALLEE_SAVED_MASK,
    }
}

pub fn gpr_hw(phys: PhysReg) -> u8 {
    GPR_HW[phys as usize]
}

pub fn gpr_name(phys: PhysReg) -> &'static str {
    GPR_NAMES[phys as usize]
}

/// `true` if this hardware encoding needs `REX.B`/`REX.R`/`REX.X` to
/// address (`r8`..`r15`).
pub fn hw_is_extended(hw: u8) -> bool {
    hw >= 8
}

pub const XMM_PRIORITY: [PhysReg; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

pub fn xmm_class() -> RegClass {
    RegClass {
        name: "xmm",
        id: XMM_CLASS,
        count: 16,
        priority: &XMM_PRIORITY,
        // SysV treats every XMM register as caller-saved; Windows's
        // xmm6-15 callee-saved rule is out of scope (§ Non-goals: Win64
        // vector-register spill code).
        callee_saved_mask: 0,
    }
}

/// SysV integer argument registers, in order: rdi, rsi, rdx, rcx, r8, r9.
pub const SYSV_INT_ARGS: [PhysReg; 6] = [4, 3, 2, 1, 5, 6];
/// Win64 integer argument registers, in order: rcx, rdx, r8, r9.
pub const WIN64_INT_ARGS: [PhysReg; 4] = [1, 2, 5, 6];
/// SysV/Win64-common float argument registers: xmm0..xmm3/7.
pub const FLOAT_ARGS: [PhysReg; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hw_encodings_match_real_x86_64() {
        assert_eq!(gpr_hw(0), 0); // rax
        assert_eq!(gpr_hw(9), 3); // rbx
        assert_eq!(gpr_hw(13), 15); // r15
    }

    #[test]
    fn extended_registers_need_rex() {
        assert!(!hw_is_extended(gpr_hw(0))); // rax
        assert!(hw_is_extended(gpr_hw(5))); // r8
    }

    #[test]
    fn callee_saved_mask_matches_rbx_and_r12_15() {
        let rc = gpr_class();
        assert!(rc.is_callee_saved(9)); // rbx
        assert!(rc.is_callee_saved(10)); // r12
        assert!(!rc.is_callee_saved(0)); // rax
    }
}
