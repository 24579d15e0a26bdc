//! Register allocation (§4.3.2): per-class ownership tracking, allocation,
//! reservation/stealing, and spill-candidate selection.

pub mod flags;
pub mod queue;
pub mod reg_class;
pub mod register_set;
pub mod value;

use std::collections::HashMap;

use crate::analysis::live_interval::LiveIntervals;
use crate::ir::entities::Reg;
use reg_class::{PhysReg, RegClass, RegClassId};
use register_set::RegisterSet;

/// Per-class allocation state: which physical register (if any) currently
/// owns which `Reg`, plus the set of free registers and the callee-saved
/// registers this function has touched so far.
struct ClassState {
    rc: RegClass,
    avail: RegisterSet,
    /// Dense array: physical register index -> owning `Reg`, or `None`.
    owners: Vec<Option<Reg>>,
    /// Accumulates which callee-saved registers were ever allocated; the
    /// prologue reads this to know what to push/pop.
    callee_saved_used: u64,
}

impl ClassState {
    fn new(rc: RegClass) -> Self {
        ClassState {
            avail: RegisterSet::new(&rc),
            owners: vec![None; rc.count as usize],
            callee_saved_used: 0,
            rc,
        }
    }
}

/// "Fewer than this many free registers" triggers the spill check at the
/// start of an operation (§4.3.2).
pub const SPILL_PRESSURE_THRESHOLD: u32 = 2;

/// Tracks register ownership across every class a backend defines.
pub struct RegAllocator {
    classes: Vec<ClassState>,
}

impl RegAllocator {
    pub fn new(classes: &[RegClass]) -> Self {
        RegAllocator {
            classes: classes.iter().copied().map(ClassState::new).collect(),
        }
    }

    fn class_mut(&mut self, id: RegClassId) -> &mut ClassState {
        &mut self.classes[id.0 as usize]
    }

    fn class(&self, id: RegClassId) -> &ClassState {
        &self.classes[id.0 as usize]
    }

    /// First free register in `rc`'s priority order, or `None` if the
    /// class is full. Does not allocate.
    pub fn first_free(&self, id: RegClassId) -> Option<PhysReg> {
        let c = self.class(id);
        c.avail.first_available(c.rc.priority)
    }

    /// Allocate `reg` to `owner`. Panics (resource exhaustion) if `reg` is
    /// already owned.
    pub fn allocate(&mut self, id: RegClassId, reg: PhysReg, owner: Reg) {
        let c = self.class_mut(id);
        c.avail.take(reg);
        c.owners[reg as usize] = Some(owner);
        if c.rc.is_callee_saved(reg) {
            c.callee_saved_used |= 1 << reg;
        }
    }

    /// Free `reg`, regardless of who owns it. Used both when a value's
    /// last use has been reached and when stealing for an ABI-forced
    /// placement.
    pub fn free(&mut self, id: RegClassId, reg: PhysReg) {
        let c = self.class_mut(id);
        c.owners[reg as usize] = None;
        c.avail.free(reg);
    }

    /// Which `Reg` (if any) currently owns `reg`.
    pub fn owner_of(&self, id: RegClassId, reg: PhysReg) -> Option<Reg> {
        self.class(id).owners[reg as usize]
    }

    /// Reserve a specific physical register for `owner`, stealing it from
    /// whoever holds it first if necessary. Used for ABI-forced
    /// placements (e.g. the first SysV integer argument always lands in
    /// RDI).
    pub fn reserve(&mut self, id: RegClassId, reg: PhysReg, owner: Reg) -> Option<Reg> {
        let previous = self.owner_of(id, reg);
        if previous.is_some() {
            self.free(id, reg);
        }
        self.allocate(id, reg, owner);
        previous
    }

    /// Bitmask of callee-saved registers this class has used so far; read
    /// by the prologue/epilogue emitter.
    pub fn callee_saved_used(&self, id: RegClassId) -> u64 {
        self.class(id).callee_saved_used
    }

    pub fn free_count(&self, id: RegClassId) -> u32 {
        self.class(id).avail.free_count()
    }

    /// §4.3.2 / §9: when a class is under `SPILL_PRESSURE_THRESHOLD` free
    /// registers, pick a spill victim. The source leaves this a TODO; we
    /// implement the spec's proposal: spill the live, queued, unpinned
    /// value in this class with the *farthest* last-use, excluding the
    /// node currently being lowered (its own direct inputs must not be
    /// evicted out from under it).
    ///
    /// `candidates` is every `(Reg, PhysReg)` currently owned in this
    /// class; `current_input` is excluded from consideration.
    pub fn pick_spill_victim(
        &self,
        id: RegClassId,
        intervals: &LiveIntervals,
        current_inputs: &[Reg],
    ) -> Option<(Reg, PhysReg)> {
        let c = self.class(id);
        c.owners
            .iter()
            .enumerate()
            .filter_map(|(phys, owner)| owner.map(|r| (r, phys as PhysReg)))
            .filter(|(r, _)| !current_inputs.contains(r))
            .max_by_key(|(r, _)| intervals.last_use(*r))
    }

    /// Snapshot of owners by class, for the register-allocator injectivity
    /// test (testable property 5): no physical register is simultaneously
    /// owned by two distinct `Reg`s. True by construction here (`owners`
    /// is a dense array keyed by physical register), but we expose this so
    /// a test can assert it after a sequence of allocate/free calls.
    pub fn is_injective(&self, id: RegClassId) -> bool {
        let c = self.class(id);
        let mut seen = HashMap::new();
        for (phys, owner) in c.owners.iter().enumerate() {
            if let Some(r) = owner {
                if seen.insert(*r, phys).is_some() {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::live_interval::LiveIntervals;

    fn gpr() -> RegClass {
        RegClass {
            name: "gpr",
            id: RegClassId(0),
            count: 4,
            priority: &[0, 1, 2, 3],
            callee_saved_mask: 0b1100,
        }
    }

    #[test]
    fn allocate_marks_callee_saved_used() {
        let mut ra = RegAllocator::new(&[gpr()]);
        ra.allocate(RegClassId(0), 2, Reg::new(5));
        assert_eq!(ra.callee_saved_used(RegClassId(0)), 0b0100);
    }

    #[test]
    fn reserve_steals_and_returns_previous_owner() {
        let mut ra = RegAllocator::new(&[gpr()]);
        ra.allocate(RegClassId(0), 0, Reg::new(1));
        let previous = ra.reserve(RegClassId(0), 0, Reg::new(2));
        assert_eq!(previous, Some(Reg::new(1)));
        assert_eq!(ra.owner_of(RegClassId(0), 0), Some(Reg::new(2)));
    }

    #[test]
    fn allocator_stays_injective_across_steals() {
        let mut ra = RegAllocator::new(&[gpr()]);
        ra.allocate(RegClassId(0), 0, Reg::new(1));
        ra.allocate(RegClassId(0), 1, Reg::new(2));
        ra.reserve(RegClassId(0), 0, Reg::new(3));
        assert!(ra.is_injective(RegClassId(0)));
    }

    #[test]
    fn spill_victim_is_farthest_last_use_excluding_current_input() {
        let mut ra = RegAllocator::new(&[gpr()]);
        let a = Reg::new(1);
        let b = Reg::new(2);
        ra.allocate(RegClassId(0), 0, a);
        ra.allocate(RegClassId(0), 1, b);

        let mut intervals = LiveIntervals::default();
        intervals.record_use(a, 100);
        intervals.record_use(b, 5);

        // `a` has the farther last-use, but it's a direct input of the
        // current node, so `b` must be chosen instead.
        let victim = ra.pick_spill_victim(RegClassId(0), &intervals, &[a]);
        assert_eq!(victim, Some((b, 1)));

        let victim = ra.pick_spill_victim(RegClassId(0), &intervals, &[]);
        assert_eq!(victim, Some((a, 0)));
    }
}
