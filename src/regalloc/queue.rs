//! The per-function value queue (§4.3.1).
//!
//! Most SSA defs are lazily realized: when an operator is visited, the
//! lowering enqueues a descriptor `{Reg, Unresolved}` instead of picking a
//! destination immediately. The descriptor is pinned to its queue slot —
//! later code refers to it by `Reg`, not by slot index, but the slot
//! itself never moves, so a `Reg` -> slot lookup is stable across
//! `resolve` calls. When another node forces a materialization,
//! `gad::eval::resolve` walks inputs and fills the slot with a concrete
//! [`Value`](crate::regalloc::value::Value).

use std::collections::HashMap;

use crate::ir::entities::Reg;
use crate::regalloc::value::Value;

/// Stores queue slots for one function's lowering. PHI nodes get a
/// persistent slot, reserved before any block is evaluated and never
/// rolled back; every other deferred value gets a per-block slot that is
/// rolled back at the end of the block that created it (§4.3.4 step 4).
#[derive(Debug, Default)]
pub struct ValueQueue {
    slots: Vec<Value>,
    index: HashMap<Reg, usize>,
    /// Number of slots permanently reserved for PHIs, at the front of
    /// `slots`. Rollback never goes below this.
    phi_slot_count: usize,
}

impl ValueQueue {
    pub fn new() -> Self {
        ValueQueue::default()
    }

    /// Reserve a persistent slot for a PHI's `Reg`, outside any block's
    /// rollback window. Must be called before block evaluation begins.
    pub fn reserve_phi_slot(&mut self, r: Reg) {
        debug_assert!(
            self.slots.len() == self.phi_slot_count,
            "PHI slots must all be reserved before any block enqueues a value"
        );
        self.slots.push(Value::Unresolved);
        self.index.insert(r, self.slots.len() - 1);
        self.phi_slot_count += 1;
    }

    /// Push a new `Unresolved` slot for `r`, pinned at its current length.
    pub fn enqueue(&mut self, r: Reg) {
        self.slots.push(Value::Unresolved);
        self.index.insert(r, self.slots.len() - 1);
    }

    /// `true` if `r` already has a slot (reserved or enqueued).
    pub fn has_slot(&self, r: Reg) -> bool {
        self.index.contains_key(&r)
    }

    pub fn get(&self, r: Reg) -> Value {
        match self.index.get(&r) {
            Some(&i) => self.slots[i],
            None => Value::Unresolved,
        }
    }

    pub fn set(&mut self, r: Reg, value: Value) {
        let i = *self
            .index
            .get(&r)
            .unwrap_or_else(|| crate::error::fatal_precondition(format!("{} has no queue slot", r)));
        self.slots[i] = value;
    }

    /// Current queue length, the high-water mark a block records on entry
    /// so it can roll back on exit.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Roll the queue back to `len`, dropping every non-PHI slot and its
    /// `Reg` -> slot mapping created since. Queued definitions don't
    /// escape their block except PHIs, which live outside this window.
    pub fn truncate_to(&mut self, len: usize) {
        debug_assert!(len >= self.phi_slot_count, "cannot roll back past PHI slots");
        if self.slots.len() <= len {
            return;
        }
        self.index.retain(|_, &mut i| i < len);
        self.slots.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_slots_survive_rollback() {
        let mut q = ValueQueue::new();
        let phi = Reg::new(10);
        q.reserve_phi_slot(phi);
        let mark = q.len();
        q.enqueue(Reg::new(11));
        q.set(Reg::new(11), Value::Immediate(1));
        q.truncate_to(mark);
        assert!(q.has_slot(phi));
        assert!(!q.has_slot(Reg::new(11)));
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut q = ValueQueue::new();
        let r = Reg::new(2);
        q.enqueue(r);
        q.set(r, Value::Immediate(42));
        assert_eq!(q.get(r), Value::Immediate(42));
    }

    #[test]
    fn unknown_reg_reads_as_unresolved() {
        let q = ValueQueue::new();
        assert_eq!(q.get(Reg::new(99)), Value::Unresolved);
    }
}
