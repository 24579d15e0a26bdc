//! ISA flags binding (§4.3.3).
//!
//! After a comparator, the backend may bind the comparator's `Reg` to the
//! ISA flags register instead of materializing a boolean. At most one
//! `Reg` may be flag-bound at any time; any instruction that could clobber
//! flags must call [`FlagsBinding::kill`] first, which — if the binding is
//! still live — materializes it via the backend's `cond_to_reg` hook and
//! clears the binding.

use crate::ir::entities::Reg;
use crate::ir::node::IntCc;

/// Tracks the single flags-bound `Reg`, if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagsBinding {
    bound: Option<(Reg, IntCc)>,
}

impl FlagsBinding {
    pub fn new() -> Self {
        FlagsBinding { bound: None }
    }

    /// Bind `r` to the flags register under condition code `cc`.
    /// Overwrites any previous binding — callers must `kill` first if they
    /// want to preserve it, matching the invariant that at most one `Reg`
    /// is flag-bound at a time.
    pub fn set(&mut self, r: Reg, cc: IntCc) {
        self.bound = Some((r, cc));
    }

    pub fn current(&self) -> Option<(Reg, IntCc)> {
        self.bound
    }

    /// `true` if `r` is the currently flag-bound register.
    pub fn is_bound_to(&self, r: Reg) -> bool {
        matches!(self.bound, Some((bound, _)) if bound == r)
    }

    /// Clear the binding unconditionally (the comparator's consumer just
    /// read it directly, e.g. a same-block `If`/`Ret`-of-boolean).
    pub fn clear(&mut self) {
        self.bound = None;
    }

    /// Kill the binding before an instruction that would clobber flags.
    /// If a binding is live, `materialize(r, cc) -> physical register`
    /// is invoked to spill it into a GPR before the binding is cleared;
    /// `materialize` is expected to call the backend's `cond_to_reg` hook
    /// and update the value queue for `r`.
    pub fn kill(&mut self, materialize: impl FnOnce(Reg, IntCc)) {
        if let Some((r, cc)) = self.bound.take() {
            materialize(r, cc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_is_bound() {
        let mut flags = FlagsBinding::new();
        let r = Reg::new(5);
        flags.set(r, IntCc::Eq);
        assert!(flags.is_bound_to(r));
    }

    #[test]
    fn kill_clears_and_invokes_materializer_once() {
        let mut flags = FlagsBinding::new();
        let r = Reg::new(5);
        flags.set(r, IntCc::Eq);
        let mut calls = 0;
        flags.kill(|_, _| calls += 1);
        assert_eq!(calls, 1);
        assert!(flags.current().is_none());
        // killing again with nothing bound must not call the closure
        flags.kill(|_, _| calls += 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn at_most_one_reg_bound_at_a_time() {
        let mut flags = FlagsBinding::new();
        let r1 = Reg::new(5);
        let r2 = Reg::new(6);
        flags.set(r1, IntCc::Eq);
        flags.set(r2, IntCc::Ne);
        assert!(!flags.is_bound_to(r1));
        assert!(flags.is_bound_to(r2));
    }
}
