//! Bump-allocated scratch memory (§2 item 2, §9 "thread-local scratch").
//!
//! The original backend hand-rolls a bump pointer into a fixed-size
//! per-thread buffer, reset whenever a function finishes lowering, plus a
//! process-wide arena for prototypes and symbol strings that outlive any
//! one function. `bumpalo::Bump` is the idiomatic stand-in for both: it's
//! already a reset-in-place bump arena, so there's nothing to hand-roll.
//!
//! [`ScratchArena`] backs the per-thread scratch region described in §5
//! ("what is sharded per thread"); [`SymbolArena`] backs the process-wide
//! prototype/string arena from §3 ("Prototype... allocated in a
//! process-wide arena").

use bumpalo::Bump;

/// Per-thread scratch memory, reset once per function lowered. Not used by
/// the GAD's own scratch vectors today (those are plain `Vec`s sized by
/// [`crate::analysis::Budget`]), but kept as the thread-local allocator a
/// future emitter-side scratch buffer would draw from — matching the
/// original's `tally_memory_usage_simple` + bump-pointer-reset pairing.
pub struct ScratchArena {
    bump: Bump,
}

impl ScratchArena {
    pub fn new() -> Self {
        ScratchArena { bump: Bump::new() }
    }

    /// Pre-size the next function's scratch region from its `Budget`
    /// tally, avoiding a sequence of small grows during lowering.
    pub fn reserve(&mut self, bytes: usize) {
        self.bump = Bump::with_capacity(bytes);
    }

    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    pub fn alloc_slice_copy<T: Copy>(&self, values: &[T]) -> &mut [T] {
        self.bump.alloc_slice_copy(values)
    }

    /// Drop every allocation made since the last reset, retaining the
    /// backing capacity (§5: scratch is reset per function, not
    /// reallocated).
    pub fn reset(&mut self) {
        self.bump.reset();
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        ScratchArena::new()
    }
}

thread_local! {
    static SCRATCH: std::cell::RefCell<ScratchArena> = std::cell::RefCell::new(ScratchArena::new());
}

/// Reset this OS thread's scratch arena. Called by
/// [`crate::module::Module::compile_function`] after a function's code has
/// been copied out into its `CodeRegion`, so per-function scratch never
/// accumulates across a whole compile run.
pub fn reset_thread_scratch() {
    SCRATCH.with(|s| s.borrow_mut().reset());
}

/// Never freed until the thread exits: prototypes and symbol names must
/// outlive every function that references them, for the module's whole
/// lifetime. One `Bump` per `Module`, not per thread — callers serialize
/// access through `Module`'s own locking (string/prototype interning is
/// not on the hot per-function path, unlike [`ScratchArena`]).
pub struct SymbolArena {
    bump: Bump,
}

impl SymbolArena {
    pub fn new() -> Self {
        SymbolArena { bump: Bump::new() }
    }

    /// Intern a string for the lifetime of the arena (and therefore the
    /// module), returning a `'static`-length-but-arena-bound slice.
    pub fn intern_str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for SymbolArena {
    fn default() -> Self {
        SymbolArena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reclaims_capacity_without_freeing_it() {
        let mut arena = ScratchArena::new();
        arena.reserve(256);
        let before = arena.allocated_bytes();
        arena.alloc_slice_copy(&[1u8; 64]);
        arena.reset();
        assert_eq!(arena.allocated_bytes(), before.max(arena.allocated_bytes()));
    }

    #[test]
    fn symbol_arena_interns_distinct_strings() {
        let arena = SymbolArena::new();
        let a = arena.intern_str("fib");
        let b = arena.intern_str("main");
        assert_eq!(a, "fib");
        assert_eq!(b, "main");
    }

    #[test]
    fn thread_local_scratch_resets() {
        reset_thread_scratch();
    }
}
