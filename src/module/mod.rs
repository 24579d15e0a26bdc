//! Process-wide module: function/extern/global tables, per-thread code
//! regions and patch lists, and the compile/materialize lifecycle
//! (§3 "Module", §4.5, §5).

pub mod initializer;
pub mod jit;
pub mod object;
pub mod patch;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use target_lexicon::Triple;

use crate::analysis::FunctionAnalyses;
use crate::arena::{self, SymbolArena};
use crate::emitter::Emitter;
use crate::error::fatal_resource;
use crate::gad::{lower_function, Backend};
use crate::ir::entities::{ExternId, FuncId, GlobalId};
use crate::ir::function::{Function, Linkage, Prototype};
use crate::isa::call_conv::CallConv;
use crate::isa::x86_64::X86_64Backend;
use crate::isa::{Isa, System, TargetIsa};
use initializer::Global;
use patch::PatchLists;

/// Fixed compile-time bound on concurrently-compiling threads (§5). A
/// thread touching the module beyond this is a resource exhaustion, same
/// as any other arena overflow.
pub const MAX_THREADS: usize = 64;

/// Grow-once bound on the function table (§3 "Module... functions (grow-
/// once vector up to MAX_FUNCTIONS)").
pub const MAX_FUNCTIONS: usize = 1 << 20;

thread_local! {
    static LOCAL_TID: std::cell::Cell<Option<usize>> = std::cell::Cell::new(None);
}

static NEXT_TID: AtomicUsize = AtomicUsize::new(0);

/// Assign (or recall) this OS thread's index into the module's per-thread
/// tables. One atomic fetch-add per thread, ever (§5).
pub fn get_local_tid() -> usize {
    LOCAL_TID.with(|cell| {
        if let Some(tid) = cell.get() {
            return tid;
        }
        let tid = NEXT_TID.fetch_add(1, Ordering::Relaxed);
        if tid >= MAX_THREADS {
            fatal_resource(format!("thread count exceeded MAX_THREADS ({})", MAX_THREADS));
        }
        cell.set(Some(tid));
        tid
    })
}

/// Which lowering path `compile_function` should attempt (§4.5, §7
/// `UnimplementedPath`). Only `Fast` is implemented by the x86-64 backend
/// today; `Complex` always falls back with a logged warning, matching the
/// "complex falls back to fast if unimplemented" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IselMode {
    Fast,
    Complex,
}

/// A per-thread linear code buffer functions are appended to as they are
/// compiled (§5 "What is sharded per thread"). Never shrinks; positions
/// handed out to callers (`compiled_pos`) are stable for the module's
/// lifetime.
#[derive(Debug, Default)]
pub struct CodeRegion {
    buf: Vec<u8>,
}

impl CodeRegion {
    /// Append `code`, returning its offset within this thread's region.
    pub fn append(&mut self, code: &[u8]) -> u32 {
        let pos = self.buf.len() as u32;
        self.buf.extend_from_slice(code);
        pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// An externally-defined symbol this module calls or addresses but does
/// not define (§3 "Externs").
#[derive(Debug, Clone)]
pub struct Extern {
    pub name: String,
}

/// Where a compiled function's bytes ended up: which thread's region, and
/// the offset within it. Resolved to a module-wide `.text` offset only
/// once `finalize`/`materialize_text` has assigned final layout.
#[derive(Debug, Clone, Copy)]
struct FuncLocation {
    tid: usize,
    local_offset: u32,
}

/// Everything `materialize_text` produces: one contiguous `.text` image
/// plus the four patch lists with every `src`'s `pos` already rebased
/// from "offset within its thread's region" to "offset within `.text`".
pub struct MaterializedText {
    pub text: Vec<u8>,
    pub func_offsets: Vec<u32>,
    pub patches: PatchLists,
}

/// Process-wide compiler state (§3 "Module"). Functions, prototypes,
/// globals, externs and code regions are exclusively owned here; a
/// `Function`'s own `Node`s remain exclusively owned by the `Function`
/// (§3 "Ownership").
pub struct Module {
    isa: Box<dyn TargetIsa + Send + Sync>,
    backend: Box<dyn Backend + Send + Sync>,
    system: System,
    is_jit: bool,

    functions: RwLock<Vec<Function>>,
    externs: RwLock<Vec<Extern>>,
    globals: RwLock<Vec<Global>>,
    files: RwLock<Vec<PathBuf>>,

    code_regions: Vec<Mutex<CodeRegion>>,
    patch_lists: Vec<Mutex<PatchLists>>,
    func_locations: RwLock<std::collections::HashMap<u32, FuncLocation>>,

    symbols: SymbolArena,

    compiled_count: AtomicU32,
    rdata_region_size: AtomicU32,
    data_region_size: AtomicU32,
    tls_region_size: AtomicU32,
}

impl Module {
    /// Create a module targeting `triple`. Only x86-64 has a lowering
    /// backend today (§4.4); requesting any other architecture is a
    /// precondition violation, not a graceful fallback, since there is no
    /// `Backend` impl to fall back to.
    pub fn create(triple: &Triple, is_jit: bool) -> Module {
        let isa = Isa::from_triple(triple);
        let system = System::from_triple(triple);
        let conv = CallConv::triple_default(triple);

        let (target_isa, backend): (Box<dyn TargetIsa + Send + Sync>, Box<dyn Backend + Send + Sync>) = match isa {
            Isa::X86_64 => {
                let b = X86_64Backend::new(conv);
                let b2 = X86_64Backend::new(conv);
                (Box::new(b), Box::new(b2))
            }
            Isa::Aarch64 => crate::error::fatal_precondition(
                "aarch64 has no gad::Backend implementation yet; only x86_64 can be compiled to",
            ),
        };

        let mut code_regions = Vec::with_capacity(MAX_THREADS);
        let mut patch_lists = Vec::with_capacity(MAX_THREADS);
        for _ in 0..MAX_THREADS {
            code_regions.push(Mutex::new(CodeRegion::default()));
            patch_lists.push(Mutex::new(PatchLists::default()));
        }

        Module {
            isa: target_isa,
            backend,
            system,
            is_jit,
            functions: RwLock::new(Vec::new()),
            externs: RwLock::new(Vec::new()),
            globals: RwLock::new(Vec::new()),
            files: RwLock::new(Vec::new()),
            code_regions,
            patch_lists,
            func_locations: RwLock::new(std::collections::HashMap::new()),
            symbols: SymbolArena::new(),
            compiled_count: AtomicU32::new(0),
            rdata_region_size: AtomicU32::new(0),
            data_region_size: AtomicU32::new(0),
            tls_region_size: AtomicU32::new(0),
        }
    }

    pub fn isa(&self) -> Isa {
        self.isa.isa()
    }

    pub fn system(&self) -> System {
        self.system
    }

    pub fn default_call_conv(&self) -> CallConv {
        self.isa.default_call_conv()
    }

    pub fn symbols(&self) -> &SymbolArena {
        &self.symbols
    }

    /// Declare a new function, returning its id. The function body is
    /// filled in afterward through `function_mut`.
    pub fn declare_function(&self, name: impl Into<String>, linkage: Linkage, prototype: Prototype) -> FuncId {
        let mut functions = self.functions.write().unwrap();
        if functions.len() >= MAX_FUNCTIONS {
            fatal_resource("function table exceeded MAX_FUNCTIONS");
        }
        let id = FuncId::from_u32(functions.len() as u32);
        functions.push(Function::new(name, linkage, prototype));
        id
    }

    pub fn declare_extern(&self, name: impl Into<String>) -> ExternId {
        let mut externs = self.externs.write().unwrap();
        let id = ExternId::from_u32(externs.len() as u32);
        externs.push(Extern { name: name.into() });
        id
    }

    pub fn declare_global(&self, global: Global) -> GlobalId {
        let mut globals = self.globals.write().unwrap();
        let id = GlobalId::from_u32(globals.len() as u32);
        self.data_region_size.fetch_add(global.init.size(), Ordering::Relaxed);
        globals.push(global);
        id
    }

    pub fn add_file(&self, path: PathBuf) -> u32 {
        let mut files = self.files.write().unwrap();
        let id = files.len() as u32;
        files.push(path);
        id
    }

    /// Run a closure against a function's mutable body. Callers hold the
    /// write lock only for the duration of the closure — there is no
    /// cursor-style API that would need to outlive it.
    pub fn with_function_mut<R>(&self, id: FuncId, f: impl FnOnce(&mut Function) -> R) -> R {
        let mut functions = self.functions.write().unwrap();
        f(&mut functions[id.as_u32() as usize])
    }

    pub fn with_function<R>(&self, id: FuncId, f: impl FnOnce(&Function) -> R) -> R {
        let functions = self.functions.read().unwrap();
        f(&functions[id.as_u32() as usize])
    }

    pub fn function_count(&self) -> usize {
        self.functions.read().unwrap().len()
    }

    /// Run a closure against every function's immutable body at once, for
    /// materializers that need to read across the whole table (e.g. the
    /// object-file writer assigning one symbol per function).
    pub fn with_all_functions<R>(&self, f: impl FnOnce(&[Function]) -> R) -> R {
        let functions = self.functions.read().unwrap();
        f(&functions)
    }

    pub fn compiled_count(&self) -> u32 {
        self.compiled_count.load(Ordering::Acquire)
    }

    /// Lower one function and append its code to this thread's region
    /// (§4.5). `mode` is downgraded from `Complex` to `Fast` with a
    /// logged warning since no backend implements the complex path yet
    /// (§7 `UnimplementedPath`).
    pub fn compile_function(&self, id: FuncId, mode: IselMode) {
        if mode == IselMode::Complex {
            log::warn!(
                "{}",
                crate::error::CodegenError::UnimplementedPath {
                    mode: "complex",
                    isa: "x86_64",
                }
            );
        }

        let tid = get_local_tid();

        let lowered = {
            let functions = self.functions.read().unwrap();
            let func = &functions[id.as_u32() as usize];
            let analyses = FunctionAnalyses::compute(func);
            lower_function(func, &analyses, self.backend.as_ref())
        };

        let local_offset = {
            let mut region = self.code_regions[tid].lock().unwrap();
            region.append(&lowered.output.code)
        };

        self.patch_lists[tid]
            .lock()
            .unwrap()
            .absorb(id, lowered.patches, &self.rdata_region_size);

        self.func_locations
            .write()
            .unwrap()
            .insert(id.as_u32(), FuncLocation { tid, local_offset });

        {
            let mut functions = self.functions.write().unwrap();
            functions[id.as_u32() as usize].compiled_output = Some(lowered.output);
        }

        arena::reset_thread_scratch();
        self.compiled_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Compile a batch of functions. The spec leaves parallelization to
    /// the caller (§5: "Parallel threads coordinate through the Module");
    /// callers that want concurrency spawn their own threads and call
    /// `compile_function` from each — this just sequences them on the
    /// calling thread.
    pub fn compile_functions(&self, ids: &[FuncId], mode: IselMode) {
        for &id in ids {
            self.compile_function(id, mode);
        }
    }

    /// Concatenate every thread's code region into one `.text` image,
    /// rebasing each function's patches from thread-local offsets to
    /// `.text` offsets (§4.5 "assigns each function a final offset").
    /// This is the caller-visible barrier (§5 "Ordering guarantees"): no
    /// `compile_function` call may race with this.
    pub fn materialize_text(&self) -> MaterializedText {
        let locations = self.func_locations.read().unwrap();
        let function_count = self.function_count();

        let mut region_base = vec![0u32; MAX_THREADS];
        let mut text = Vec::new();
        for tid in 0..MAX_THREADS {
            region_base[tid] = text.len() as u32;
            let region = self.code_regions[tid].lock().unwrap();
            text.extend_from_slice(region.as_slice());
        }

        let mut func_offsets = vec![0u32; function_count];
        for (idx, loc) in locations.iter() {
            func_offsets[*idx as usize] = region_base[loc.tid] + loc.local_offset;
        }

        let mut merged = PatchLists::default();
        for tid in 0..MAX_THREADS {
            let mut list = self.patch_lists[tid].lock().unwrap();
            let base = region_base[tid];
            for p in list.functions.drain(..) {
                merged.functions.push(patch::FunctionPatch { pos: p.pos + base, ..p });
            }
            for p in list.externs.drain(..) {
                merged.externs.push(patch::ExternPatch { pos: p.pos + base, ..p });
            }
            for p in list.globals.drain(..) {
                merged.globals.push(patch::GlobalPatch { pos: p.pos + base, ..p });
            }
            for p in list.consts.drain(..) {
                merged
                    .consts
                    .push(patch::ConstPoolPatch { pos: p.pos + base, ..p });
            }
        }

        MaterializedText { text, func_offsets, patches: merged }
    }

    pub fn export_jit(&self) -> jit::JitModule {
        jit::JitModule::build(self)
    }

    pub fn export_object(&self, format: object::ObjectFormat) -> Vec<u8> {
        object::write_object(self, format)
    }

    pub fn is_jit(&self) -> bool {
        self.is_jit
    }

    pub fn rdata_size(&self) -> u32 {
        self.rdata_region_size.load(Ordering::Acquire)
    }

    pub fn data_size(&self) -> u32 {
        self.data_region_size.load(Ordering::Acquire)
    }

    pub fn globals(&self) -> std::sync::RwLockReadGuard<'_, Vec<Global>> {
        self.globals.read().unwrap()
    }

    pub fn externs(&self) -> std::sync::RwLockReadGuard<'_, Vec<Extern>> {
        self.externs.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::ir::FunctionBuilder;
    use target_lexicon::triple;

    fn make_module() -> Module {
        Module::create(&triple!("x86_64-unknown-linux-gnu"), true)
    }

    #[test]
    fn local_tid_is_stable_within_a_thread() {
        assert_eq!(get_local_tid(), get_local_tid());
    }

    #[test]
    fn declare_and_compile_trivial_function() {
        let m = make_module();
        let proto = Prototype::new(m.default_call_conv(), DataType::i32(), false);
        let id = m.declare_function("answer", Linkage::Export, proto);
        m.with_function_mut(id, |f| {
            let mut b = FunctionBuilder::new(f);
            let lbl = b.new_label_id();
            b.label(lbl);
            let c = b.iconst(DataType::i32(), 42);
            b.ret(Some(c));
        });
        m.compile_function(id, IselMode::Fast);
        assert_eq!(m.compiled_count(), 1);
        let materialized = m.materialize_text();
        assert!(!materialized.text.is_empty());
        assert_eq!(materialized.func_offsets.len(), 1);
    }
}
