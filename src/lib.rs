//! Retargetable SSA compiler backend: an IR data model, a register-
//! allocating generic code generator (GAD), target backends, and the
//! module-level linkage/patching surface that turns compiled functions
//! into an object file or a JIT-executable region.
//!
//! Top-level module map mirrors the component list: [`emitter`] and
//! [`arena`] are the leaf utilities every other layer writes through;
//! [`ir`] is the SSA data model and its builder; [`analysis`] computes
//! use-count/live-interval/ordinal passes over a function; [`regalloc`]
//! is the register-class ownership tracker the GAD drives; [`gad`] is the
//! ISA-parametric lowering skeleton; [`isa`] supplies concrete target
//! backends; [`module`] is the process-wide container and the
//! object/JIT materializers; [`debug`] turns a compiled function's line
//! and stack-slot tables into debug-info records.

#![warn(missing_docs, unused_import_braces)]

pub mod arena;
pub mod analysis;
pub mod data_type;
pub mod debug;
pub mod emitter;
pub mod error;
pub mod gad;
pub mod ir;
pub mod isa;
pub mod module;
pub mod regalloc;

pub use crate::data_type::DataType;
pub use crate::error::CodegenError;
pub use crate::ir::{FuncId, Function, FunctionBuilder};
pub use crate::module::{IselMode, Module};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
