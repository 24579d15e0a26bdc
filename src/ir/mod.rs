//! The SSA IR data model (§3) and its builder (§4.1).

pub mod builder;
pub mod entities;
pub mod function;
pub mod node;

pub use builder::FunctionBuilder;
pub use entities::{AttrId, ExternId, FuncId, GlobalId, Label, Reg, StackSlotId};
pub use function::{Attribute, BasicBlock, Function, FunctionOutput, Linkage, Prototype};
pub use node::{Node, NodeKind};
