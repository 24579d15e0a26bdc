//! Entity references used inside a [`Function`](super::function::Function).
//!
//! Instructions need to reference other entities in the function: other
//! nodes (by their `Reg`, which is simultaneously the node's SSA name and
//! its definition point), basic blocks (by `Label`), stack slots,
//! attributes, and the module-level symbols a node may address (globals,
//! functions, externs). These are not Rust references, both because the
//! borrow checker makes self-referential node graphs painful and because a
//! `u32` index keeps nodes compact and lets PHI/def cycles exist without a
//! cycle collector (inter-node references are arena indices, never owning
//! pointers).

use core::fmt;
use core::u32;

/// Declare a newtype wrapping a `u32` index, with `Display` formatted as
/// `{prefix}{n}` (matching the textual IR spelling) and a reserved
/// `u32::MAX` sentinel used as "null"/"none".
macro_rules! entity_ref {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw index. For use by builders and the parser.
            pub fn from_u32(n: u32) -> Self {
                debug_assert!(n != u32::MAX, "{} index collides with the null sentinel", $prefix);
                $name(n)
            }

            /// The raw index.
            pub fn as_u32(self) -> u32 {
                self.0
            }

            /// The reserved "no entity" value.
            pub const fn reserved_value() -> Self {
                $name(u32::MAX)
            }

            /// `true` if this is the reserved "no entity" value.
            pub fn is_reserved(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                (self as &dyn fmt::Display).fmt(f)
            }
        }
    };
}

entity_ref!(
    /// An SSA register: a node's identity and its definition point. `Reg(0)`
    /// is the null slot; `Reg(1)` is the synthetic entry anchor every
    /// function starts with.
    Reg,
    "r"
);

impl Reg {
    /// The null slot. No node is ever read through it; it exists so `0` is
    /// never a meaningful value in input lists.
    pub const NULL: Reg = Reg(0);
    /// The synthetic anchor node every function's node list begins with.
    pub const ENTRY: Reg = Reg(1);

    /// Construct a `Reg` from a dense index. Exposed separately from
    /// `from_u32` because `0`/`1` are meaningful here, unlike the reserved
    /// sentinel on other entity kinds.
    pub fn new(index: u32) -> Self {
        Reg(index)
    }

    /// Raw index, for vector indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

entity_ref!(
    /// A dense ordinal identifying a basic block's entry. Reserved by
    /// `new_label_id` before the `Label` node that materializes it exists.
    Label,
    "L"
);

impl Label {
    /// Raw index, for vector indexing into a label->position table.
    pub fn index(self) -> usize {
        self.as_u32() as usize
    }
}

entity_ref!(
    /// A reference to a local stack slot.
    StackSlotId,
    "ss"
);

entity_ref!(
    /// A reference to a side-table [`Attribute`](super::function::Attribute).
    AttrId,
    "attr"
);

entity_ref!(
    /// A reference to a module-level global.
    GlobalId,
    "gv"
);

entity_ref!(
    /// A reference to a module-level function (for direct calls).
    FuncId,
    "fn"
);

entity_ref!(
    /// A reference to a module-level extern (for `ECall`/`ExternAddress`).
    ExternId,
    "ext"
);

/// A reference to any entity defined in this module, for diagnostics.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnyEntity {
    /// The function itself.
    Function,
    /// A register / node.
    Reg(Reg),
    /// A basic block label.
    Label(Label),
    /// A stack slot.
    StackSlot(StackSlotId),
}

impl fmt::Display for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AnyEntity::Function => write!(f, "function"),
            AnyEntity::Reg(r) => r.fmt(f),
            AnyEntity::Label(l) => l.fmt(f),
            AnyEntity::StackSlot(s) => s.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_zero_and_one_are_reserved_slots() {
        assert_eq!(Reg::NULL.index(), 0);
        assert_eq!(Reg::ENTRY.index(), 1);
    }

    #[test]
    fn display_matches_textual_prefix() {
        assert_eq!(Reg::new(42).to_string(), "r42");
        assert_eq!(Label::from_u32(3).to_string(), "L3");
        assert_eq!(StackSlotId::from_u32(0).to_string(), "ss0");
    }

    #[test]
    fn reserved_value_round_trips() {
        let r = GlobalId::reserved_value();
        assert!(r.is_reserved());
        assert!(!GlobalId::from_u32(0).is_reserved());
    }
}
