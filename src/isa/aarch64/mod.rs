//! AArch64 target stub.
//!
//! Only enough to let [`crate::isa::Isa::Aarch64`] round-trip through
//! [`TargetIsa`] and module/triple dispatch; none of the GAD `Backend`
//! hooks are implemented. Filling this in is future work — the x86-64
//! backend in [`super::x86_64`] is the one exercised end to end.

use crate::isa::call_conv::CallConv;
use crate::isa::{Isa, TargetIsa};

pub struct Aarch64Backend {
    pub conv: CallConv,
}

impl Aarch64Backend {
    pub fn new(conv: CallConv) -> Self {
        Aarch64Backend { conv }
    }
}

impl TargetIsa for Aarch64Backend {
    fn isa(&self) -> Isa {
        Isa::Aarch64
    }

    fn default_call_conv(&self) -> CallConv {
        self.conv
    }
}
