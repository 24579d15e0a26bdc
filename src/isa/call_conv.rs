//! Calling-convention identifiers.

use core::str;
use target_lexicon::{CallingConvention, Triple};

/// Calling convention a [`Prototype`](crate::ir::function::Prototype) is
/// bound to. The spec only requires `win64` on Windows and `sysv`
/// elsewhere (§6); we keep exactly those two, unlike the teacher's wider
/// enumeration, since nothing else in this backend distinguishes further.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// System V AMD64 ABI, used on Linux/macOS/FreeBSD.
    SystemV,
    /// Microsoft x64 calling convention, used on Windows.
    WindowsFastcall,
}

impl CallConv {
    /// The default calling convention for a target triple.
    pub fn triple_default(triple: &Triple) -> Self {
        match triple.default_calling_convention() {
            Ok(CallingConvention::WindowsFastcall) => CallConv::WindowsFastcall,
            // Most everything else is System V; this also covers AArch64
            // Linux/macOS, which the spec maps to `sysv`.
            Ok(_) | Err(()) => CallConv::SystemV,
        }
    }
}

impl str::FromStr for CallConv {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sysv" | "system_v" => Ok(CallConv::SystemV),
            "win64" | "windows_fastcall" => Ok(CallConv::WindowsFastcall),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use target_lexicon::triple;

    #[test]
    fn windows_triple_defaults_to_win64() {
        let t = triple!("x86_64-pc-windows-msvc");
        assert_eq!(CallConv::triple_default(&t), CallConv::WindowsFastcall);
    }

    #[test]
    fn linux_triple_defaults_to_sysv() {
        let t = triple!("x86_64-unknown-linux-gnu");
        assert_eq!(CallConv::triple_default(&t), CallConv::SystemV);
    }

    #[test]
    fn from_str_round_trips() {
        assert_eq!(CallConv::from_str("sysv"), Ok(CallConv::SystemV));
        assert_eq!(CallConv::from_str("win64"), Ok(CallConv::WindowsFastcall));
        assert!(CallConv::from_str("bogus").is_err());
    }
}
