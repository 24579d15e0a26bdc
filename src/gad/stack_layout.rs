//! Stack-frame layout helpers shared across backends (§4.3.6): rounding
//! the final frame size, and the one-time PHI-slot reservation pass.

pub use crate::gad::phi::reserve_phi_slots;

/// Round `n` up to the nearest multiple of 16, the SysV/Win64 stack
/// alignment requirement at a `call` instruction.
pub fn round_up_16(n: u32) -> u32 {
    (n + 15) & !15
}

/// Final frame size: locals/spills (`stack_usage`) plus the outgoing
/// argument shadow area sized from the widest call in the function,
/// rounded to 16 bytes. Windows x64 always reserves 32 bytes of shadow
/// space regardless of `max_call_params`; SysV only reserves stack for
/// arguments past the register-passed ones, which the backend itself
/// accounts for when bumping `stack_usage` as it lowers each `Call`.
pub fn finalize_frame_size(stack_usage: u32, outgoing_args_bytes: u32) -> u32 {
    round_up_16(stack_usage + outgoing_args_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_16() {
        assert_eq!(round_up_16(0), 0);
        assert_eq!(round_up_16(1), 16);
        assert_eq!(round_up_16(16), 16);
        assert_eq!(round_up_16(17), 32);
    }

    #[test]
    fn finalize_adds_outgoing_area_then_rounds() {
        assert_eq!(finalize_frame_size(8, 0), 16);
        assert_eq!(finalize_frame_size(20, 32), 64);
    }
}
