//! # Trap Classification
//!
//! Entry point invoked by the hardware trap vector with the raw
//! `mcause` exception code. Today this only classifies the cause:
//! environment calls are acknowledged, everything else is ignored — no
//! fault recovery, no task termination on illegal instruction, no timer
//! preemption yet. A preemptive extension would dispatch the machine
//! timer cause to `Scheduler::run` here instead of relying solely on
//! voluntary yields.
//!
//! The handler must not assume any particular task context is valid
//! beyond what the trap itself preserved.

use log::debug;

/// `ecall` executed from U-mode.
pub const CAUSE_ECALL_FROM_U: usize = 8;
/// `ecall` executed from S-mode.
pub const CAUSE_ECALL_FROM_S: usize = 9;
/// `ecall` executed from M-mode.
pub const CAUSE_ECALL_FROM_M: usize = 11;

/// Whether `cause` is a synchronous environment call, from any of the
/// three privilege origins.
pub const fn is_environment_call(cause: usize) -> bool {
    matches!(
        cause,
        CAUSE_ECALL_FROM_U | CAUSE_ECALL_FROM_S | CAUSE_ECALL_FROM_M
    )
}

/// Classify a trap cause. Called from the trap vector glue.
pub extern "C" fn handle_exception(cause: usize) {
    if is_environment_call(cause) {
        debug!("ecall (cause {})", cause);
    }
    // Other causes are deliberately not handled yet.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecall_causes_are_recognized() {
        assert!(is_environment_call(CAUSE_ECALL_FROM_U));
        assert!(is_environment_call(CAUSE_ECALL_FROM_S));
        assert!(is_environment_call(CAUSE_ECALL_FROM_M));
    }

    #[test]
    fn test_other_causes_are_not_environment_calls() {
        // Instruction misaligned, illegal instruction, load fault,
        // store fault, and the reserved code between the ecall range.
        for cause in [0usize, 2, 5, 7, 10, 12, 64] {
            assert!(!is_environment_call(cause));
        }
    }

    #[test]
    fn test_handle_exception_ignores_unknown_causes() {
        // Must be a silent no-op, not a panic.
        handle_exception(2);
        handle_exception(usize::MAX);
    }
}
