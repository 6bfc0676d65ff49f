//! # Synchronization Primitives
//!
//! Interrupt-safe critical section for kernel state. On a single core
//! the cooperative switch path already serializes queue mutation; the
//! critical section exists for API calls that may later race against a
//! trap-driven preemption path.

/// Execute a closure with machine interrupts disabled.
///
/// Keep critical sections short: everything inside runs with the timer
/// and external interrupts masked.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    riscv::interrupt::free(f)
}
