//! # Kernel Configuration
//!
//! Compile-time constants governing the task kernel. All limits are fixed
//! at compile time — no dynamic allocation anywhere in the system.

/// Maximum number of tasks the run queue can hold at once. This bounds the
/// scheduler's pointer array, not task memory — stacks are supplied by the
/// caller. Increase with care: each registered task ties up `STACK_SIZE`
/// bytes of caller-owned RAM.
pub const MAX_TASKS: usize = 8;

/// Per-task stack size in bytes. The task header lives at the base of this
/// region and the stack grows down from the top, so the usable depth is
/// `STACK_SIZE` minus the header and the initial resume frame.
pub const STACK_SIZE: usize = 4096;
