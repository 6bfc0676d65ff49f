//! # RV64 Port Layer
//!
//! Architecture-specific code for RV64 machine mode: the saved-context
//! layout, initial stack construction, and the raw context-switch
//! primitive.
//!
//! ## Context Switch Mechanism
//!
//! A task's suspended state is exactly the callee-saved register set of
//! the RISC-V calling convention: `sp` plus `s0`–`s11`. Everything else
//! is caller-saved and therefore already spilled onto the task's own
//! stack by the compiler at the moment `__task_switch` is called.
//!
//! The switch routine allocates a 16-byte frame on the outgoing stack,
//! stores `ra` into it, saves `sp`/`s0`–`s11` into the outgoing
//! [`TaskContext`], then restores the incoming context and reloads `ra`
//! from the incoming stack. The final `ret` lands either back inside the
//! scheduler call the incoming task suspended in, or — for a freshly
//! built stack — in the trampoline address planted one doubleword below
//! the stack top.
//!
//! The `a0` slot of the context exists for that first resume only: the
//! trampoline receives the task entry function through `a0`, the
//! first-argument register of the RISC-V ABI. On later switches the slot
//! is stale, which is harmless because `a0` is caller-saved.

/// Native word size in bytes (RV64).
pub const WORD_SIZE: usize = 8;

/// Stack alignment required by the RISC-V psABI before any call
/// instruction executes: 128 bits.
pub const STACK_ALIGNMENT: usize = 16;

/// Number of callee-saved general-purpose registers (`s0`–`s11`).
pub const CALLEE_SAVED_REGS: usize = 12;

/// Smallest region the stack initializer may be handed: room for the
/// initial resume frame. Callers must also leave room for their own
/// frames; undersized stacks are an unchecked precondition beyond this.
pub const MIN_STACK_SIZE: usize = 2 * STACK_ALIGNMENT;

// ---------------------------------------------------------------------------
// Saved context
// ---------------------------------------------------------------------------

/// The callee-saved register bank of a suspended task.
///
/// Valid only while the owning task is not running; the switch primitive
/// is the sole reader and writer once the task has been launched.
///
/// Layout is fixed (`repr(C)`) because `__task_switch` addresses the
/// fields by byte offset: `sp` at 0, `s[i]` at `8 + 8*i`, `a0` at 104.
#[repr(C)]
pub struct TaskContext {
    /// Saved stack pointer. Always `STACK_ALIGNMENT`-aligned.
    pub sp: usize,
    /// Callee-saved registers `s0`–`s11`.
    pub s: [usize; CALLEE_SAVED_REGS],
    /// First-argument register slot, consumed by the trampoline on the
    /// first resume.
    pub a0: usize,
}

impl TaskContext {
    /// An all-zero context. Not resumable until initialized by
    /// [`init_task_stack`] or written by a save.
    pub const fn zeroed() -> Self {
        Self {
            sp: 0,
            s: [0; CALLEE_SAVED_REGS],
            a0: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Initial stack construction
// ---------------------------------------------------------------------------

/// Build the byte layout from which `__task_switch` can start a task.
///
/// Pure data construction — no control transfer happens here. Given the
/// region `[stack_base, stack_base + stack_size)`:
///
/// ```text
/// stack_base + stack_size ──┐
///        (aligned top) ─────┤  ← sp after the first frame pop
///              resume_at    │  ← loaded into ra by the first restore
///              (pad)        │  ← ctx.sp points here (top − 16)
///              ...          │    free stack, grows down
/// stack_base ───────────────┘    (task header lives here, not ours)
/// ```
///
/// The `s` bank is zeroed, `entry` is planted in the `a0` slot, and
/// `resume_at` is written one word below the aligned top so the very
/// first `ret` out of the restored context lands there with a
/// 16-byte-aligned stack.
///
/// # Safety
/// `stack_base..stack_base + stack_size` must be writable memory owned
/// by the task being built, at least [`MIN_STACK_SIZE`] bytes large.
pub unsafe fn init_task_stack(
    ctx: &mut TaskContext,
    stack_base: *mut u8,
    stack_size: usize,
    entry: usize,
    resume_at: usize,
) {
    let top = (stack_base as usize + stack_size) & !(STACK_ALIGNMENT - 1);
    debug_assert!(top - stack_base as usize >= MIN_STACK_SIZE);

    ctx.s = [0; CALLEE_SAVED_REGS];
    ctx.a0 = entry;

    // Return address for the first restore, one doubleword below the top.
    let ra_slot = (top - WORD_SIZE) as *mut usize;
    ra_slot.write(resume_at);

    // One full alignment unit below the top: the slot above holds the
    // return address, mirroring the frame __task_switch itself pushes.
    ctx.sp = top - STACK_ALIGNMENT;
}

// ---------------------------------------------------------------------------
// Context switch primitive
// ---------------------------------------------------------------------------

// The only place raw register state crosses task boundaries. Offsets
// must match the TaskContext layout above.
#[cfg(target_arch = "riscv64")]
core::arch::global_asm!(
    r#"
    .section .text.__task_switch
    .globl __task_switch
    .align 2
__task_switch:
    addi  sp, sp, -16
    sd    ra, 8(sp)

    sd    sp, 0(a0)
    sd    s0, 8(a0)
    sd    s1, 16(a0)
    sd    s2, 24(a0)
    sd    s3, 32(a0)
    sd    s4, 40(a0)
    sd    s5, 48(a0)
    sd    s6, 56(a0)
    sd    s7, 64(a0)
    sd    s8, 72(a0)
    sd    s9, 80(a0)
    sd    s10, 88(a0)
    sd    s11, 96(a0)

    ld    s0, 8(a1)
    ld    s1, 16(a1)
    ld    s2, 24(a1)
    ld    s3, 32(a1)
    ld    s4, 40(a1)
    ld    s5, 48(a1)
    ld    s6, 56(a1)
    ld    s7, 64(a1)
    ld    s8, 72(a1)
    ld    s9, 80(a1)
    ld    s10, 88(a1)
    ld    s11, 96(a1)
    ld    sp, 0(a1)
    ld    a0, 104(a1)

    ld    ra, 8(sp)
    addi  sp, sp, 16
    ret
"#
);

#[cfg(target_arch = "riscv64")]
extern "C" {
    fn __task_switch(prev: *mut TaskContext, next: *const TaskContext);
}

/// Save the calling context into `prev` and resume `next`.
///
/// Returns only when some later switch resumes `prev` again. Interrupts
/// must be masked across the call once preemption is wired up.
///
/// # Safety
/// - `prev` must point to a context that may be overwritten.
/// - `next` must hold a context previously saved by this routine or
///   built by [`init_task_stack`], whose stack is still intact.
#[inline]
pub unsafe fn task_switch(prev: *mut TaskContext, next: *const TaskContext) {
    #[cfg(target_arch = "riscv64")]
    __task_switch(prev, next);

    #[cfg(not(target_arch = "riscv64"))]
    {
        let _ = (prev, next);
        unimplemented!("context switch is only available on riscv64");
    }
}

// ---------------------------------------------------------------------------
// Idle
// ---------------------------------------------------------------------------

/// Low-power wait used by the idle loop when the run queue is empty.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(target_arch = "riscv64")]
    riscv::asm::wfi();

    #[cfg(not(target_arch = "riscv64"))]
    core::hint::spin_loop();
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn build(region: &mut [u8], entry: usize, resume_at: usize) -> TaskContext {
        let mut ctx = TaskContext::zeroed();
        unsafe {
            init_task_stack(&mut ctx, region.as_mut_ptr(), region.len(), entry, resume_at);
        }
        ctx
    }

    #[test]
    fn test_saved_sp_is_aligned() {
        // Misalign the effective top by slicing at odd offsets; the
        // computed sp must still land on a 16-byte boundary.
        let mut region = [0u8; 512];
        for cut in [0usize, 1, 7, 8, 15, 16, 33] {
            let len = region.len() - cut;
            let ctx = build(&mut region[..len], 0x1000, 0x2000);
            assert_eq!(ctx.sp % STACK_ALIGNMENT, 0, "cut = {}", cut);
        }
    }

    #[test]
    fn test_resume_address_planted_below_top() {
        let mut region = [0u8; 256];
        let base = region.as_mut_ptr() as usize;
        let ctx = build(&mut region, 0xAAAA, 0xBBBB);

        let top = (base + 256) & !(STACK_ALIGNMENT - 1);
        assert_eq!(ctx.sp, top - STACK_ALIGNMENT);

        let planted = usize::from_ne_bytes(
            region[top - WORD_SIZE - base..top - base].try_into().unwrap(),
        );
        assert_eq!(planted, 0xBBBB);
    }

    #[test]
    fn test_entry_lands_in_first_argument_slot() {
        let mut region = [0u8; 256];
        let ctx = build(&mut region, 0xDEAD_0000, 0x4000);
        assert_eq!(ctx.a0, 0xDEAD_0000);
        assert_eq!(ctx.s, [0; CALLEE_SAVED_REGS]);
    }

    #[test]
    fn test_minimum_region_still_fits_the_frame() {
        let mut region = [0u8; MIN_STACK_SIZE + STACK_ALIGNMENT];
        let ctx = build(&mut region, 1, 2);
        let base = region.as_ptr() as usize;
        assert!(ctx.sp >= base);
        assert!(ctx.sp < base + region.len());
    }
}
