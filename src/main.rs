//! # Demo Firmware
//!
//! Registers a small task set and runs the kernel on the QEMU `virt`
//! board:
//!
//! | Task       | Priority | Behavior                                  |
//! |------------|----------|-------------------------------------------|
//! | `ticker`   | 0        | One-shot: logs once, then returns         |
//! | `worker_a` | 1        | Five rounds of work, yielding after each  |
//! | `worker_b` | 1        | Five rounds of work, yielding after each  |
//!
//! Priority 0 is the most urgent class, so `ticker` runs first; the two
//! workers then alternate in creation order until both return and the
//! kernel idles. Run with:
//!
//! ```text
//! cargo build --release --target riscv64imac-unknown-none-elf
//! qemu-system-riscv64 -machine virt -nographic -bios none \
//!     -kernel target/riscv64imac-unknown-none-elf/release/rvtask
//! ```

#![cfg_attr(target_arch = "riscv64", no_std)]
#![cfg_attr(target_arch = "riscv64", no_main)]

#[cfg(target_arch = "riscv64")]
mod firmware {
    use core::ptr::addr_of_mut;

    use log::{info, LevelFilter};
    use panic_halt as _;
    use riscv::register::{mcause, mepc};
    use riscv_rt::entry;

    use rvtask::arch::trap;
    use rvtask::kernel;
    use rvtask::task::TaskStack;

    // -----------------------------------------------------------------------
    // Task stacks (static storage, never freed)
    // -----------------------------------------------------------------------

    static mut TICKER_STACK: TaskStack = TaskStack::new();
    static mut WORKER_A_STACK: TaskStack = TaskStack::new();
    static mut WORKER_B_STACK: TaskStack = TaskStack::new();

    // -----------------------------------------------------------------------
    // Task entry points
    // -----------------------------------------------------------------------

    /// One-shot housekeeping task. Returning here drops into the
    /// trampoline, which tears the task down.
    extern "C" fn ticker() {
        info!("ticker: housekeeping done");
    }

    extern "C" fn worker_a() {
        for round in 0..5 {
            info!("worker a: round {}", round);
            kernel::yield_now();
        }
    }

    extern "C" fn worker_b() {
        for round in 0..5 {
            info!("worker b: round {}", round);
            kernel::yield_now();
        }
    }

    // -----------------------------------------------------------------------
    // Trap glue
    // -----------------------------------------------------------------------

    /// Exception vector glue for riscv-rt: classify the cause, then step
    /// over a trapped `ecall` so `mret` does not re-execute it.
    #[export_name = "ExceptionHandler"]
    fn exception_handler(_frame: &riscv_rt::TrapFrame) {
        let cause = mcause::read().code();
        trap::handle_exception(cause);
        if trap::is_environment_call(cause) {
            unsafe { mepc::write(mepc::read().wrapping_add(4)) };
        }
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    #[entry]
    fn main() -> ! {
        let _ = rvtask::console::init(LevelFilter::Debug);

        kernel::init();

        // The initial task set, registered before the scheduler runs.
        kernel::create_task(worker_a, unsafe { &mut *addr_of_mut!(WORKER_A_STACK) }, 1);
        kernel::create_task(worker_b, unsafe { &mut *addr_of_mut!(WORKER_B_STACK) }, 1);
        kernel::create_task(ticker, unsafe { &mut *addr_of_mut!(TICKER_STACK) }, 0);

        kernel::start()
    }
}

#[cfg(not(target_arch = "riscv64"))]
fn main() {}
