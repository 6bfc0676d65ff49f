//! # UART Console
//!
//! Minimal NS16550A transmit path for the QEMU `virt` board plus a
//! [`log::Log`] implementation on top of it. Peripheral drivers are not
//! part of the kernel core — this exists so firmware can see what the
//! kernel is doing. The library itself only emits `log` records and
//! never assumes a logger is installed.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// QEMU `virt` board UART0 base address.
const UART0_BASE: usize = 0x1000_0000;
const UART_THR: *mut u8 = UART0_BASE as *mut u8; // Transmit Holding Reg (0x0)
const UART_LSR: *const u8 = (UART0_BASE + 5) as *const u8; // Line Status Reg (0x5)
const LSR_TX_EMPTY: u8 = 1 << 5;

struct Uart;

impl Uart {
    fn put_byte(byte: u8) {
        unsafe {
            while core::ptr::read_volatile(UART_LSR) & LSR_TX_EMPTY == 0 {}
            core::ptr::write_volatile(UART_THR, byte);
        }
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                Self::put_byte(b'\r');
            }
            Self::put_byte(byte);
        }
        Ok(())
    }
}

struct UartLogger;

impl Log for UartLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let level = match record.level() {
            log::Level::Error => "error",
            log::Level::Warn => "warn ",
            log::Level::Info => "info ",
            log::Level::Debug => "debug",
            log::Level::Trace => "trace",
        };
        let _ = writeln!(Uart, "[{}] {}", level, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: UartLogger = UartLogger;

/// Route `log` records to UART0 at the given level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}
