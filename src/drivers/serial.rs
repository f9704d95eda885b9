//! Serial port driver for debug output (COM1, 0x3F8).
//!
//! When running under QEMU, pass `-serial file:debug.log` to capture this
//! output on the host.

use crate::arch::port::PortByte;
use core::fmt;

const COM1_PORT: u16 = 0x3F8;

const DATA_REGISTER: u16 = 0;
const INTERRUPT_ENABLE: u16 = 1;
const FIFO_CONTROL: u16 = 2;
const LINE_CONTROL: u16 = 3;
const MODEM_CONTROL: u16 = 4;
const LINE_STATUS: u16 = 5;

const LINE_STATUS_THRE: u8 = 0x20;

pub struct Serial {
    base_port: u16,
}

impl Serial {
    pub const fn new() -> Self {
        Self {
            base_port: COM1_PORT,
        }
    }

    /// Configure 115200 baud, 8N1, FIFO enabled.
    pub fn init(&self) {
        unsafe {
            let interrupt_enable = PortByte::new(self.base_port + INTERRUPT_ENABLE);
            let fifo_control = PortByte::new(self.base_port + FIFO_CONTROL);
            let line_control = PortByte::new(self.base_port + LINE_CONTROL);
            let modem_control = PortByte::new(self.base_port + MODEM_CONTROL);

            interrupt_enable.write(0x00);

            line_control.write(0x80);
            let divisor_low = PortByte::new(self.base_port + DATA_REGISTER);
            let divisor_high = PortByte::new(self.base_port + INTERRUPT_ENABLE);
            divisor_low.write(0x01);
            divisor_high.write(0x00);
            line_control.write(0x03);

            fifo_control.write(0xC7);
            modem_control.write(0x0B);
        }
    }

    fn is_transmit_empty(&self) -> bool {
        unsafe {
            let line_status = PortByte::new(self.base_port + LINE_STATUS);
            (line_status.read() & LINE_STATUS_THRE) != 0
        }
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.is_transmit_empty() {
            core::hint::spin_loop();
        }

        unsafe {
            let data = PortByte::new(self.base_port + DATA_REGISTER);
            data.write(byte);
        }
    }

    pub fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl fmt::Write for Serial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Serial::write_str(self, s);
        Ok(())
    }
}

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

struct DebugSerial {
    serial: UnsafeCell<Serial>,
    initialized: AtomicBool,
}

// SAFETY: the kernel is single-threaded; `initialized` gates first use.
unsafe impl Sync for DebugSerial {}

static DEBUG_SERIAL: DebugSerial = DebugSerial {
    serial: UnsafeCell::new(Serial::new()),
    initialized: AtomicBool::new(false),
};

/// Initialize the debug serial port. Call once during boot.
pub fn init() {
    unsafe {
        (*DEBUG_SERIAL.serial.get()).init();
    }
    DEBUG_SERIAL.initialized.store(true, Ordering::Release);
}

#[doc(hidden)]
pub fn _debug_print(args: fmt::Arguments) {
    use fmt::Write;
    if DEBUG_SERIAL.initialized.load(Ordering::Acquire) {
        unsafe {
            let _ = (*DEBUG_SERIAL.serial.get()).write_fmt(args);
        }
    }
}

/// Debug output macro, works like `print!` but writes to the serial port.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::drivers::serial::_debug_print(format_args!($($arg)*))
    };
}

/// Debug output macro with a trailing newline.
#[macro_export]
macro_rules! debugln {
    () => {
        $crate::debug!("\n")
    };
    ($($arg:tt)*) => {
        $crate::debug!("{}\n", format_args!($($arg)*))
    };
}
