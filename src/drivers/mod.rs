//! Device drivers: serial debug output, VGA text console, PS/2 keyboard,
//! and the ATA PIO block device.

pub mod ata;
pub mod keyboard;
pub mod screen;
pub mod serial;
