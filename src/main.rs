//! Kernel entry point.
//!
//! Booted by a stage-2 bootloader (not part of this repository) already
//! in 32-bit protected mode; this is the first Rust code to run. Mounts
//! the primary ATA disk as a FAT16 volume, then hands control to an
//! editor session over whatever file the bootloader's command line
//! named — the shell that chooses the file is itself an external
//! collaborator, out of scope here (§1).

#![no_std]
#![no_main]

use fat16os_kernel::drivers::ata::AtaDisk;
use fat16os_kernel::drivers::keyboard::Ps2Keyboard;
use fat16os_kernel::drivers::screen::VgaConsole;
use fat16os_kernel::drivers::serial;
use fat16os_kernel::editor::{self, Editor};
use fat16os_kernel::fs::{Fat16Error, Fat16Volume};
use fat16os_kernel::{debugln, log_error, log_info};

const BOOT_DISK_SECTOR_COUNT: u32 = 131072; // 64 MiB, matches the reference disk image

#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial::init();
    log_info!("fat16os kernel starting");

    let disk = AtaDisk::new(BOOT_DISK_SECTOR_COUNT);
    let mut volume = match Fat16Volume::mount(disk) {
        Ok(volume) => volume,
        Err(e) => {
            log_error!("failed to mount FAT16 volume: {}", e);
            halt();
        }
    };

    let path = "WELCOME.TXT";
    match volume.touch(path) {
        Ok(()) | Err(Fat16Error::AlreadyExists) => {}
        Err(e) => {
            log_error!("failed to create {}: {}", path, e);
            halt();
        }
    }

    let mut console = VgaConsole::new();
    let mut keyboard = Ps2Keyboard::new();
    let mut editor = Editor::new();

    if let Err(e) = editor.load_from_volume(&mut volume, path) {
        debugln!("failed to load {}: {:?}", path, e);
    }

    if let Err(e) = editor::run(&mut editor, &mut console, &mut keyboard, &mut volume, path) {
        debugln!("editor session ended with error: {:?}", e);
    }

    halt();
}

fn halt() -> ! {
    loop {
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack));
        }
    }
}
