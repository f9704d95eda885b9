//! Polled PS/2 keyboard driver.
//!
//! The core never services a keyboard IRQ (§5): the editor and shell poll
//! [`Keyboard::read_key`] from the main loop instead. This is the same
//! scancode table the teacher's IRQ-driven driver used, minus the
//! interrupt plumbing and ring buffer.

use crate::arch::port::PortByte;

const DATA_PORT: u16 = 0x60;
const STATUS_PORT: u16 = 0x64;
const STATUS_OUTPUT_FULL: u8 = 0x01;

const SCANCODE_RELEASED_MASK: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(u8),
    Enter,
    Backspace,
    Tab,
    Escape,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    CtrlQ,
    CtrlS,
    Unknown,
}

/// Set 1 scancode to unshifted ASCII, index by scancode.
static SCANCODE_ASCII: [u8; 128] = {
    let mut table = [0u8; 128];
    table[0x02] = b'1';
    table[0x03] = b'2';
    table[0x04] = b'3';
    table[0x05] = b'4';
    table[0x06] = b'5';
    table[0x07] = b'6';
    table[0x08] = b'7';
    table[0x09] = b'8';
    table[0x0A] = b'9';
    table[0x0B] = b'0';
    table[0x0C] = b'-';
    table[0x0D] = b'=';
    table[0x10] = b'q';
    table[0x11] = b'w';
    table[0x12] = b'e';
    table[0x13] = b'r';
    table[0x14] = b't';
    table[0x15] = b'y';
    table[0x16] = b'u';
    table[0x17] = b'i';
    table[0x18] = b'o';
    table[0x19] = b'p';
    table[0x1E] = b'a';
    table[0x1F] = b's';
    table[0x20] = b'd';
    table[0x21] = b'f';
    table[0x22] = b'g';
    table[0x23] = b'h';
    table[0x24] = b'j';
    table[0x25] = b'k';
    table[0x26] = b'l';
    table[0x2C] = b'z';
    table[0x2D] = b'x';
    table[0x2E] = b'c';
    table[0x2F] = b'v';
    table[0x30] = b'b';
    table[0x31] = b'n';
    table[0x32] = b'm';
    table[0x39] = b' ';
    table
};

const SCANCODE_ENTER: u8 = 0x1C;
const SCANCODE_BACKSPACE: u8 = 0x0E;
const SCANCODE_TAB: u8 = 0x0F;
const SCANCODE_ESCAPE: u8 = 0x01;
const SCANCODE_UP: u8 = 0x48;
const SCANCODE_DOWN: u8 = 0x50;
const SCANCODE_LEFT: u8 = 0x4B;
const SCANCODE_RIGHT: u8 = 0x4D;
const SCANCODE_HOME: u8 = 0x47;
const SCANCODE_END: u8 = 0x4F;
const SCANCODE_PAGE_UP: u8 = 0x49;
const SCANCODE_PAGE_DOWN: u8 = 0x51;
const SCANCODE_DELETE: u8 = 0x53;
const SCANCODE_Q: u8 = 0x10;
const SCANCODE_S: u8 = 0x1F;
const SCANCODE_LEFT_CTRL: u8 = 0x1D;

/// The contract the editor and shell poll for input.
pub trait Keyboard {
    /// Returns the next key if one is available, without blocking.
    fn poll_key(&mut self) -> Option<Key>;
}

pub struct Ps2Keyboard {
    ctrl_held: bool,
}

impl Ps2Keyboard {
    pub const fn new() -> Self {
        Self { ctrl_held: false }
    }

    fn has_data(&self) -> bool {
        unsafe {
            let status = PortByte::new(STATUS_PORT);
            (status.read() & STATUS_OUTPUT_FULL) != 0
        }
    }

    fn read_scancode(&self) -> u8 {
        unsafe {
            let data = PortByte::new(DATA_PORT);
            data.read()
        }
    }

    fn decode(&mut self, scancode: u8) -> Option<Key> {
        let released = scancode & SCANCODE_RELEASED_MASK != 0;
        let code = scancode & !SCANCODE_RELEASED_MASK;

        if code == SCANCODE_LEFT_CTRL {
            self.ctrl_held = !released;
            return None;
        }

        if released {
            return None;
        }

        if self.ctrl_held {
            return match code {
                SCANCODE_Q => Some(Key::CtrlQ),
                SCANCODE_S => Some(Key::CtrlS),
                _ => None,
            };
        }

        let key = match code {
            SCANCODE_ENTER => Key::Enter,
            SCANCODE_BACKSPACE => Key::Backspace,
            SCANCODE_TAB => Key::Tab,
            SCANCODE_ESCAPE => Key::Escape,
            SCANCODE_UP => Key::ArrowUp,
            SCANCODE_DOWN => Key::ArrowDown,
            SCANCODE_LEFT => Key::ArrowLeft,
            SCANCODE_RIGHT => Key::ArrowRight,
            SCANCODE_HOME => Key::Home,
            SCANCODE_END => Key::End,
            SCANCODE_PAGE_UP => Key::PageUp,
            SCANCODE_PAGE_DOWN => Key::PageDown,
            SCANCODE_DELETE => Key::Delete,
            code if (code as usize) < SCANCODE_ASCII.len() && SCANCODE_ASCII[code as usize] != 0 => {
                Key::Char(SCANCODE_ASCII[code as usize])
            }
            _ => Key::Unknown,
        };

        Some(key)
    }
}

impl Default for Ps2Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard for Ps2Keyboard {
    fn poll_key(&mut self) -> Option<Key> {
        if !self.has_data() {
            return None;
        }
        let scancode = self.read_scancode();
        self.decode(scancode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_printable_scancode() {
        let mut kbd = Ps2Keyboard::new();
        assert_eq!(kbd.decode(0x1E), Some(Key::Char(b'a')));
    }

    #[test]
    fn ignores_key_release() {
        let mut kbd = Ps2Keyboard::new();
        assert_eq!(kbd.decode(0x1E | SCANCODE_RELEASED_MASK), None);
    }

    #[test]
    fn ctrl_q_requires_ctrl_held() {
        let mut kbd = Ps2Keyboard::new();
        assert_eq!(kbd.decode(SCANCODE_Q), Some(Key::Char(b'q')));
        assert_eq!(kbd.decode(SCANCODE_LEFT_CTRL), None);
        assert_eq!(kbd.decode(SCANCODE_Q), Some(Key::CtrlQ));
        assert_eq!(
            kbd.decode(SCANCODE_LEFT_CTRL | SCANCODE_RELEASED_MASK),
            None
        );
        assert_eq!(kbd.decode(SCANCODE_Q), Some(Key::Char(b'q')));
    }
}
