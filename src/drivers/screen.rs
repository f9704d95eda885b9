//! VGA text-mode console driver.
//!
//! The console is an external collaborator of the filesystem and editor:
//! they only depend on the [`Console`] trait below. This module supplies
//! the one real implementation, writing directly into the VGA text buffer
//! at physical address `0xB8000`.

use core::fmt;
use core::ptr::{read_volatile, write_volatile};

pub const VGA_WIDTH: usize = 80;
pub const VGA_HEIGHT: usize = 25;
const VGA_BUFFER_ADDRESS: usize = 0xB8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy)]
struct ColorCode(u8);

impl ColorCode {
    fn new(foreground: Color, background: Color) -> Self {
        ColorCode((background as u8) << 4 | (foreground as u8))
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct VgaChar {
    ascii: u8,
    color: u8,
}

/// The contract the filesystem shell and editor render against. Anything
/// that can place characters on a fixed-size grid and report a cursor
/// satisfies it; the real kernel uses [`VgaConsole`], host tests can stub
/// it out entirely.
pub trait Console {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn clear(&mut self);
    fn put_char_at(&mut self, row: usize, col: usize, ch: u8);
    fn set_cursor(&mut self, row: usize, col: usize);
    fn scroll_up_by(&mut self, lines: usize);

    fn write_str_at(&mut self, row: usize, col: usize, s: &str) {
        let mut c = col;
        for byte in s.bytes() {
            if c >= self.width() {
                break;
            }
            self.put_char_at(row, c, byte);
            c += 1;
        }
    }
}

pub struct VgaConsole {
    buffer: *mut VgaChar,
    color: ColorCode,
    cursor_row: usize,
    cursor_col: usize,
}

// SAFETY: the kernel is single-threaded; the VGA buffer is a fixed MMIO region.
unsafe impl Send for VgaConsole {}

impl VgaConsole {
    pub fn new() -> Self {
        Self {
            buffer: VGA_BUFFER_ADDRESS as *mut VgaChar,
            color: ColorCode::new(Color::LightGray, Color::Black),
            cursor_row: 0,
            cursor_col: 0,
        }
    }

    pub fn set_color(&mut self, foreground: Color, background: Color) {
        self.color = ColorCode::new(foreground, background);
    }

    fn offset(row: usize, col: usize) -> isize {
        (row * VGA_WIDTH + col) as isize
    }

    fn write_cell(&mut self, row: usize, col: usize, ascii: u8, color: ColorCode) {
        if row >= VGA_HEIGHT || col >= VGA_WIDTH {
            return;
        }
        let cell = VgaChar { ascii, color: color.0 };
        unsafe {
            write_volatile(self.buffer.offset(Self::offset(row, col)), cell);
        }
    }

    fn read_cell(&self, row: usize, col: usize) -> VgaChar {
        unsafe { read_volatile(self.buffer.offset(Self::offset(row, col))) }
    }

    fn newline(&mut self) {
        self.cursor_col = 0;
        if self.cursor_row + 1 >= VGA_HEIGHT {
            self.scroll_up_by(1);
        } else {
            self.cursor_row += 1;
        }
    }
}

impl Default for VgaConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for VgaConsole {
    fn width(&self) -> usize {
        VGA_WIDTH
    }

    fn height(&self) -> usize {
        VGA_HEIGHT
    }

    fn clear(&mut self) {
        for row in 0..VGA_HEIGHT {
            for col in 0..VGA_WIDTH {
                self.write_cell(row, col, b' ', self.color);
            }
        }
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    fn put_char_at(&mut self, row: usize, col: usize, ch: u8) {
        self.write_cell(row, col, ch, self.color);
    }

    fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor_row = row.min(VGA_HEIGHT - 1);
        self.cursor_col = col.min(VGA_WIDTH - 1);
    }

    fn scroll_up_by(&mut self, lines: usize) {
        let lines = lines.min(VGA_HEIGHT);
        for row in 0..VGA_HEIGHT - lines {
            for col in 0..VGA_WIDTH {
                let cell = self.read_cell(row + lines, col);
                self.write_cell(row, col, cell.ascii, ColorCode(cell.color));
            }
        }
        for row in VGA_HEIGHT - lines..VGA_HEIGHT {
            for col in 0..VGA_WIDTH {
                self.write_cell(row, col, b' ', self.color);
            }
        }
        self.cursor_row = self.cursor_row.saturating_sub(lines);
    }
}

impl fmt::Write for VgaConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            match byte {
                b'\n' => self.newline(),
                byte => {
                    if self.cursor_col >= VGA_WIDTH {
                        self.newline();
                    }
                    self.write_cell(self.cursor_row, self.cursor_col, byte, self.color);
                    self.cursor_col += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeConsole {
        grid: [[u8; VGA_WIDTH]; VGA_HEIGHT],
        cursor: (usize, usize),
    }

    impl Default for FakeConsole {
        fn default() -> Self {
            FakeConsole {
                grid: [[0; VGA_WIDTH]; VGA_HEIGHT],
                cursor: (0, 0),
            }
        }
    }

    impl Console for FakeConsole {
        fn width(&self) -> usize {
            VGA_WIDTH
        }
        fn height(&self) -> usize {
            VGA_HEIGHT
        }
        fn clear(&mut self) {
            self.grid = [[b' '; VGA_WIDTH]; VGA_HEIGHT];
        }
        fn put_char_at(&mut self, row: usize, col: usize, ch: u8) {
            self.grid[row][col] = ch;
        }
        fn set_cursor(&mut self, row: usize, col: usize) {
            self.cursor = (row, col);
        }
        fn scroll_up_by(&mut self, lines: usize) {
            for row in 0..VGA_HEIGHT - lines {
                self.grid[row] = self.grid[row + lines];
            }
            for row in VGA_HEIGHT - lines..VGA_HEIGHT {
                self.grid[row] = [b' '; VGA_WIDTH];
            }
        }
    }

    #[test]
    fn write_str_at_stops_at_edge() {
        let mut console = FakeConsole::default();
        console.clear();
        console.write_str_at(0, VGA_WIDTH - 3, "hello");
        assert_eq!(console.grid[0][VGA_WIDTH - 3], b'h');
        assert_eq!(console.grid[0][VGA_WIDTH - 1], b'l');
    }
}
