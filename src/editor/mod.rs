//! Line-oriented text editor: a fixed-capacity buffer, wrapped-line
//! cursor movement, and a polling main loop over the `Console`/`Keyboard`
//! contracts and the mounted FAT16 volume.

pub mod buffer;
pub mod view;

use core::fmt;
use core::fmt::Write as _;

use crate::block::BlockDevice;
use crate::drivers::keyboard::{Key, Keyboard};
use crate::drivers::screen::Console;
use crate::fs::{Fat16Error, Fat16Volume};
use buffer::{Buffer, BufferError};
use view::{index_of, visual_of};

/// The transient message shown right-aligned on the status line until the
/// next key clears or replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    None,
    Saved,
    NewFile,
    BufferFull,
    UnsavedConfirm,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Status::None => "",
            Status::Saved => "Saved",
            Status::NewFile => "New file",
            Status::BufferFull => "Buffer full",
            Status::UnsavedConfirm => "Unsaved (Ctrl+Q again)",
        }
    }
}

/// Fixed-capacity `fmt::Write` sink for building the status line without
/// an allocator.
struct LineBuf {
    data: [u8; 128],
    len: usize,
}

impl LineBuf {
    fn new() -> Self {
        Self { data: [0u8; 128], len: 0 }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for LineBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let available = self.data.len() - self.len;
        let take = bytes.len().min(available);
        self.data[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    Continue,
    Saved,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorError {
    Buffer(BufferError),
    Fs(Fat16Error),
}

impl From<BufferError> for EditorError {
    fn from(e: BufferError) -> Self {
        EditorError::Buffer(e)
    }
}

impl From<Fat16Error> for EditorError {
    fn from(e: Fat16Error) -> Self {
        EditorError::Fs(e)
    }
}

/// A line-oriented editor session over a single file. `width` is the
/// console's column count; the buffer wraps against it the same way on
/// every render so the cursor's visual position is always recomputable
/// from its byte offset alone (no separately tracked row/col to drift
/// out of sync).
pub struct Editor {
    buffer: Buffer,
    cursor: usize,
    scroll_row: usize,
    dirty: bool,
    quit_confirmed: bool,
    status: Status,
}

impl Editor {
    pub const fn new() -> Self {
        Self {
            buffer: Buffer::new(),
            cursor: 0,
            scroll_row: 0,
            dirty: false,
            quit_confirmed: false,
            status: Status::None,
        }
    }

    pub fn contents(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Load a file's contents into the buffer, reading through the
    /// mounted volume. A missing file starts a fresh empty buffer with
    /// status "New file" rather than failing; any other read error
    /// aborts the load.
    pub fn load_from_volume<D: BlockDevice>(
        &mut self,
        volume: &mut Fat16Volume<D>,
        path: &str,
    ) -> Result<(), EditorError> {
        let mut scratch = [0u8; buffer::BUFFER_CAPACITY];
        match volume.read(path, &mut scratch) {
            Ok(n) => {
                self.buffer.load(&scratch[..n])?;
                self.status = Status::None;
            }
            Err(Fat16Error::NotFound) => {
                self.buffer.clear();
                self.status = Status::NewFile;
            }
            Err(e) => return Err(e.into()),
        }
        self.cursor = 0;
        self.scroll_row = 0;
        self.dirty = false;
        self.quit_confirmed = false;
        Ok(())
    }

    pub fn save_to_volume<D: BlockDevice>(
        &mut self,
        volume: &mut Fat16Volume<D>,
        path: &str,
    ) -> Result<(), EditorError> {
        volume.write(path, self.buffer.as_bytes())?;
        self.dirty = false;
        Ok(())
    }

    fn visual_row(&self, width: usize) -> usize {
        visual_of(self.buffer.as_bytes(), self.cursor, width).row
    }

    fn visual_col(&self, width: usize) -> usize {
        visual_of(self.buffer.as_bytes(), self.cursor, width).col
    }

    fn move_to_visual(&mut self, row: usize, col: usize, width: usize) {
        self.cursor = index_of(self.buffer.as_bytes(), row, col, width);
    }

    /// Overflow (insert at capacity) sets status "Buffer full" and leaves
    /// the buffer untouched rather than aborting the session.
    fn insert_char(&mut self, byte: u8) -> Result<(), EditorError> {
        match self.buffer.insert(self.cursor, byte) {
            Ok(()) => {
                self.cursor += 1;
                self.mark_mutated();
                Ok(())
            }
            Err(BufferError::BufferFull) => {
                self.status = Status::BufferFull;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn backspace(&mut self) -> Result<(), EditorError> {
        if self.cursor == 0 {
            return Ok(());
        }
        self.buffer.remove(self.cursor - 1)?;
        self.cursor -= 1;
        self.mark_mutated();
        Ok(())
    }

    fn delete_forward(&mut self) -> Result<(), EditorError> {
        if self.cursor >= self.buffer.len() {
            return Ok(());
        }
        self.buffer.remove(self.cursor)?;
        self.mark_mutated();
        Ok(())
    }

    /// Every buffer-mutating key clears the quit-confirmation flag and
    /// sets dirty, and drops whatever transient status was showing.
    fn mark_mutated(&mut self) {
        self.dirty = true;
        self.quit_confirmed = false;
        self.status = Status::None;
    }

    /// Adjust `scroll_row` so the cursor's visual row stays within the
    /// `height`-row viewport.
    fn scroll_into_view(&mut self, width: usize, height: usize) {
        let row = self.visual_row(width);
        if row < self.scroll_row {
            self.scroll_row = row;
        } else if row >= self.scroll_row + height {
            self.scroll_row = row + 1 - height;
        }
    }

    /// Handle one input event. `width`/`height` are the console's
    /// current dimensions; the bottom row is reserved for the status
    /// line, so wrap-aware movement and scrolling work against
    /// `text_height = height - 1`. Returns what the caller's main loop
    /// should do next.
    pub fn handle_key<D: BlockDevice>(
        &mut self,
        key: Key,
        width: usize,
        height: usize,
        volume: &mut Fat16Volume<D>,
        path: &str,
    ) -> Result<EditorAction, EditorError> {
        let text_height = height.saturating_sub(1);

        match key {
            Key::Char(byte) => self.insert_char(byte)?,
            Key::Enter => self.insert_char(b'\n')?,
            Key::Tab => self.insert_char(b' ')?,
            Key::Backspace => self.backspace()?,
            Key::Delete => self.delete_forward()?,
            Key::ArrowLeft => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            Key::ArrowRight => {
                self.cursor = (self.cursor + 1).min(self.buffer.len());
            }
            Key::ArrowUp => {
                let row = self.visual_row(width);
                let col = self.visual_col(width);
                if row > 0 {
                    self.move_to_visual(row - 1, col, width);
                }
            }
            Key::ArrowDown => {
                let row = self.visual_row(width);
                let col = self.visual_col(width);
                self.move_to_visual(row + 1, col, width);
            }
            Key::Home => {
                let row = self.visual_row(width);
                self.move_to_visual(row, 0, width);
            }
            Key::End => {
                let row = self.visual_row(width);
                self.move_to_visual(row, usize::MAX, width);
            }
            Key::PageUp => {
                let row = self.visual_row(width);
                let col = self.visual_col(width);
                self.move_to_visual(row.saturating_sub(text_height), col, width);
            }
            Key::PageDown => {
                let row = self.visual_row(width);
                let col = self.visual_col(width);
                self.move_to_visual(row + text_height, col, width);
            }
            Key::CtrlS => {
                self.save_to_volume(volume, path)?;
                self.status = Status::Saved;
                self.quit_confirmed = false;
                self.scroll_into_view(width, text_height);
                return Ok(EditorAction::Saved);
            }
            Key::CtrlQ => {
                if self.dirty && !self.quit_confirmed {
                    self.quit_confirmed = true;
                    self.status = Status::UnsavedConfirm;
                    return Ok(EditorAction::Continue);
                }
                return Ok(EditorAction::Quit);
            }
            Key::Escape | Key::Unknown => {}
        }

        self.scroll_into_view(width, text_height);
        Ok(EditorAction::Continue)
    }

    /// Draw the visible portion of the buffer, place the cursor, and
    /// draw the status line on the reserved bottom row.
    pub fn render(&self, console: &mut impl Console, path: &str) {
        let width = console.width();
        let height = console.height();
        let text_height = height.saturating_sub(1);
        console.clear();

        let content = self.buffer.as_bytes();

        let mut row = 0usize;
        let mut col = 0usize;

        for &byte in content {
            if row >= self.scroll_row {
                let screen_row = row - self.scroll_row;
                if screen_row < text_height && byte != b'\n' {
                    console.put_char_at(screen_row, col, byte);
                }
            }

            if byte == b'\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
                if col == width {
                    row += 1;
                    col = 0;
                }
            }
        }

        let cursor_row = self.visual_row(width);
        let cursor_col = self.visual_col(width);
        if cursor_row >= self.scroll_row && cursor_row - self.scroll_row < text_height {
            console.set_cursor(cursor_row - self.scroll_row, cursor_col);
        }

        self.render_status_line(console, path, cursor_row, cursor_col, width, height);
    }

    fn render_status_line(
        &self,
        console: &mut impl Console,
        path: &str,
        cursor_row: usize,
        cursor_col: usize,
        width: usize,
        height: usize,
    ) {
        if height == 0 {
            return;
        }
        let status_row = height - 1;

        let mut line = LineBuf::new();
        let _ = write!(line, "v {}  Ln {} Col {}", path, cursor_row + 1, cursor_col + 1);
        if self.dirty {
            let _ = write!(line, " *");
        }
        console.write_str_at(status_row, 0, line.as_str());

        let message = self.status.as_str();
        if !message.is_empty() {
            let message_col = width.saturating_sub(message.len());
            console.write_str_at(status_row, message_col, message);
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll the keyboard and drive one editor session until the user quits.
/// Saves happen on `Ctrl+S`; nothing is written on quit unless the caller
/// already saved (matching the external contract: there is no implicit
/// save-on-exit).
pub fn run<D: BlockDevice>(
    editor: &mut Editor,
    console: &mut impl Console,
    keyboard: &mut impl Keyboard,
    volume: &mut Fat16Volume<D>,
    path: &str,
) -> Result<(), EditorError> {
    editor.render(console, path);

    loop {
        let Some(key) = keyboard.poll_key() else {
            continue;
        };

        let action = editor.handle_key(key, console.width(), console.height(), volume, path)?;
        editor.render(console, path);

        if action == EditorAction::Quit {
            console.clear();
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockDevice;
    use crate::fs::geometry::{Bpb, VolumeGeometry};

    fn formatted_volume() -> Fat16Volume<MemoryBlockDevice> {
        let bpb = Bpb {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sector_count: 1,
            fat_count: 2,
            root_entry_count: 16,
            total_sectors: 64,
            sectors_per_fat: 1,
            hidden_sectors: 0,
        };
        let geometry = VolumeGeometry::new_unchecked(0, bpb).unwrap();
        Fat16Volume::mount_with_geometry(MemoryBlockDevice::new(64), geometry)
    }

    #[test]
    fn insert_and_cursor_advance() {
        let mut editor = Editor::new();
        editor.insert_char(b'h').unwrap();
        editor.insert_char(b'i').unwrap();
        assert_eq!(editor.contents(), b"hi");
        assert_eq!(editor.cursor(), 2);
        assert!(editor.is_dirty());
    }

    #[test]
    fn save_then_load_round_trips_through_volume() {
        let mut volume = formatted_volume();
        volume.touch("note.txt").unwrap();

        let mut editor = Editor::new();
        for byte in b"hello world" {
            editor.insert_char(*byte).unwrap();
        }
        editor
            .handle_key(Key::CtrlS, 80, 25, &mut volume, "note.txt")
            .unwrap();
        assert!(!editor.is_dirty());

        let mut reloaded = Editor::new();
        reloaded.load_from_volume(&mut volume, "note.txt").unwrap();
        assert_eq!(reloaded.contents(), b"hello world");
    }

    #[test]
    fn ctrl_q_requires_confirmation_when_dirty() {
        let mut volume = formatted_volume();
        volume.touch("note.txt").unwrap();

        let mut editor = Editor::new();
        editor.insert_char(b'x').unwrap();

        let first = editor
            .handle_key(Key::CtrlQ, 80, 25, &mut volume, "note.txt")
            .unwrap();
        assert_eq!(first, EditorAction::Continue);
        assert_eq!(editor.status.as_str(), "Unsaved (Ctrl+Q again)");

        let second = editor
            .handle_key(Key::CtrlQ, 80, 25, &mut volume, "note.txt")
            .unwrap();
        assert_eq!(second, EditorAction::Quit);

        let mut buf = [0u8; 16];
        assert_eq!(volume.cat("note.txt", &mut buf).unwrap(), b"");
    }

    #[test]
    fn ctrl_q_quits_immediately_when_not_dirty() {
        let mut volume = formatted_volume();
        volume.touch("note.txt").unwrap();

        let mut editor = Editor::new();
        let action = editor
            .handle_key(Key::CtrlQ, 80, 25, &mut volume, "note.txt")
            .unwrap();
        assert_eq!(action, EditorAction::Quit);
    }

    #[test]
    fn editing_after_confirming_quit_disarms_it() {
        let mut volume = formatted_volume();
        volume.touch("note.txt").unwrap();

        let mut editor = Editor::new();
        editor.insert_char(b'x').unwrap();
        editor
            .handle_key(Key::CtrlQ, 80, 25, &mut volume, "note.txt")
            .unwrap();

        editor.insert_char(b'y').unwrap();
        let action = editor
            .handle_key(Key::CtrlQ, 80, 25, &mut volume, "note.txt")
            .unwrap();
        assert_eq!(action, EditorAction::Continue);
    }

    #[test]
    fn load_missing_file_starts_fresh_with_new_file_status() {
        let mut volume = formatted_volume();
        let mut editor = Editor::new();
        editor.load_from_volume(&mut volume, "missing.txt").unwrap();
        assert!(editor.contents().is_empty());
        assert!(!editor.is_dirty());
        assert_eq!(editor.status.as_str(), "New file");
    }

    #[test]
    fn insert_overflow_sets_buffer_full_status_without_mutating() {
        let mut editor = Editor::new();
        for _ in 0..buffer::BUFFER_CAPACITY {
            editor.insert_char(b'a').unwrap();
        }
        let before = editor.contents().len();

        editor.insert_char(b'b').unwrap();

        assert_eq!(editor.contents().len(), before);
        assert_eq!(editor.status.as_str(), "Buffer full");
    }

    #[test]
    fn backspace_at_start_is_a_no_op() {
        let mut editor = Editor::new();
        editor.backspace().unwrap();
        assert_eq!(editor.contents(), b"");
        assert_eq!(editor.cursor(), 0);
    }

    #[test]
    fn arrow_up_down_preserve_column_across_lines() {
        let mut editor = Editor::new();
        for byte in b"ab\ncdef" {
            editor.insert_char(*byte).unwrap();
        }
        // Cursor is after 'f', row 1 col 4. Move up: row 0 only has 2
        // columns, so col clamps to end of that row.
        editor.move_to_visual(1, 4, 80);
        let mut volume = formatted_volume();
        volume.touch("x.txt").unwrap();
        editor
            .handle_key(Key::ArrowUp, 80, 25, &mut volume, "x.txt")
            .unwrap();
        assert_eq!(editor.cursor(), 2); // right before the newline
    }
}
