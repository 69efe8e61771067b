// buffer.rs
use core::fmt::Write;

/// Fixed-capacity text buffer used to format output before it hits a sink.
#[repr(align(4))]
pub struct TextBuffer<const SIZE: usize> {
    buf: [u8; SIZE],
    pub pos: usize,
}

impl<const SIZE: usize> Write for TextBuffer<SIZE> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remainder = self.buf.len() - self.pos;
        if remainder < bytes.len() {
            return Err(core::fmt::Error);
        }

        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

impl<const SIZE: usize> TextBuffer<SIZE> {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; SIZE],
            pos: 0,
        }
    }

    /// Formats `args` as one unit: on overflow the buffer is rolled back to
    /// where it was, so a partial element never reaches the sink.
    pub fn write_unit(&mut self, args: core::fmt::Arguments<'_>) -> Result<usize, core::fmt::Error> {
        let start_pos = self.pos;
        if self.write_fmt(args).is_err() {
            self.pos = start_pos;
            return Err(core::fmt::Error);
        }
        Ok(self.pos - start_pos)
    }

    /// Same as `write_unit` for an element built from several writes.
    pub fn write_with<F>(&mut self, f: F) -> Result<usize, core::fmt::Error>
    where
        F: FnOnce(&mut Self) -> core::fmt::Result,
    {
        let start_pos = self.pos;
        if f(self).is_err() {
            self.pos = start_pos;
            return Err(core::fmt::Error);
        }
        Ok(self.pos - start_pos)
    }

    pub fn space_remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn get_active_buffer(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.get_active_buffer()).unwrap_or("")
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl<const SIZE: usize> Default for TextBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
