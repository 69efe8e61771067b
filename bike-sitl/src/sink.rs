use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::Context;
use embedded_io::ErrorKind;

/// I/O failure on the track file, reported to the recorder by kind.
#[derive(Debug)]
pub struct FileSinkError(io::ErrorKind);

impl embedded_io::Error for FileSinkError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            _ => ErrorKind::Other,
        }
    }
}

impl From<io::Error> for FileSinkError {
    fn from(err: io::Error) -> Self {
        log::error!("track file: {err}");
        Self(err.kind())
    }
}

/// Append-only track file, the host stand-in for the SD card.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path).with_context(|| format!("creating track file {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl embedded_io::ErrorType for FileSink {
    type Error = FileSinkError;
}

impl embedded_io::Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, FileSinkError> {
        Ok(io::Write::write(&mut self.writer, buf)?)
    }

    fn flush(&mut self) -> Result<(), FileSinkError> {
        Ok(io::Write::flush(&mut self.writer)?)
    }
}
