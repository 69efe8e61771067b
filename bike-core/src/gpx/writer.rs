// gpx/writer.rs
use core::fmt::{self, Write as _};
use embedded_io::{Error as _, ErrorKind, Write};

use crate::buffer::TextBuffer;
use crate::gps::types::UtcDateTime;

/// `creator` attribute written when none is configured.
pub const GPX_CREATOR: &str = "IoTProject2023";

/// Largest single element (header or point) the recorder formats.
pub const FORMAT_BUFFER_SIZE: usize = 512;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const GPX_SCHEMA: &str = "http://www.topografix.com/GPX/1/1/gpx.xsd";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const TPX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

/// Position of the recorder in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecorderState {
    Unopened,
    HeaderWritten,
    TrackOpen,
    SegmentOpen,
    SegmentClosed,
    TrackClosed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackError {
    #[error("track sink write failed: {0:?}")]
    Sink(ErrorKind),
    #[error("operation not allowed in recorder state {0:?}")]
    InvalidState(RecorderState),
    #[error("element does not fit the format buffer")]
    Format,
    #[error("track point coordinates out of range")]
    InvalidPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f32,
    pub time: UtcDateTime,
    /// Written as `gpxtpx:atemp`.
    pub temperature_c: Option<f32>,
    /// Written as `gpxtpx:cad`.
    pub cadence_rpm: Option<u8>,
}

impl TrackPoint {
    /// Coordinates in range and a finite elevation.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.elevation_m.is_finite()
    }
}

/// Incremental GPX 1.1 writer over an append-only sink.
///
/// Every element is formatted completely before it is written, so formatting
/// never emits half an element. A failed write leaves the state unchanged,
/// though the sink may already hold part of that element.
pub struct TrackRecorder<W: Write> {
    sink: W,
    state: RecorderState,
    buffer: TextBuffer<FORMAT_BUFFER_SIZE>,
    creator: &'static str,
    points: u32,
    segments: u32,
}

impl<W: Write> TrackRecorder<W> {
    pub fn new(sink: W) -> Self {
        Self::with_creator(sink, GPX_CREATOR)
    }

    pub fn with_creator(sink: W, creator: &'static str) -> Self {
        Self {
            sink,
            state: RecorderState::Unopened,
            buffer: TextBuffer::new(),
            creator,
            points: 0,
            segments: 0,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn points_written(&self) -> u32 {
        self.points
    }

    pub fn segments_written(&self) -> u32 {
        self.segments
    }

    /// XML prolog and the `<gpx>` root.
    pub fn init(&mut self) -> Result<(), TrackError> {
        self.require(&[RecorderState::Unopened])?;
        let creator = self.creator;
        self.emit(format_args!(
            "<?xml version='1.0' encoding='UTF-8'?>\n<gpx version=\"1.1\" creator=\"{}\" xmlns=\"{}\" xmlns:xsi=\"{}\" xmlns:gpxtpx=\"{}\" xsi:schemaLocation=\"{} {}\">\n",
            Escaped(creator),
            GPX_NAMESPACE,
            XSI_NAMESPACE,
            TPX_NAMESPACE,
            GPX_NAMESPACE,
            GPX_SCHEMA
        ))?;
        self.state = RecorderState::HeaderWritten;
        Ok(())
    }

    pub fn open_track(&mut self, name: Option<&str>) -> Result<(), TrackError> {
        self.require(&[RecorderState::HeaderWritten])?;
        self.emit_with(|out| {
            out.write_str("\t<trk>\n")?;
            if let Some(name) = name {
                writeln!(out, "\t\t<name>{}</name>", Escaped(name))?;
            }
            Ok(())
        })?;
        self.state = RecorderState::TrackOpen;
        Ok(())
    }

    pub fn open_segment(&mut self) -> Result<(), TrackError> {
        self.require(&[RecorderState::TrackOpen, RecorderState::SegmentClosed])?;
        self.emit(format_args!("\t\t<trkseg>\n"))?;
        self.state = RecorderState::SegmentOpen;
        self.segments += 1;
        Ok(())
    }

    pub fn close_segment(&mut self) -> Result<(), TrackError> {
        self.require(&[RecorderState::SegmentOpen])?;
        self.emit(format_args!("\t\t</trkseg>\n"))?;
        self.state = RecorderState::SegmentClosed;
        Ok(())
    }

    /// Ends the open segment, if any, and starts the next one.
    pub fn new_segment(&mut self) -> Result<(), TrackError> {
        match self.state {
            RecorderState::SegmentOpen => {
                self.emit(format_args!("\t\t</trkseg>\n\t\t<trkseg>\n"))?;
                self.segments += 1;
                Ok(())
            }
            _ => self.open_segment(),
        }
    }

    pub fn add_point(&mut self, point: &TrackPoint) -> Result<(), TrackError> {
        self.require(&[RecorderState::SegmentOpen])?;
        if !point.is_valid() {
            return Err(TrackError::InvalidPoint);
        }
        self.emit_with(|out| write_point(out, point))?;
        self.points += 1;
        Ok(())
    }

    /// Closes the track along with a segment left open.
    pub fn close_track(&mut self) -> Result<(), TrackError> {
        match self.state {
            RecorderState::SegmentOpen => self.emit(format_args!("\t\t</trkseg>\n\t</trk>\n"))?,
            RecorderState::TrackOpen | RecorderState::SegmentClosed => self.emit(format_args!("\t</trk>\n"))?,
            state => return Err(TrackError::InvalidState(state)),
        }
        self.state = RecorderState::TrackClosed;
        Ok(())
    }

    /// Closes whatever is still open, ends the document and flushes the sink.
    pub fn close(&mut self) -> Result<(), TrackError> {
        match self.state {
            RecorderState::TrackOpen | RecorderState::SegmentOpen | RecorderState::SegmentClosed => {
                self.close_track()?
            }
            RecorderState::HeaderWritten | RecorderState::TrackClosed => {}
            state => return Err(TrackError::InvalidState(state)),
        }
        self.emit(format_args!("</gpx>\n"))?;
        self.sink.flush().map_err(|e| sink_error(e.kind()))?;
        self.state = RecorderState::Closed;
        info!("gpx: track closed, {} points in {} segments", self.points, self.segments);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn require(&self, allowed: &[RecorderState]) -> Result<(), TrackError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TrackError::InvalidState(self.state))
        }
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) -> Result<(), TrackError> {
        self.buffer.reset();
        self.buffer.write_unit(args).map_err(|_| TrackError::Format)?;
        self.write_buffer()
    }

    fn emit_with<F>(&mut self, f: F) -> Result<(), TrackError>
    where
        F: FnOnce(&mut TextBuffer<FORMAT_BUFFER_SIZE>) -> fmt::Result,
    {
        self.buffer.reset();
        self.buffer.write_with(f).map_err(|_| TrackError::Format)?;
        self.write_buffer()
    }

    fn write_buffer(&mut self) -> Result<(), TrackError> {
        self.sink
            .write_all(self.buffer.get_active_buffer())
            .map_err(|e| sink_error(e.kind()))
    }
}

fn sink_error(kind: ErrorKind) -> TrackError {
    error!("gpx: sink write failed: {:?}", kind);
    TrackError::Sink(kind)
}

fn write_point<O: fmt::Write>(out: &mut O, point: &TrackPoint) -> fmt::Result {
    writeln!(out, "\t\t\t<trkpt lat=\"{:.6}\" lon=\"{:.6}\">", point.latitude, point.longitude)?;
    writeln!(out, "\t\t\t\t<ele>{:.1}</ele>", point.elevation_m)?;
    writeln!(out, "\t\t\t\t<time>{}</time>", point.time)?;
    if point.temperature_c.is_some() || point.cadence_rpm.is_some() {
        out.write_str("\t\t\t\t<extensions>\n\t\t\t\t\t<gpxtpx:TrackPointExtension>\n")?;
        if let Some(temperature) = point.temperature_c {
            writeln!(out, "\t\t\t\t\t\t<gpxtpx:atemp>{:.1}</gpxtpx:atemp>", temperature)?;
        }
        if let Some(cadence) = point.cadence_rpm {
            writeln!(out, "\t\t\t\t\t\t<gpxtpx:cad>{}</gpxtpx:cad>", cadence)?;
        }
        out.write_str("\t\t\t\t\t</gpxtpx:TrackPointExtension>\n\t\t\t\t</extensions>\n")?;
    }
    out.write_str("\t\t\t</trkpt>\n")
}

/// XML character escaping for text and attribute values.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(i) = rest.find(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
            f.write_str(&rest[..i])?;
            f.write_str(match rest.as_bytes()[i] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&apos;",
            })?;
            rest = &rest[i + 1..];
        }
        f.write_str(rest)
    }
}
