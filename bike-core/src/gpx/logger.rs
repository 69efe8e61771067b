// gpx/logger.rs
use embedded_io::Write;

use crate::config::GateConfig;
use crate::gps::snapshot::NavSnapshot;
use crate::gps::types::UtcDateTime;
use crate::gpx::writer::{RecorderState, TrackError, TrackPoint, TrackRecorder};

/// Why a snapshot was not written to the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Suppression {
    /// GGA fix quality below the minimum (or no GGA yet), or a GSA fix mode
    /// below the minimum.
    NoFix,
    /// RMC status is not `A`, or no RMC yet.
    InvalidRmc,
    /// HDOP missing or not below the limit.
    HighHdop,
    /// Fix accepted but the snapshot has no position or no date.
    Incomplete,
    /// Position or elevation outside what a track point can hold.
    OutOfRange,
    /// Same timestamp as the last logged point.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogOutcome {
    /// `segment_started` is set when this point opened a segment.
    Logged { segment_started: bool },
    Suppressed(Suppression),
}

/// Sensor values attached to a track point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointExtras {
    pub temperature_c: Option<f32>,
    pub cadence_rpm: Option<u8>,
}

/// Fix-quality gate: GGA fix quality, GSA fix mode, RMC validity and HDOP,
/// in that order. Receivers that send no GSA skip the fix mode check.
pub fn check_gate(snapshot: &NavSnapshot, gate: &GateConfig) -> Result<(), Suppression> {
    match &snapshot.gga {
        Some(gga) if gga.fix >= gate.min_fix_quality => {}
        _ => return Err(Suppression::NoFix),
    }
    if let Some(gsa) = &snapshot.gsa {
        if (gsa.fix_mode as u8) < gate.min_fix_mode {
            return Err(Suppression::NoFix);
        }
    }
    match &snapshot.rmc {
        Some(rmc) if rmc.valid => {}
        _ => return Err(Suppression::InvalidRmc),
    }
    match snapshot.hdop() {
        Some(hdop) if hdop < gate.max_hdop => Ok(()),
        _ => Err(Suppression::HighHdop),
    }
}

/// Builds the point for the current snapshot. Elevation falls back to 0 m
/// when GGA has not reported one.
pub fn track_point(snapshot: &NavSnapshot, extras: PointExtras) -> Option<TrackPoint> {
    let (latitude, longitude) = snapshot.position()?;
    let time: UtcDateTime = snapshot.rmc.as_ref()?.datetime?;
    let elevation_m = snapshot
        .gga
        .as_ref()
        .and_then(|gga| gga.altitude_m())
        .unwrap_or(0.0);
    Some(TrackPoint {
        latitude,
        longitude,
        elevation_m,
        time,
        temperature_c: extras.temperature_c,
        cadence_rpm: extras.cadence_rpm,
    })
}

/// Feeds gated snapshots into a recorder, breaking the segment across
/// every fix outage.
pub struct TrackLogger<W: Write> {
    recorder: TrackRecorder<W>,
    pub gate: GateConfig,
    gap: bool,
    last_time: Option<UtcDateTime>,
    suppressed: u32,
}

impl<W: Write> TrackLogger<W> {
    pub fn new(recorder: TrackRecorder<W>, gate: GateConfig) -> Self {
        Self {
            recorder,
            gate,
            gap: false,
            last_time: None,
            suppressed: 0,
        }
    }

    /// Writes the header and opens the track.
    pub fn start(&mut self, track_name: Option<&str>) -> Result<(), TrackError> {
        self.recorder.init()?;
        self.recorder.open_track(track_name)
    }

    pub fn log(&mut self, snapshot: &NavSnapshot, extras: PointExtras) -> Result<LogOutcome, TrackError> {
        let point = match self.admit(snapshot, extras) {
            Ok(point) => point,
            Err(Suppression::Duplicate) => return Ok(LogOutcome::Suppressed(Suppression::Duplicate)),
            Err(reason) => {
                if !self.gap && self.recorder.state() == RecorderState::SegmentOpen {
                    debug!("gpx: fix lost, segment will break: {:?}", reason);
                }
                self.gap = true;
                self.suppressed = self.suppressed.saturating_add(1);
                return Ok(LogOutcome::Suppressed(reason));
            }
        };

        let segment_started = match self.recorder.state() {
            RecorderState::SegmentOpen if self.gap => {
                self.recorder.new_segment()?;
                true
            }
            RecorderState::SegmentOpen => false,
            _ => {
                self.recorder.open_segment()?;
                true
            }
        };
        self.recorder.add_point(&point)?;
        self.gap = false;
        self.last_time = Some(point.time);
        Ok(LogOutcome::Logged { segment_started })
    }

    fn admit(&self, snapshot: &NavSnapshot, extras: PointExtras) -> Result<TrackPoint, Suppression> {
        check_gate(snapshot, &self.gate)?;
        let point = track_point(snapshot, extras).ok_or(Suppression::Incomplete)?;
        if !point.is_valid() {
            return Err(Suppression::OutOfRange);
        }
        if self.last_time == Some(point.time) {
            return Err(Suppression::Duplicate);
        }
        Ok(point)
    }

    pub fn recorder(&self) -> &TrackRecorder<W> {
        &self.recorder
    }

    /// Snapshots rejected by the gate so far.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    /// Closes the document and hands back the sink.
    pub fn finish(mut self) -> Result<W, TrackError> {
        self.recorder.close()?;
        Ok(self.recorder.into_inner())
    }
}
