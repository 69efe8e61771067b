// gps/types.rs
use core::fmt;
use heapless::{String, Vec};

/// Raw text copied out of a sentence field.
pub type TextField = String<12>;

/// Largest table of satellites kept for GSA and GSV.
pub const MAX_SATELLITES: usize = 12;

/// Satellites carried by one GSV page.
pub const SATELLITES_PER_PAGE: usize = 4;

/// GGA position fix indicator.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixQuality {
    #[default]
    Invalid = 0,
    Gps = 1,
    Dgps = 2,
    Pps = 3,
    RtkFixed = 4,
    RtkFloat = 5,
    DeadReckoning = 6,
    Manual = 7,
    Simulated = 8,
}

impl FixQuality {
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::DeadReckoning,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulated,
            _ => FixQuality::Invalid,
        }
    }
}

/// GSA fix mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FixMode {
    #[default]
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

impl FixMode {
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            2 => FixMode::Fix2D,
            3 => FixMode::Fix3D,
            _ => FixMode::NoFix,
        }
    }
}

/// Calendar timestamp assembled from the RMC time and date fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtcDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl UtcDateTime {
    pub const fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }
}

/// ISO-8601, as GPX expects it: `YYYY-MM-DDTHH:MM:SSZ`.
impl fmt::Display for UtcDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GgaRecord {
    /// Seconds since midnight UTC, fraction dropped.
    pub time_of_day_s: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub fix: FixQuality,
    pub satellites: u8,
    pub hdop: Option<f32>,
    /// Antenna altitude above mean sea level, meters, as sent.
    pub altitude: TextField,
    /// Geoid separation (WGS84), meters, as sent.
    pub geoid_separation: TextField,
}

impl GgaRecord {
    pub fn altitude_m(&self) -> Option<f32> {
        self.altitude.parse().ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RmcRecord {
    /// Status field was `A`.
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f32>,
    pub course_deg: Option<f32>,
    pub datetime: Option<UtcDateTime>,
    /// Mode indicator (A/D/E/N), as sent.
    pub mode: TextField,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GsaRecord {
    /// `A` automatic or `M` manual 2D/3D selection.
    pub selection: TextField,
    pub fix_mode: FixMode,
    /// PRNs in use; ends at the first empty slot.
    pub prns: Vec<u8, MAX_SATELLITES>,
    pub pdop: Option<f32>,
    pub hdop: Option<f32>,
    pub vdop: Option<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SatelliteInfo {
    pub prn: u8,
    pub elevation_deg: Option<u8>,
    pub azimuth_deg: Option<u16>,
    /// Empty while the satellite is not tracked.
    pub snr_db: Option<u8>,
}

/// One page of a GSV burst.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GsvPage {
    pub page_count: u8,
    /// 1-based.
    pub page_index: u8,
    pub sats_in_view: u8,
    pub satellites: Vec<SatelliteInfo, SATELLITES_PER_PAGE>,
}

impl GsvPage {
    /// Slot of this page's first satellite in the 12-entry table.
    pub fn table_offset(&self) -> usize {
        usize::from(self.page_index.saturating_sub(1)) * SATELLITES_PER_PAGE
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VtgRecord {
    pub course_true: TextField,
    pub course_magnetic: TextField,
    pub speed_knots: TextField,
    pub speed_kmh: TextField,
}

/// One decoded sentence.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavRecord {
    Gga(GgaRecord),
    Rmc(RmcRecord),
    Gsa(GsaRecord),
    Gsv(GsvPage),
    Vtg(VtgRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaError {
    /// No `*HH` trailer, or the trailer is not two uppercase hex digits.
    MissingChecksum,
    InvalidChecksum,
    /// Checksum matched but a mandatory field is unusable.
    InvalidData,
}

/// Running totals for everything the scanner looked at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderHealth {
    pub decoded: u32,
    pub checksum_errors: u32,
    pub malformed: u32,
    pub unsupported: u32,
}

impl DecoderHealth {
    pub const fn new() -> Self {
        Self {
            decoded: 0,
            checksum_errors: 0,
            malformed: 0,
            unsupported: 0,
        }
    }

    pub fn merge(&mut self, other: &DecoderHealth) {
        self.decoded = self.decoded.saturating_add(other.decoded);
        self.checksum_errors = self.checksum_errors.saturating_add(other.checksum_errors);
        self.malformed = self.malformed.saturating_add(other.malformed);
        self.unsupported = self.unsupported.saturating_add(other.unsupported);
    }
}
