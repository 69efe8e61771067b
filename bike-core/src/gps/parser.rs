// gps/parser.rs
use crate::gps::types::{
    DecoderHealth, FixMode, FixQuality, GgaRecord, GsaRecord, GsvPage, MAX_SATELLITES, NavRecord,
    NmeaError, RmcRecord, SATELLITES_PER_PAGE, SatelliteInfo, TextField, UtcDateTime, VtgRecord,
};
use heapless::Vec;

pub const START_MARKER: u8 = b'$';
pub const CHECKSUM_MARKER: u8 = b'*';

/// Fields kept per sentence, identifier included.
pub const MAX_FIELDS: usize = 20;

/// XOR of every byte in `body`.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &b| acc ^ b)
}

pub fn validate_checksum(span: &[u8]) -> bool {
    checked_body(span).is_ok()
}

/// Strips the `$` and `*HH` framing and returns the body once its checksum matches.
fn checked_body(span: &[u8]) -> Result<&[u8], NmeaError> {
    let rest = span.strip_prefix(&[START_MARKER]).unwrap_or(span);
    let star = rest
        .iter()
        .position(|&b| b == CHECKSUM_MARKER)
        .ok_or(NmeaError::MissingChecksum)?;
    let (body, trailer) = rest.split_at(star);
    let expected = match trailer.get(1..3) {
        Some(&[hi, lo]) => match (hex_digit(hi), hex_digit(lo)) {
            (Some(hi), Some(lo)) => (hi << 4) | lo,
            _ => return Err(NmeaError::MissingChecksum),
        },
        _ => return Err(NmeaError::MissingChecksum),
    };
    if checksum(body) != expected {
        return Err(NmeaError::InvalidChecksum);
    }
    Ok(body)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Comma-split view over a sentence body. Missing fields read as empty.
pub struct Fields<'a> {
    fields: Vec<&'a str, MAX_FIELDS>,
}

impl<'a> Fields<'a> {
    pub fn new(body: &'a str) -> Self {
        Self {
            fields: body.split(',').take(MAX_FIELDS).collect(),
        }
    }

    pub fn get(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decodes one `$...*HH` span.
///
/// `Ok(None)` is a well-formed sentence of a type we do not track.
pub fn decode_sentence(span: &[u8]) -> Result<Option<NavRecord>, NmeaError> {
    let body = checked_body(span)?;
    let Ok(text) = core::str::from_utf8(body) else {
        return Err(NmeaError::InvalidData);
    };

    let fields = Fields::new(text);
    let record = match fields.get(0).as_bytes() {
        [t0, t1, kind @ ..] if t0.is_ascii_uppercase() && t1.is_ascii_uppercase() => match kind {
            b"GGA" => NavRecord::Gga(parse_gga(&fields)?),
            b"RMC" => NavRecord::Rmc(parse_rmc(&fields)?),
            b"GSA" => NavRecord::Gsa(parse_gsa(&fields)?),
            b"GSV" => NavRecord::Gsv(parse_gsv(&fields)?),
            b"VTG" => NavRecord::Vtg(parse_vtg(&fields)),
            _ => return Ok(None),
        },
        _ => return Err(NmeaError::InvalidData),
    };
    Ok(Some(record))
}

fn parse_gga(fields: &Fields<'_>) -> Result<GgaRecord, NmeaError> {
    let fix = match fields.get(6) {
        "" => FixQuality::Invalid,
        raw => FixQuality::from_u8(raw.parse().map_err(|_| NmeaError::InvalidData)?),
    };
    Ok(GgaRecord {
        time_of_day_s: parse_time_of_day(fields.get(1)).map(|(h, m, s)| seconds_of_day(h, m, s)),
        latitude: parse_coordinate(fields.get(2), fields.get(3)),
        longitude: parse_coordinate(fields.get(4), fields.get(5)),
        fix,
        satellites: fields.get(7).parse().unwrap_or(0),
        hdop: parse_f32(fields.get(8)),
        altitude: text(fields.get(9)),
        geoid_separation: text(fields.get(11)),
    })
}

fn parse_rmc(fields: &Fields<'_>) -> Result<RmcRecord, NmeaError> {
    let valid = match fields.get(2) {
        "A" => true,
        "V" | "" => false,
        _ => return Err(NmeaError::InvalidData),
    };
    let datetime = match (parse_time_of_day(fields.get(1)), parse_date(fields.get(9))) {
        (Some((hour, minute, second)), Some((day, month, year))) => Some(UtcDateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }),
        _ => None,
    };
    Ok(RmcRecord {
        valid,
        latitude: parse_coordinate(fields.get(3), fields.get(4)),
        longitude: parse_coordinate(fields.get(5), fields.get(6)),
        speed_knots: parse_f32(fields.get(7)),
        course_deg: parse_f32(fields.get(8)),
        datetime,
        mode: text(fields.get(12)),
    })
}

fn parse_gsa(fields: &Fields<'_>) -> Result<GsaRecord, NmeaError> {
    let fix_mode = fields
        .get(2)
        .parse()
        .map(FixMode::from_u8)
        .map_err(|_| NmeaError::InvalidData)?;

    let mut prns = Vec::new();
    for slot in 0..MAX_SATELLITES {
        let Ok(prn) = fields.get(3 + slot).parse::<u8>() else {
            break;
        };
        // Capacity equals the slot count.
        let _ = prns.push(prn);
    }

    Ok(GsaRecord {
        selection: text(fields.get(1)),
        fix_mode,
        prns,
        pdop: parse_f32(fields.get(15)),
        hdop: parse_f32(fields.get(16)),
        vdop: parse_f32(fields.get(17)),
    })
}

fn parse_gsv(fields: &Fields<'_>) -> Result<GsvPage, NmeaError> {
    let page_count: u8 = fields.get(1).parse().map_err(|_| NmeaError::InvalidData)?;
    let page_index: u8 = fields.get(2).parse().map_err(|_| NmeaError::InvalidData)?;
    if page_index == 0 {
        return Err(NmeaError::InvalidData);
    }
    let sats_in_view: u8 = fields.get(3).parse().unwrap_or(0);

    let mut page = GsvPage {
        page_count,
        page_index,
        sats_in_view,
        satellites: Vec::new(),
    };
    let offset = page.table_offset();
    for entry in 0..SATELLITES_PER_PAGE {
        if offset + entry >= usize::from(sats_in_view) {
            break;
        }
        let base = 4 + entry * 4;
        let Ok(prn) = fields.get(base).parse::<u8>() else {
            break;
        };
        let _ = page.satellites.push(SatelliteInfo {
            prn,
            elevation_deg: fields.get(base + 1).parse().ok(),
            azimuth_deg: fields.get(base + 2).parse().ok(),
            snr_db: fields.get(base + 3).parse().ok(),
        });
    }
    Ok(page)
}

fn parse_vtg(fields: &Fields<'_>) -> VtgRecord {
    VtgRecord {
        course_true: text(fields.get(1)),
        course_magnetic: text(fields.get(3)),
        speed_knots: text(fields.get(5)),
        speed_kmh: text(fields.get(7)),
    }
}

/// `HHMMSS[.sss]`; the fraction is dropped.
fn parse_time_of_day(raw: &str) -> Option<(u8, u8, u8)> {
    let hour = two_digits(raw, 0)?;
    let minute = two_digits(raw, 2)?;
    let second = two_digits(raw, 4)?;
    (hour < 24 && minute < 60 && second < 61).then_some((hour, minute, second))
}

/// `DDMMYY`, years taken as 20YY.
fn parse_date(raw: &str) -> Option<(u8, u8, u16)> {
    let day = two_digits(raw, 0)?;
    let month = two_digits(raw, 2)?;
    let year = two_digits(raw, 4)?;
    ((1..=31).contains(&day) && (1..=12).contains(&month)).then_some((day, month, 2000 + u16::from(year)))
}

fn two_digits(raw: &str, at: usize) -> Option<u8> {
    match raw.as_bytes().get(at..at + 2)? {
        &[a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some((a - b'0') * 10 + (b - b'0')),
        _ => None,
    }
}

fn seconds_of_day(hour: u8, minute: u8, second: u8) -> u32 {
    u32::from(hour) * 3600 + u32::from(minute) * 60 + u32::from(second)
}

/// `[D]DDMM.mmmm` plus hemisphere to signed decimal degrees.
fn parse_coordinate(raw: &str, hemisphere: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let dot_pos = raw.find('.').unwrap_or(raw.len());
    if dot_pos < 2 {
        return None;
    }
    let degrees = match raw.get(..dot_pos - 2)? {
        "" => 0.0,
        deg => deg.parse::<f64>().ok()?,
    };
    let minutes = raw.get(dot_pos - 2..)?.parse::<f64>().ok()?;
    if !(0.0..60.0).contains(&minutes) {
        return None;
    }
    let value = degrees + minutes / 60.0;

    if hemisphere == "S" || hemisphere == "W" {
        Some(-value)
    } else {
        Some(value)
    }
}

fn parse_f32(raw: &str) -> Option<f32> {
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

/// Copies a field, truncating at capacity.
fn text(raw: &str) -> TextField {
    let mut out = TextField::new();
    for c in raw.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Walks a receive buffer span by span, yielding every record that decodes.
///
/// A span runs from one `$` up to the next `$` (or the end of the buffer),
/// so a corrupt sentence never swallows the one after it.
pub struct Sentences<'a> {
    rest: &'a [u8],
    health: DecoderHealth,
}

impl<'a> Sentences<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            rest: buffer,
            health: DecoderHealth::new(),
        }
    }

    /// What the scan has seen so far.
    pub fn health(&self) -> DecoderHealth {
        self.health
    }

    fn next_span(&mut self) -> Option<&'a [u8]> {
        let start = self.rest.iter().position(|&b| b == START_MARKER)?;
        let tail = &self.rest[start + 1..];
        let end = tail
            .iter()
            .position(|&b| b == START_MARKER)
            .map_or(self.rest.len(), |p| start + 1 + p);
        let span = &self.rest[start..end];
        self.rest = &self.rest[end..];
        Some(span)
    }
}

impl Iterator for Sentences<'_> {
    type Item = NavRecord;

    fn next(&mut self) -> Option<NavRecord> {
        loop {
            let span = self.next_span()?;
            match decode_sentence(span) {
                Ok(Some(record)) => {
                    self.health.decoded = self.health.decoded.saturating_add(1);
                    return Some(record);
                }
                Ok(None) => {
                    self.health.unsupported = self.health.unsupported.saturating_add(1);
                }
                Err(NmeaError::MissingChecksum | NmeaError::InvalidChecksum) => {
                    self.health.checksum_errors = self.health.checksum_errors.saturating_add(1);
                    trace!("nmea: checksum rejected, span of {} bytes skipped", span.len());
                }
                Err(NmeaError::InvalidData) => {
                    self.health.malformed = self.health.malformed.saturating_add(1);
                    trace!("nmea: malformed sentence skipped");
                }
            }
        }
    }
}
