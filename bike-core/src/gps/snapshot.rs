// gps/snapshot.rs
use crate::gps::parser::Sentences;
use crate::gps::types::{
    DecoderHealth, GgaRecord, GsaRecord, GsvPage, MAX_SATELLITES, NavRecord, RmcRecord,
    SATELLITES_PER_PAGE, SatelliteInfo, VtgRecord,
};

/// Satellites in view, assembled from GSV pages.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GsvTable {
    pub sats_in_view: u8,
    pub slots: [Option<SatelliteInfo>; MAX_SATELLITES],
}

impl GsvTable {
    /// Merges one page at `(page_index - 1) * 4`. Page 1 starts a new burst.
    pub fn apply(&mut self, page: &GsvPage) {
        if page.page_index == 1 {
            self.slots = [None; MAX_SATELLITES];
        }
        self.sats_in_view = page.sats_in_view;

        let offset = page.table_offset();
        let limit = (offset + SATELLITES_PER_PAGE)
            .min(usize::from(page.sats_in_view))
            .min(MAX_SATELLITES);
        for (slot, sat) in (offset..limit).zip(page.satellites.iter()) {
            self.slots[slot] = Some(*sat);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SatelliteInfo> {
        self.slots.iter().flatten()
    }

    /// Satellites with a reported SNR.
    pub fn tracked(&self) -> usize {
        self.iter().filter(|s| s.snr_db.is_some()).count()
    }
}

/// Latest record of every sentence type. There is no history.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavSnapshot {
    pub gga: Option<GgaRecord>,
    pub rmc: Option<RmcRecord>,
    pub gsa: Option<GsaRecord>,
    pub gsv: GsvTable,
    pub vtg: Option<VtgRecord>,
    pub health: DecoderHealth,
}

impl NavSnapshot {
    pub const fn new() -> Self {
        Self {
            gga: None,
            rmc: None,
            gsa: None,
            gsv: GsvTable {
                sats_in_view: 0,
                slots: [None; MAX_SATELLITES],
            },
            vtg: None,
            health: DecoderHealth::new(),
        }
    }

    pub fn apply(&mut self, record: NavRecord) {
        match record {
            NavRecord::Gga(gga) => self.gga = Some(gga),
            NavRecord::Rmc(rmc) => self.rmc = Some(rmc),
            NavRecord::Gsa(gsa) => self.gsa = Some(gsa),
            NavRecord::Gsv(page) => self.gsv.apply(&page),
            NavRecord::Vtg(vtg) => self.vtg = Some(vtg),
        }
    }

    /// Decodes a whole receive buffer into the snapshot and returns the
    /// counters for this buffer alone.
    pub fn ingest(&mut self, buffer: &[u8]) -> DecoderHealth {
        let mut sentences = Sentences::new(buffer);
        for record in sentences.by_ref() {
            self.apply(record);
        }
        let batch = sentences.health();
        self.health.merge(&batch);
        batch
    }

    /// GGA HDOP when present, otherwise the GSA one.
    pub fn hdop(&self) -> Option<f32> {
        self.gga
            .as_ref()
            .and_then(|g| g.hdop)
            .or_else(|| self.gsa.as_ref().and_then(|g| g.hdop))
    }

    /// GGA position when present, otherwise the RMC one.
    pub fn position(&self) -> Option<(f64, f64)> {
        let from_gga = self.gga.as_ref().and_then(|g| Some((g.latitude?, g.longitude?)));
        from_gga.or_else(|| self.rmc.as_ref().and_then(|r| Some((r.latitude?, r.longitude?))))
    }
}
