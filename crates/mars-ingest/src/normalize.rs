//! Catalog record normalization
//!
//! Turns raw catalog records into [`MarsImage`] rows: thumbnails are dropped,
//! `http://` locators become `https://` (avoids a redirect when the images
//! are loaded), and the textual sol becomes a number or [`UNKNOWN_SOL`].

use mars_common::types::{Catalog, MarsImage, RawImage, THUMBNAIL_SAMPLE_TYPE, UNKNOWN_SOL};

const INSECURE_SCHEME: &str = "http://";
const SECURE_SCHEME: &str = "https://";

/// Every full-resolution image of one sol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCatalog {
    /// Sol reported by the catalog
    pub sol: i64,

    pub images: Vec<MarsImage>,

    /// Records in the catalog, thumbnails included
    pub total_records: usize,
}

impl NormalizedCatalog {
    /// Number of full-resolution images
    pub fn full_resolution(&self) -> usize {
        self.images.len()
    }
}

pub fn is_full_resolution(raw: &RawImage) -> bool {
    raw.sample_type != THUMBNAIL_SAMPLE_TYPE
}

/// Parse a base-10 sol, falling back to [`UNKNOWN_SOL`].
///
/// Negative values fall back as well, so a stored sol is always either a
/// real sol number or the sentinel.
pub fn parse_sol(text: &str) -> i64 {
    match text.parse::<i64>() {
        Ok(sol) if sol >= 0 => sol,
        _ => UNKNOWN_SOL,
    }
}

/// Replace every `http://` with `https://`.
pub fn secure_url(url: &str) -> String {
    url.replace(INSECURE_SCHEME, SECURE_SCHEME)
}

/// Normalize one record, consuming it. Returns `None` for thumbnails.
pub fn normalize(raw: RawImage) -> Option<MarsImage> {
    if !is_full_resolution(&raw) {
        return None;
    }

    Some(MarsImage {
        sol: parse_sol(&raw.sol),
        url: secure_url(&raw.url),
        instrument: raw.instrument,
        item_name: raw.item_name,
        lmst: raw.lmst,
        utc: raw.utc,
    })
}

/// Normalize a whole catalog, consuming it.
pub fn normalize_catalog(catalog: Catalog) -> NormalizedCatalog {
    let total_records = catalog.images.len();
    let images = catalog.images.into_iter().filter_map(normalize).collect();

    NormalizedCatalog {
        sol: catalog.sol,
        images,
        total_records,
    }
}
