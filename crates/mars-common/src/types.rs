//! Domain types for the raw image manifest, sol catalogs and stored images

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Sample type the catalogs use for low resolution previews.
pub const THUMBNAIL_SAMPLE_TYPE: &str = "thumbnail";

/// Sol stored for images whose catalog sol field is not a number.
pub const UNKNOWN_SOL: i64 = -1;

// ============================================================================
// Remote Documents
// ============================================================================

/// The image manifest: every sol with published images, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub sols: Vec<SolRef>,
}

impl Manifest {
    pub fn new(sols: Vec<SolRef>) -> Self {
        Self { sols }
    }

    pub fn len(&self) -> usize {
        self.sols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sols.is_empty()
    }
}

/// A manifest entry pointing at one sol's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolRef {
    /// Sol number
    pub sol: i64,

    /// Location of the sol's image catalog
    pub catalog_url: String,
}

impl SolRef {
    pub fn new(sol: i64, catalog_url: impl Into<String>) -> Self {
        Self {
            sol,
            catalog_url: catalog_url.into(),
        }
    }
}

/// The image catalog of a single sol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sol: i64,

    #[serde(default)]
    pub images: Vec<RawImage>,
}

/// An image record exactly as published in a catalog.
///
/// Text fields tolerate `null`, missing values and bare numbers, all of which
/// occur in the published catalogs. The `sol` field stays textual until
/// normalization decides what to do with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub sample_type: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub instrument: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub lmst: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub sol: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub utc: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Integer(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Text(text)) => text,
        Some(Lenient::Integer(n)) => n.to_string(),
        Some(Lenient::Float(n)) => n.to_string(),
        Some(Lenient::Flag(b)) => b.to_string(),
        None => String::new(),
    })
}

// ============================================================================
// Stored Images
// ============================================================================

/// A normalized full-resolution image, keyed by `item_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarsImage {
    pub instrument: String,
    pub item_name: String,
    pub lmst: String,
    /// Sol number, or [`UNKNOWN_SOL`]
    pub sol: i64,
    /// Always an `https://` locator
    pub url: String,
    pub utc: String,
}

impl MarsImage {
    /// Parse the UTC capture time.
    ///
    /// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form used by the image
    /// table, with or without a `T` separator and fractional seconds.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let utc = self.utc.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(utc) {
            return Some(parsed.with_timezone(&Utc));
        }

        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(utc, format).ok())
            .map(|naive| naive.and_utc())
    }

    /// Whole hours elapsed between capture and `now`.
    pub fn hours_since(&self, now: DateTime<Utc>) -> Option<i64> {
        self.captured_at()
            .map(|captured| (now - captured).num_hours())
    }
}

// ============================================================================
// Instrument Groups
// ============================================================================

/// Instrument groupings used when listing recent images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentGroup {
    /// Every instrument
    #[default]
    Latest,
    Mahli,
    Mastcam,
    Navcam,
    Hazcam,
    Chemcam,
}

impl InstrumentGroup {
    pub const ALL: [InstrumentGroup; 6] = [
        InstrumentGroup::Latest,
        InstrumentGroup::Mahli,
        InstrumentGroup::Mastcam,
        InstrumentGroup::Navcam,
        InstrumentGroup::Hazcam,
        InstrumentGroup::Chemcam,
    ];

    /// Instrument tags in the group. Empty means no filtering.
    pub fn instruments(self) -> &'static [&'static str] {
        match self {
            InstrumentGroup::Latest => &[],
            InstrumentGroup::Mahli => &["MAHLI"],
            InstrumentGroup::Mastcam => &["MAST_LEFT", "MAST_RIGHT"],
            InstrumentGroup::Navcam => &["NAV_LEFT_A", "NAV_LEFT_B", "NAV_RIGHT_A", "NAV_RIGHT_B"],
            InstrumentGroup::Hazcam => {
                &["RHAZ_LEFT_A", "RHAZ_LEFT_B", "RHAZ_RIGHT_A", "RHAZ_RIGHT_B"]
            },
            InstrumentGroup::Chemcam => &["CHEMCAM_RMI"],
        }
    }

    pub fn contains(self, instrument: &str) -> bool {
        let instruments = self.instruments();
        instruments.is_empty() || instruments.contains(&instrument)
    }
}

impl std::str::FromStr for InstrumentGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" | "all" => Ok(InstrumentGroup::Latest),
            "mahli" => Ok(InstrumentGroup::Mahli),
            "mastcam" => Ok(InstrumentGroup::Mastcam),
            "navcam" => Ok(InstrumentGroup::Navcam),
            "hazcam" => Ok(InstrumentGroup::Hazcam),
            "chemcam" => Ok(InstrumentGroup::Chemcam),
            _ => Err(anyhow::anyhow!("Invalid instrument group: {}", s)),
        }
    }
}

impl std::fmt::Display for InstrumentGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentGroup::Latest => write!(f, "latest"),
            InstrumentGroup::Mahli => write!(f, "mahli"),
            InstrumentGroup::Mastcam => write!(f, "mastcam"),
            InstrumentGroup::Navcam => write!(f, "navcam"),
            InstrumentGroup::Hazcam => write!(f, "hazcam"),
            InstrumentGroup::Chemcam => write!(f, "chemcam"),
        }
    }
}

// ============================================================================
// Import Result
// ============================================================================

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Writes accepted by the sink, duplicates included
    pub count: u64,

    /// Rows newly created by this run
    pub inserted: u64,

    /// Sols in the resolved range
    pub batches_requested: usize,

    /// Sols whose catalog could not be fetched
    pub batches_failed: u64,

    /// Images the sink rejected
    pub records_failed: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl ImportResult {
    /// Result of a run that had nothing to do.
    pub fn empty(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Accepted writes that hit an existing row.
    pub fn duplicates(&self) -> u64 {
        self.count.saturating_sub(self.inserted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manifest_ignores_extra_fields() {
        let json = r#"{
            "type": "mars-images-manifest",
            "most_recent": "2016-06-09T08:03:38Z",
            "sols": [
                {"sol": 0, "catalog_url": "http://example.test/sol0.json", "num_images": 10},
                {"sol": 1, "catalog_url": "http://example.test/sol1.json", "num_images": 7}
            ]
        }"#;

        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.sols[1], SolRef::new(1, "http://example.test/sol1.json"));
    }

    #[test]
    fn test_raw_image_accepts_numeric_and_null_fields() {
        let json = r#"{
            "sol": 1371,
            "images": [
                {
                    "itemName": "1371MR0067130000701473E01_DXXX",
                    "url": "http://mars.jpl.nasa.gov/msl-raw-images/1371MR.jpg",
                    "sampleType": "full",
                    "instrument": "MAST_RIGHT",
                    "lmst": null,
                    "sol": 1371,
                    "utc": "2016-06-09T08:03:38.000Z"
                },
                {
                    "itemName": "1371MR0067130000701473I01_DXXX",
                    "sampleType": "thumbnail",
                    "sol": "1371"
                }
            ]
        }"#;

        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.sol, 1371);
        assert_eq!(catalog.images.len(), 2);
        assert_eq!(catalog.images[0].sol, "1371");
        assert_eq!(catalog.images[0].lmst, "");
        assert_eq!(catalog.images[1].sol, "1371");
        assert_eq!(catalog.images[1].url, "");
    }

    #[test]
    fn test_captured_at_formats() {
        let mut image = MarsImage {
            instrument: "MAHLI".to_string(),
            item_name: "IMG_001".to_string(),
            lmst: "Sol-01371M12:00:00.000".to_string(),
            sol: 1371,
            url: "https://example.test/IMG_001.jpg".to_string(),
            utc: "2016-06-09 08:03:38".to_string(),
        };
        let expected = Utc.with_ymd_and_hms(2016, 6, 9, 8, 3, 38).unwrap();
        assert_eq!(image.captured_at(), Some(expected));

        image.utc = "2016-06-09T08:03:38.000Z".to_string();
        assert_eq!(image.captured_at(), Some(expected));

        image.utc = "2016-06-09T08:03:38.250".to_string();
        assert_eq!(image.captured_at().map(|t| t.timestamp()), Some(expected.timestamp()));

        image.utc = "yesterday".to_string();
        assert_eq!(image.captured_at(), None);
    }

    #[test]
    fn test_hours_since() {
        let image = MarsImage {
            instrument: "MAHLI".to_string(),
            item_name: "IMG_001".to_string(),
            lmst: String::new(),
            sol: 1,
            url: String::new(),
            utc: "2016-06-09 08:00:00".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2016, 6, 10, 9, 59, 0).unwrap();
        assert_eq!(image.hours_since(now), Some(25));
    }

    #[test]
    fn test_instrument_group_from_str() {
        assert_eq!("latest".parse::<InstrumentGroup>().unwrap(), InstrumentGroup::Latest);
        assert_eq!("MastCam".parse::<InstrumentGroup>().unwrap(), InstrumentGroup::Mastcam);
        assert_eq!("CHEMCAM".parse::<InstrumentGroup>().unwrap(), InstrumentGroup::Chemcam);
        assert!("pancam".parse::<InstrumentGroup>().is_err());

        for group in InstrumentGroup::ALL {
            assert_eq!(group.to_string().parse::<InstrumentGroup>().unwrap(), group);
        }
    }

    #[test]
    fn test_instrument_group_membership() {
        assert!(InstrumentGroup::Latest.contains("ANYTHING"));
        assert!(InstrumentGroup::Navcam.contains("NAV_RIGHT_B"));
        assert!(!InstrumentGroup::Navcam.contains("MAHLI"));
    }

    #[test]
    fn test_import_result_duplicates() {
        let result = ImportResult {
            count: 10,
            inserted: 4,
            ..ImportResult::default()
        };
        assert_eq!(result.duplicates(), 6);
        assert_eq!(ImportResult::empty(Duration::from_secs(1)).count, 0);
    }
}
