//! Image sinks
//!
//! A sink stores one [`MarsImage`] per call and must ignore an image whose
//! `item_name` is already stored. It is shared by every write task of a run,
//! so implementations must accept any number of concurrent calls.

use async_trait::async_trait;
use mars_common::types::{InstrumentGroup, MarsImage};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::WriteError;

/// What an accepted write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was created
    Inserted,
    /// A row with the same item name already existed; nothing changed
    AlreadyPresent,
}

/// Durable storage for normalized images
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Insert the image unless its item name is already stored.
    async fn insert_image(&self, image: &MarsImage) -> Result<WriteOutcome, WriteError>;
}

/// In-process sink keyed by item name, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryImageSink {
    rows: Mutex<BTreeMap<String, MarsImage>>,
}

impl MemoryImageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that already holds `images`
    pub fn with_images(images: impl IntoIterator<Item = MarsImage>) -> Self {
        let rows = images
            .into_iter()
            .map(|image| (image.item_name.clone(), image))
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, MarsImage>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn contains(&self, item_name: &str) -> bool {
        self.rows().contains_key(item_name)
    }

    pub fn get(&self, item_name: &str) -> Option<MarsImage> {
        self.rows().get(item_name).cloned()
    }

    /// Every stored image, ordered by item name
    pub fn images(&self) -> Vec<MarsImage> {
        self.rows().values().cloned().collect()
    }

    /// Newest images of a group, by UTC descending
    pub fn recent_images(&self, group: InstrumentGroup, limit: usize) -> Vec<MarsImage> {
        let mut images: Vec<MarsImage> = self
            .rows()
            .values()
            .filter(|image| group.contains(&image.instrument))
            .cloned()
            .collect();
        images.sort_by(|a, b| b.utc.cmp(&a.utc));
        images.truncate(limit);
        images
    }
}

#[async_trait]
impl ImageSink for MemoryImageSink {
    async fn insert_image(&self, image: &MarsImage) -> Result<WriteOutcome, WriteError> {
        let mut rows = self.rows();
        if rows.contains_key(&image.item_name) {
            return Ok(WriteOutcome::AlreadyPresent);
        }
        rows.insert(image.item_name.clone(), image.clone());
        Ok(WriteOutcome::Inserted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn image(item_name: &str, instrument: &str, utc: &str) -> MarsImage {
        MarsImage {
            instrument: instrument.to_string(),
            item_name: item_name.to_string(),
            lmst: String::new(),
            sol: 1,
            url: format!("https://example.test/{}.jpg", item_name),
            utc: utc.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reinsert_is_accepted_without_new_row() {
        let sink = MemoryImageSink::with_images([image("IMG_001", "MAHLI", "2016-06-09 08:00:00")]);

        let mut changed = image("IMG_001", "MAHLI", "2016-06-09 08:00:00");
        changed.url = "https://example.test/other.jpg".to_string();

        let outcome = sink.insert_image(&changed).await.unwrap();
        assert_eq!(outcome, WriteOutcome::AlreadyPresent);
        assert_eq!(sink.len(), 1);
        // the first write wins
        assert_eq!(sink.get("IMG_001").unwrap().url, "https://example.test/IMG_001.jpg");
    }

    #[tokio::test]
    async fn test_insert_new_row() {
        let sink = MemoryImageSink::new();
        let outcome = sink
            .insert_image(&image("IMG_002", "MAHLI", "2016-06-09 08:00:00"))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Inserted);
        assert!(sink.contains("IMG_002"));
    }

    #[tokio::test]
    async fn test_empty_item_name_is_an_ordinary_key() {
        // matches the database, where '' is a valid primary key
        let sink = MemoryImageSink::new();
        let first = sink.insert_image(&image("", "MAHLI", "2016-06-09 08:00:00")).await.unwrap();
        let second = sink.insert_image(&image("", "NAV_LEFT_A", "2016-06-09 09:00:00")).await.unwrap();

        assert_eq!(first, WriteOutcome::Inserted);
        assert_eq!(second, WriteOutcome::AlreadyPresent);
        assert_eq!(sink.get("").unwrap().instrument, "MAHLI");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_one_key_create_one_row() {
        let sink = std::sync::Arc::new(MemoryImageSink::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.insert_image(&image("IMG_RACE", "MAHLI", "2016-06-09 08:00:00"))
                    .await
                    .unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == WriteOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_recent_images_by_group() {
        let sink = MemoryImageSink::with_images([
            image("A", "MAHLI", "2016-06-09 08:00:00"),
            image("B", "NAV_LEFT_A", "2016-06-09 09:00:00"),
            image("C", "MAHLI", "2016-06-09 10:00:00"),
            image("D", "MAST_LEFT", "2016-06-09 11:00:00"),
        ]);

        let mahli: Vec<String> = sink
            .recent_images(InstrumentGroup::Mahli, 10)
            .into_iter()
            .map(|i| i.item_name)
            .collect();
        assert_eq!(mahli, vec!["C", "A"]);

        let latest: Vec<String> = sink
            .recent_images(InstrumentGroup::Latest, 2)
            .into_iter()
            .map(|i| i.item_name)
            .collect();
        assert_eq!(latest, vec!["D", "C"]);
    }
}
