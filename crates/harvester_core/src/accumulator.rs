use std::collections::HashSet;

use crate::FeatureRecord;

/// Insertion-ordered record sink that never holds two records with the same
/// identifier.
///
/// Records without an identifier cannot be compared and are always accepted.
#[derive(Debug, Clone, Default)]
pub struct DedupingAccumulator {
    seen: HashSet<String>,
    records: Vec<FeatureRecord>,
}

impl DedupingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` unless its identifier was already accepted.
    /// Returns `true` when the record was added.
    pub fn offer(&mut self, record: FeatureRecord) -> bool {
        if let Some(id) = record.id() {
            if self.seen.contains(id) {
                return false;
            }
            self.seen.insert(id.to_owned());
        }
        self.records.push(record);
        true
    }

    /// Offers every record in order and returns how many were added.
    pub fn offer_all(&mut self, records: impl IntoIterator<Item = FeatureRecord>) -> usize {
        records
            .into_iter()
            .map(|record| self.offer(record))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn all(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<FeatureRecord> {
        self.records
    }
}
