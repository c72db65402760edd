//! In-memory catalog index keyed by test name.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use strsim::jaro_winkler;
use tracing::warn;

use crate::db::{CatalogSource, DbResult};
use crate::models::CatalogEntry;

/// Minimum similarity for a catalog name to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Read-only snapshot of the catalog for the duration of a run.
///
/// Names match exactly and case-sensitively. When the catalog holds several
/// entries with the same name the one read last wins; such names are kept
/// in [`CatalogIndex::duplicates`].
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: HashMap<String, CatalogEntry>,
    duplicates: Vec<String>,
    fingerprint: String,
}

impl CatalogIndex {
    /// Build the index from one full read of the catalog.
    pub fn load<S: CatalogSource + ?Sized>(source: &S) -> DbResult<Self> {
        Ok(Self::from_entries(source.read_all()?))
    }

    /// Build the index from entries in catalog read order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut hasher = Sha256::new();
        let mut map: HashMap<String, CatalogEntry> = HashMap::new();
        let mut duplicates = Vec::new();

        for entry in entries {
            digest_entry(&mut hasher, &entry);
            let name = entry.name.clone();
            if let Some(previous) = map.insert(name.clone(), entry) {
                warn!(
                    name = %name,
                    replaced_id = %previous.id,
                    "duplicate catalog name, last entry wins"
                );
                if !duplicates.contains(&name) {
                    duplicates.push(name);
                }
            }
        }

        Self {
            entries: map,
            duplicates,
            fingerprint: hex::encode(hasher.finalize()),
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names that appeared more than once in the catalog.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// SHA-256 over the entries in read order.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Closest catalog name to an unmatched one, for reporting only.
    pub fn suggest(&self, name: &str) -> Option<&str> {
        let needle = name.to_lowercase();
        self.entries
            .keys()
            .map(|candidate| (candidate, jaro_winkler(&needle, &candidate.to_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.0.cmp(a.0))
            })
            .map(|(candidate, _)| candidate.as_str())
    }
}

fn digest_entry(hasher: &mut Sha256, entry: &CatalogEntry) {
    let price = entry.price.as_ref().map(|p| p.to_string());
    for field in [
        Some(entry.id.as_str()),
        Some(entry.name.as_str()),
        Some(entry.department.as_str()),
        price.as_deref(),
        entry.unit.as_deref(),
        entry.reference_range.as_deref(),
    ] {
        match field {
            Some(value) => {
                hasher.update([1u8]);
                hasher.update(value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update([0x1f]);
    }
    hasher.update([0x1e]);
}
