//! Technique resolution against the platform's attack-pattern catalog.
//!
//! Incident sheets reference techniques by local DISARM code (`T0086.002`).
//! The platform already carries these techniques, so instead of minting
//! duplicates the builder resolves each code to the catalog's canonical
//! identifier. A miss is a data-quality condition recorded in the run report;
//! it never fails the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::StixId;

/// One catalog record supplied by the platform client collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Local technique code, e.g. `T0086.002`.
    pub code: String,
    /// Canonical identifier owned by the platform.
    pub canonical_id: StixId,
}

/// Exact-match lookup table from local code to canonical identifier.
///
/// Built once per run; per-technique lookups must not rescan the catalog
/// sequence, which would be quadratic on large catalogs.
#[derive(Debug, Clone, Default)]
pub struct TechniqueCatalog {
    by_code: HashMap<String, StixId>,
}

impl TechniqueCatalog {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let by_code = entries
            .into_iter()
            .map(|entry| (entry.code, entry.canonical_id))
            .collect();
        Self { by_code }
    }

    /// Exact, case-sensitive lookup. `None` means the code is unknown to the
    /// platform; the caller records it and continues. An empty catalog
    /// resolves nothing.
    pub fn resolve(&self, local_code: &str) -> Option<&StixId> {
        self.by_code.get(local_code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// What the assembler does with a technique code the catalog does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Record the miss and skip every relationship that would have
    /// referenced the technique.
    #[default]
    Skip,
    /// Mint a locally identified technique entity instead of skipping, for
    /// runs without a usable catalog. The miss is still recorded.
    MintLocal,
}
