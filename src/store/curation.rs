// =============================================================================
// Curation Overlay — user-maintained excluded / saved symbol sets
// =============================================================================
//
// Created and removed by explicit user action, consulted (never mutated) by
// the scan pipeline when filtering squeeze results. Persisted as a single
// JSON file with the same atomic tmp + rename pattern as the runtime config;
// persistence failures are logged and never poison the in-memory overlay.
//
// Reinclusion does not retroactively alter a previously published ScanResult;
// it only affects filtering on the next scan.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// One excluded symbol with the reason it was removed from squeeze results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationEntry {
    pub symbol: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// One saved (watch-listed) symbol. Removal is keyed by `id`, so the same
/// symbol may be saved more than once with different notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEntry {
    pub id: Uuid,
    pub symbol: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// On-disk shape of the overlay.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CurationSets {
    /// Keyed by upper-cased symbol.
    #[serde(default)]
    excluded: HashMap<String, CurationEntry>,
    #[serde(default)]
    saved: Vec<SavedEntry>,
}

/// Thread-safe curation overlay with file-backed persistence.
pub struct CurationStore {
    inner: RwLock<CurationSets>,
    path: PathBuf,
}

impl CurationStore {
    /// Load the overlay from `path`. A missing file yields an empty overlay;
    /// an unreadable one is an error so a corrupt file is never silently
    /// overwritten.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let sets = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read curation file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse curation file {}", path.display()))?
        } else {
            CurationSets::default()
        };

        info!(
            path = %path.display(),
            excluded = sets.excluded.len(),
            saved = sets.saved.len(),
            "curation overlay loaded"
        );

        Ok(Self {
            inner: RwLock::new(sets),
            path,
        })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(CurationSets::default()),
            path: PathBuf::from("/dev/null"),
        }
    }

    // ── Exclusion set ───────────────────────────────────────────────────

    /// Add `symbol` to the exclusion set. Overwrites any existing entry for
    /// the same symbol.
    pub fn exclude(
        &self,
        symbol: &str,
        company_name: Option<String>,
        reason: Option<String>,
    ) -> CurationEntry {
        let entry = CurationEntry {
            symbol: symbol.to_uppercase(),
            company_name,
            reason,
            recorded_at: Utc::now(),
        };
        {
            let mut sets = self.inner.write();
            sets.excluded.insert(entry.symbol.clone(), entry.clone());
            self.persist(&sets);
        }
        info!(symbol = %entry.symbol, "symbol excluded from squeeze results");
        entry
    }

    /// Remove `symbol` from the exclusion set. Returns `false` if it was not
    /// excluded.
    pub fn reinclude(&self, symbol: &str) -> bool {
        let key = symbol.to_uppercase();
        let mut sets = self.inner.write();
        let removed = sets.excluded.remove(&key).is_some();
        if removed {
            self.persist(&sets);
            info!(symbol = %key, "symbol reincluded");
        }
        removed
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.inner
            .read()
            .excluded
            .contains_key(&symbol.to_uppercase())
    }

    /// All excluded entries, most recent first.
    pub fn excluded(&self) -> Vec<CurationEntry> {
        let mut entries: Vec<CurationEntry> =
            self.inner.read().excluded.values().cloned().collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries
    }

    // ── Saved set ───────────────────────────────────────────────────────

    /// Save `symbol` to the watch list with optional notes.
    pub fn save_symbol(&self, symbol: &str, notes: Option<String>) -> SavedEntry {
        let entry = SavedEntry {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            notes,
            recorded_at: Utc::now(),
        };
        {
            let mut sets = self.inner.write();
            sets.saved.push(entry.clone());
            self.persist(&sets);
        }
        info!(symbol = %entry.symbol, id = %entry.id, "symbol saved");
        entry
    }

    /// Remove a saved entry by id. Returns `false` if no entry matched.
    pub fn unsave(&self, id: Uuid) -> bool {
        let mut sets = self.inner.write();
        let before = sets.saved.len();
        sets.saved.retain(|e| e.id != id);
        let removed = sets.saved.len() != before;
        if removed {
            self.persist(&sets);
            info!(%id, "saved symbol removed");
        }
        removed
    }

    /// All saved entries, most recent first.
    pub fn saved(&self) -> Vec<SavedEntry> {
        let mut entries = self.inner.read().saved.clone();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Best-effort atomic write of the overlay. Failures are logged; the
    /// in-memory state stays authoritative for this process.
    fn persist(&self, sets: &CurationSets) {
        if let Err(e) = self.write_atomic(sets) {
            warn!(error = %e, path = %self.path.display(), "failed to persist curation overlay");
        }
    }

    fn write_atomic(&self, sets: &CurationSets) -> Result<()> {
        let content = serde_json::to_string_pretty(sets)
            .context("failed to serialise curation overlay")?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp overlay to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp overlay to {}", self.path.display()))?;
        Ok(())
    }
}
