//! The red-flag engine.
//!
//! A [`FlagEngine`] owns the ordered history of one analysis session. Each
//! call to [`FlagEngine::ingest`] assigns the next [`RecordId`], compares the
//! new record against every strictly-earlier record, stores the record and
//! returns its [`FlagResult`]. Results of earlier records are never revisited.
//!
//! # Example
//!
//! ```
//! use sentinel_core::{FlagEngine, FlagKind, InvoiceFields};
//!
//! let mut engine = FlagEngine::default();
//!
//! let first = engine.ingest(InvoiceFields {
//!     vendor_name: "Acme".into(),
//!     contact_email: "billing@acme.com".into(),
//!     layout_signature: "L1".into(),
//!     ..Default::default()
//! });
//! assert!(!first.is_red());
//!
//! let second = engine.ingest(InvoiceFields {
//!     vendor_name: "Globex".into(),
//!     contact_email: "BILLING@acme.com".into(),
//!     layout_signature: "L2".into(),
//!     ..Default::default()
//! });
//! assert!(second.flag(FlagKind::SharedContact).is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::{EngineConfig, VendorMatching};
use crate::error::Result;
use crate::model::{
    Conflict, ConflictDetail, Flag, FlagKind, FlagResult, InvoiceFields, InvoiceRecord, RecordId,
};
use crate::normalize::{email_key, phone_key, vendor_key, vendor_words};
use crate::similarity::LayoutSimilarity;

/// Normalized comparison keys, computed once per record.
#[derive(Debug, Clone)]
struct RecordKeys {
    vendor: String,
    vendor_words: String,
    emails: Vec<String>,
    phones: Vec<String>,
}

impl RecordKeys {
    fn new(fields: &InvoiceFields) -> Self {
        Self {
            vendor: vendor_key(&fields.vendor_name),
            vendor_words: vendor_words(&fields.vendor_name),
            emails: distinct_keys(fields.emails().map(email_key)),
            phones: distinct_keys(fields.phones().map(phone_key)),
        }
    }
}

/// Non-empty keys in first-seen order.
fn distinct_keys(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        if !key.is_empty() && !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

/// Append-only arena of the session's records with contact indexes.
#[derive(Debug, Default)]
pub struct History {
    records: Vec<InvoiceRecord>,
    keys: Vec<RecordKeys>,
    by_email: HashMap<String, Vec<usize>>,
    by_phone: HashMap<String, Vec<usize>>,
}

impl History {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&InvoiceRecord> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.records.get(index)
    }

    /// Records in ingestion order.
    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    fn next_id(&self) -> RecordId {
        RecordId(self.records.len() as u64 + 1)
    }

    fn push(&mut self, record: InvoiceRecord, keys: RecordKeys) {
        let index = self.records.len();
        for email in &keys.emails {
            self.by_email.entry(email.clone()).or_default().push(index);
        }
        for phone in &keys.phones {
            self.by_phone.entry(phone.clone()).or_default().push(index);
        }
        self.records.push(record);
        self.keys.push(keys);
    }
}

/// Session-scoped red-flag engine. Single writer; not shared across sessions.
pub struct FlagEngine {
    config: EngineConfig,
    scorer: Arc<dyn LayoutSimilarity>,
    history: History,
    results: Vec<FlagResult>,
}

impl std::fmt::Debug for FlagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagEngine")
            .field("config", &self.config)
            .field("scorer", &self.scorer.name())
            .field("records", &self.history.len())
            .finish()
    }
}

impl Default for FlagEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        let scorer = config.similarity.scorer();
        Self::with_scorer(config, scorer)
    }
}

impl FlagEngine {
    /// Create an engine, validating the configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let scorer = config.similarity.scorer();
        Ok(Self::with_scorer(config, scorer))
    }

    /// Create an engine with a custom similarity scorer. `config.similarity`
    /// is ignored.
    pub fn with_scorer(config: EngineConfig, scorer: Arc<dyn LayoutSimilarity>) -> Self {
        Self {
            config,
            scorer,
            history: History::default(),
            results: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Results in ingestion order, one per record.
    pub fn results(&self) -> &[FlagResult] {
        &self.results
    }

    /// Records paired with their results, in ingestion order.
    pub fn entries(&self) -> impl Iterator<Item = (&InvoiceRecord, &FlagResult)> {
        self.history.records().iter().zip(self.results.iter())
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Ingest one record: evaluate all rules against the prior history, then
    /// append the record. Never fails; unknown (empty) fields match nothing.
    #[instrument(level = "debug", skip_all, fields(source = %fields.source_name))]
    pub fn ingest(&mut self, fields: InvoiceFields) -> FlagResult {
        let id = self.history.next_id();
        let keys = RecordKeys::new(&fields);

        let flags = self.evaluate(&fields, &keys);
        let result = FlagResult::new(id, flags);

        debug!(
            record_id = %id,
            status = %result.status,
            flags = result.flags.len(),
            "Ingested record"
        );

        self.history.push(InvoiceRecord { id, fields }, keys);
        self.results.push(result.clone());
        result
    }

    fn evaluate(&self, fields: &InvoiceFields, keys: &RecordKeys) -> Vec<Flag> {
        // Every rule depends on vendor identity.
        if keys.vendor.is_empty() || self.history.is_empty() {
            return Vec::new();
        }

        let mut flags = Vec::new();

        let shared = self.shared_contact(keys);
        if !shared.is_empty() {
            flags.push(Flag {
                kind: FlagKind::SharedContact,
                conflicts: shared,
            });
        }

        let (same_layout, different_layout) = self.layout_conflicts(fields, keys);
        if !same_layout.is_empty() {
            flags.push(Flag {
                kind: FlagKind::SameLayoutDifferentVendor,
                conflicts: same_layout,
            });
        }
        if !different_layout.is_empty() {
            flags.push(Flag {
                kind: FlagKind::DifferentLayoutSameVendor,
                conflicts: different_layout,
            });
        }

        flags
    }

    /// Rule 1: any listed email or phone shared with a prior record of a
    /// different vendor. The first shared value of each kind is reported.
    fn shared_contact(&self, keys: &RecordKeys) -> Vec<Conflict> {
        let mut matches: BTreeMap<usize, (Option<String>, Option<String>)> = BTreeMap::new();

        for email in &keys.emails {
            for &i in self.history.by_email.get(email).into_iter().flatten() {
                matches.entry(i).or_default().0.get_or_insert_with(|| email.clone());
            }
        }
        for phone in &keys.phones {
            for &i in self.history.by_phone.get(phone).into_iter().flatten() {
                matches.entry(i).or_default().1.get_or_insert_with(|| phone.clone());
            }
        }

        matches
            .into_iter()
            .filter(|(i, _)| self.vendors_differ(keys, &self.history.keys[*i]))
            .map(|(i, (email, phone))| Conflict {
                record_id: self.history.records[i].id,
                detail: ConflictDetail::Contact { email, phone },
            })
            .collect()
    }

    /// Rules 2 and 3: layout similarity against every prior record with a
    /// known vendor and a layout the scorer can compare.
    fn layout_conflicts(
        &self,
        fields: &InvoiceFields,
        keys: &RecordKeys,
    ) -> (Vec<Conflict>, Vec<Conflict>) {
        let mut same_layout = Vec::new();
        let mut different_layout = Vec::new();

        if fields.layout_signature.is_empty() {
            return (same_layout, different_layout);
        }

        for (prior, prior_keys) in self.history.records.iter().zip(&self.history.keys) {
            if prior_keys.vendor.is_empty()
                || !self
                    .scorer
                    .comparable(&fields.layout_signature, &prior.layout_signature)
            {
                continue;
            }

            let similarity = self
                .scorer
                .score(&fields.layout_signature, &prior.layout_signature);
            let conflict = || Conflict {
                record_id: prior.id,
                detail: ConflictDetail::Layout { similarity },
            };

            if self.vendors_match(keys, prior_keys) {
                if similarity < self.config.different_layout_threshold {
                    different_layout.push(conflict());
                }
            } else if similarity >= self.config.same_layout_threshold {
                same_layout.push(conflict());
            }
        }

        (same_layout, different_layout)
    }

    /// Both vendors known and different.
    fn vendors_differ(&self, a: &RecordKeys, b: &RecordKeys) -> bool {
        !a.vendor.is_empty() && !b.vendor.is_empty() && !self.vendors_match(a, b)
    }

    /// Both vendors known and the same vendor.
    fn vendors_match(&self, a: &RecordKeys, b: &RecordKeys) -> bool {
        if a.vendor.is_empty() || b.vendor.is_empty() {
            return false;
        }
        if a.vendor == b.vendor {
            return true;
        }
        match self.config.vendor_matching {
            VendorMatching::Exact => false,
            VendorMatching::Fuzzy { threshold } => {
                a.vendor_words == b.vendor_words
                    || strsim::jaro_winkler(&a.vendor_words, &b.vendor_words) >= threshold
            }
        }
    }
}
